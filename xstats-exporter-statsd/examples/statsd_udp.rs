use std::{sync::Arc, time::Duration};

use xstats::{context::RequestContext, Handler, Sender as _, XStater as _, XStats};
use xstats_exporter_statsd::{Dialect, StatsdBuilder};

fn main() {
    tracing_subscriber::fmt::init();

    let sender = StatsdBuilder::default()
        .with_remote_address("localhost:9125")
        .expect("failed to parse remote address")
        .with_dialect(Dialect::DogStatsD)
        .with_flush_interval(Duration::from_millis(250))
        .build()
        .expect("failed to build StatsD sender");
    let sender = Arc::new(sender);

    let xs = XStats::with_prefix(sender.clone(), "example.");
    xs.add_tags(&["env:dev"]);
    let db = xs.scope("db", &[]);

    let handler = Handler::with_prefix(sender.clone(), &["component:api"], "example.http.");

    // Pretend to serve a few requests.
    for i in 0..20u32 {
        let mut ctx = RequestContext::new();
        handler.handle(&mut ctx, |ctx| {
            let rx = xstats::context::from_context(&*ctx);
            rx.add_tag("route", if i % 2 == 0 { "/users" } else { "/orders" });
            rx.count("requests", 1.0, &[]);
            rx.timing("latency", Duration::from_millis(u64::from(5 + i)), &[]);
        });

        db.histogram("rows", f64::from(i * 3), &["table:users"]);
        xs.gauge("in_flight", f64::from(i % 4), &[]);

        std::thread::sleep(Duration::from_millis(100));
    }

    let telemetry = sender.telemetry();
    println!("packets sent: {}, dropped: {}", telemetry.packets_sent, telemetry.packets_dropped);

    sender.close().expect("failed to close StatsD sender");
}
