use std::time::Duration;

use xstats::{Error, Kind, Observation, Sender};

use crate::{encoder::Encoder, telemetry::TelemetrySnapshot, transport::BufferedTransport};

/// A [`Sender`] that encodes observations as StatsD lines and sends them in buffered packets.
///
/// Built with [`StatsdBuilder`](crate::StatsdBuilder). Sending an observation never fails and never waits on the
/// network: it only waits for the background thread to accept the encoded line.
pub struct StatsdSender {
    encoder: Box<dyn Encoder>,
    transport: BufferedTransport,
}

impl StatsdSender {
    pub(crate) fn new(encoder: Box<dyn Encoder>, transport: BufferedTransport) -> Self {
        StatsdSender { encoder, transport }
    }

    /// Returns a snapshot of the transport telemetry.
    pub fn telemetry(&self) -> TelemetrySnapshot {
        self.transport.telemetry()
    }

    fn send(&self, observation: &Observation<'_>) {
        let mut line = String::with_capacity(64);
        self.encoder.encode(observation, &mut line);
        self.transport.submit(line);
    }
}

impl Sender for StatsdSender {
    fn gauge(&self, stat: &str, value: f64, tags: &[&str]) {
        self.send(&Observation::new(stat, Kind::Gauge, value, tags));
    }

    fn count(&self, stat: &str, count: f64, tags: &[&str]) {
        self.send(&Observation::new(stat, Kind::Count, count, tags));
    }

    fn histogram(&self, stat: &str, value: f64, tags: &[&str]) {
        self.send(&Observation::new(stat, Kind::Histogram, value, tags));
    }

    fn timing(&self, stat: &str, duration: Duration, tags: &[&str]) {
        self.send(&Observation::timing(stat, duration, tags));
    }

    /// Writes out any buffered lines and stops the background thread.
    fn close(&self) -> Result<(), Error> {
        self.transport.close()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::Arc,
        time::{Duration, Instant},
    };

    use xstats::{debugging::RecordingSender, MultiSender, Sender, XStater as _, XStats};

    use super::StatsdSender;
    use crate::{
        encoder::{Dialect, LineEncoder},
        transport::tests::{manual, tick, Packets},
    };

    fn statsd(dialect: Dialect, packets: &Packets) -> (StatsdSender, crossbeam_channel::Sender<Instant>) {
        let (transport, ticker) = manual(packets, 1 << 15);
        (StatsdSender::new(Box::new(LineEncoder::new(dialect)), transport), ticker)
    }

    #[test]
    fn each_kind() {
        let packets = Packets::default();
        let (sender, ticker) = statsd(Dialect::StatsD, &packets);

        sender.gauge("g", 1.5, &[]);
        sender.count("c", 2.0, &[]);
        sender.histogram("h", 3.0, &[]);
        sender.timing("t", Duration::from_millis(250), &[]);
        tick(&ticker);

        assert_eq!(packets.strings(), vec!["g:1.500000|g\nc:2.000000|c\nh:3.000000|h\nt:250.000000|ms\n"]);
        sender.close().unwrap();
        assert_eq!(sender.telemetry().packets_sent, 1);
    }

    #[test]
    fn client_tags_per_dialect() {
        // Cases are defined as: dialect, expected output.
        let cases = [
            (Dialect::StatsD, "svc.requests:1.000000|c\n"),
            (Dialect::DogStatsD, "svc.requests:1.000000|c|#route:/x,env:prod\n"),
            (Dialect::Telegraf, "svc.requests,route=/x,env=prod:1.000000|c\n"),
        ];

        for (dialect, expected) in cases {
            let packets = Packets::default();
            let (sender, _ticker) = statsd(dialect, &packets);
            let sender = Arc::new(sender);

            let xs = XStats::with_prefix(sender.clone(), "svc.");
            xs.add_tags(&["env:prod"]);
            xs.count("requests", 1.0, &["route:/x"]);
            sender.close().unwrap();

            assert_eq!(packets.strings(), vec![expected]);
        }
    }

    #[test]
    fn fans_out_with_other_senders() {
        let packets = Packets::default();
        let (statsd, _ticker) = statsd(Dialect::DogStatsD, &packets);
        let recording = Arc::new(RecordingSender::new());

        let multi = Arc::new(MultiSender::new(vec![Arc::new(statsd) as Arc<dyn Sender>, recording.clone()]));
        let xs = XStats::new(multi.clone());
        let db = xs.scope("db", &[]);
        db.add_tag("table", "users");
        db.timing("query", Duration::from_secs(2), &[]);

        // Closing a client leaves the shared sender running.
        xs.close().unwrap();
        assert_eq!(recording.close_count(), 0);

        multi.close().unwrap();
        assert_eq!(recording.close_count(), 1);
        assert_eq!(recording.last().unwrap().stat, "db.query");
        assert_eq!(recording.last().unwrap().tags, vec!["table:users"]);
        assert_eq!(packets.strings(), vec!["db.query:2000.000000|ms|#table:users\n"]);
    }

    #[test]
    fn closed_sender_drops_lines() {
        let packets = Packets::default();
        let (sender, _ticker) = statsd(Dialect::StatsD, &packets);

        sender.count("a", 1.0, &[]);
        sender.close().unwrap();
        sender.count("b", 1.0, &[]);

        assert_eq!(packets.strings(), vec!["a:1.000000|c\n"]);
        assert_eq!(sender.telemetry().lines_dropped, 1);
    }
}
