use std::{
    io::Write,
    sync::Arc,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crossbeam_channel::{bounded, never, select, tick, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, trace};
use xstats::Error;

use crate::{
    telemetry::{Telemetry, TelemetrySnapshot},
    BuildError,
};

enum Event {
    Line(String),
    Tick,
    TickerClosed,
    Stop,
}

/// Accumulates encoded lines and writes them out in packets.
///
/// A single background thread owns the packet buffer and the output. Lines are handed to it over a rendezvous channel,
/// and it writes the buffer out whenever the flush interval elapses, whenever the buffer reaches the maximum packet
/// length, or when the transport is closed.
///
/// Lines are never split across packets: a line that would overflow the current packet starts a new one.
///
/// Write failures are logged and counted in the transport [`Telemetry`](crate::Telemetry), and the failed packet is
/// discarded. They are never reported to the code that submitted the lines.
pub struct BufferedTransport {
    intake: Sender<String>,
    quit: Mutex<Option<Sender<()>>>,
    done: Mutex<Option<JoinHandle<()>>>,
    telemetry: Arc<Telemetry>,
}

impl BufferedTransport {
    /// Creates a new `BufferedTransport` writing to `writer`, and spawns its background thread.
    ///
    /// # Errors
    ///
    /// If the flush interval is zero, if the maximum packet length is zero, or if the background thread cannot be
    /// spawned, an error is returned.
    pub fn new<W>(writer: W, flush_interval: Duration, max_packet_len: usize) -> Result<Self, BuildError>
    where
        W: Write + Send + 'static,
    {
        if flush_interval.is_zero() {
            return Err(BuildError::InvalidFlushInterval);
        }

        Self::with_ticker(writer, tick(flush_interval), max_packet_len)
    }

    pub(crate) fn with_ticker<W>(
        writer: W,
        ticker: Receiver<Instant>,
        max_packet_len: usize,
    ) -> Result<Self, BuildError>
    where
        W: Write + Send + 'static,
    {
        if max_packet_len == 0 {
            return Err(BuildError::InvalidPacketLength { len: max_packet_len });
        }

        let (intake_tx, intake_rx) = bounded(0);
        let (quit_tx, quit_rx) = bounded(0);
        let telemetry = Arc::new(Telemetry::default());

        let worker = Worker {
            writer,
            buf: Vec::with_capacity(max_packet_len),
            max_packet_len,
            telemetry: Arc::clone(&telemetry),
        };

        let handle = thread::Builder::new()
            .name("xstats-statsd-transport".to_string())
            .spawn(move || worker.run(&intake_rx, ticker, &quit_rx))
            .map_err(BuildError::Backend)?;

        Ok(BufferedTransport {
            intake: intake_tx,
            quit: Mutex::new(Some(quit_tx)),
            done: Mutex::new(Some(handle)),
            telemetry,
        })
    }

    /// Hands a line to the background thread.
    ///
    /// This waits for the background thread to pick the line up, but not for it to be written out. Lines submitted
    /// after the transport was closed are dropped.
    pub fn submit(&self, line: String) {
        if let Err(e) = self.intake.send(line) {
            trace!(line = e.0.trim_end(), "Transport closed, dropping line.");
            self.telemetry.track_line_dropped();
        }
    }

    /// Stops the background thread, after it has written out any buffered lines.
    ///
    /// This blocks until the final write completes. Closing an already-closed transport does nothing.
    ///
    /// # Errors
    ///
    /// If the background thread panicked, an error is returned.
    pub fn close(&self) -> Result<(), Error> {
        drop(self.quit.lock().take());

        let handle = self.done.lock().take();
        match handle {
            Some(handle) => handle.join().map_err(|_| Error::WorkerPanicked),
            None => Ok(()),
        }
    }

    /// Returns a snapshot of the transport telemetry.
    pub fn telemetry(&self) -> TelemetrySnapshot {
        self.telemetry.snapshot()
    }
}

struct Worker<W> {
    writer: W,
    buf: Vec<u8>,
    max_packet_len: usize,
    telemetry: Arc<Telemetry>,
}

impl<W: Write> Worker<W> {
    fn run(mut self, intake: &Receiver<String>, mut ticker: Receiver<Instant>, quit: &Receiver<()>) {
        debug!(max_packet_len = self.max_packet_len, "Transport started.");

        loop {
            let event = select! {
                recv(intake) -> line => line.map_or(Event::Stop, Event::Line),
                recv(ticker) -> tick => if tick.is_ok() { Event::Tick } else { Event::TickerClosed },
                recv(quit) -> _ => Event::Stop,
            };

            match event {
                Event::Line(line) => self.accept(&line),
                Event::Tick => self.flush(),
                Event::TickerClosed => ticker = never(),
                Event::Stop => {
                    self.flush();
                    break;
                }
            }
        }

        debug!("Transport stopped.");
    }

    fn accept(&mut self, line: &str) {
        // Start a new packet rather than splitting the line.
        if self.buf.len() + line.len() > self.max_packet_len {
            self.flush();
        }

        self.buf.extend_from_slice(line.as_bytes());

        if self.buf.len() >= self.max_packet_len {
            self.flush();
        }
    }

    fn flush(&mut self) {
        if self.buf.is_empty() {
            return;
        }

        let len = self.buf.len();
        match self.writer.write_all(&self.buf) {
            Ok(()) => {
                trace!(len, "Wrote packet.");
                self.telemetry.track_packet_send_succeeded(len);
            }
            Err(e) => {
                error!(error = %e, len, "Failed to write packet.");
                self.telemetry.track_packet_send_failed(len);
            }
        }

        self.buf.clear();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{
        io::{self, Write},
        sync::Arc,
        thread,
        time::{Duration, Instant},
    };

    use crossbeam_channel::{bounded, Sender};
    use parking_lot::Mutex;
    use proptest::{collection::vec as arb_vec, prelude::*};

    use super::BufferedTransport;
    use crate::BuildError;

    /// Records every write as a separate packet.
    #[derive(Clone, Default)]
    pub(crate) struct Packets {
        packets: Arc<Mutex<Vec<Vec<u8>>>>,
        failures_left: Arc<Mutex<usize>>,
    }

    impl Packets {
        pub(crate) fn failing(failures: usize) -> Self {
            Packets { failures_left: Arc::new(Mutex::new(failures)), ..Self::default() }
        }

        pub(crate) fn strings(&self) -> Vec<String> {
            self.packets.lock().iter().map(|p| String::from_utf8_lossy(p).into_owned()).collect()
        }
    }

    impl Write for Packets {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let mut failures_left = self.failures_left.lock();
            if *failures_left > 0 {
                *failures_left -= 1;
                return Err(io::Error::new(io::ErrorKind::Other, "i/o error"));
            }

            self.packets.lock().push(buf.to_vec());
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    pub(crate) fn manual(packets: &Packets, max_packet_len: usize) -> (BufferedTransport, Sender<Instant>) {
        let (tick_tx, tick_rx) = bounded(0);
        let transport = BufferedTransport::with_ticker(packets.clone(), tick_rx, max_packet_len)
            .expect("failed to spawn transport");
        (transport, tick_tx)
    }

    /// Fires the ticker and waits for the resulting flush to finish.
    ///
    /// The second tick can only be received once the worker is back to waiting, which means the first flush is done.
    pub(crate) fn tick(ticker: &Sender<Instant>) {
        ticker.send(Instant::now()).expect("worker gone");
        ticker.send(Instant::now()).expect("worker gone");
    }

    fn line(s: &str) -> String {
        s.to_string()
    }

    #[test]
    fn flushes_lines_in_submission_order() {
        let packets = Packets::default();
        let (transport, ticker) = manual(&packets, 1 << 15);

        transport.submit(line("metric1:1.000000|c\n"));
        transport.submit(line("metric2:2.000000|c\n"));
        tick(&ticker);

        assert_eq!(packets.strings(), vec!["metric1:1.000000|c\nmetric2:2.000000|c\n"]);
        transport.close().unwrap();
    }

    #[test]
    fn empty_tick_writes_nothing() {
        let packets = Packets::default();
        let (transport, ticker) = manual(&packets, 1 << 15);

        tick(&ticker);
        tick(&ticker);
        transport.close().unwrap();

        assert!(packets.strings().is_empty());
        assert_eq!(transport.telemetry().packets_sent, 0);
    }

    #[test]
    fn exactly_full_buffer_flushes_immediately() {
        let packets = Packets::default();
        let (transport, _ticker) = manual(&packets, 10);

        transport.submit(line("aaaa\n"));
        transport.submit(line("bbbb\n"));

        // The worker only takes the next line once it is done with the previous one.
        transport.submit(line("cc\n"));
        assert_eq!(packets.strings(), vec!["aaaa\nbbbb\n"]);

        transport.close().unwrap();
        assert_eq!(packets.strings(), vec!["aaaa\nbbbb\n", "cc\n"]);
    }

    #[test]
    fn overflowing_line_starts_a_new_packet() {
        let packets = Packets::default();
        let (transport, _ticker) = manual(&packets, 10);

        transport.submit(line("aaaaaa\n"));
        transport.submit(line("bbbbbb\n"));
        transport.submit(line("c\n"));
        assert_eq!(packets.strings(), vec!["aaaaaa\n"]);

        transport.close().unwrap();
        assert_eq!(packets.strings(), vec!["aaaaaa\n", "bbbbbb\nc\n"]);
    }

    #[test]
    fn oversized_line_is_sent_alone() {
        let packets = Packets::default();
        let (transport, _ticker) = manual(&packets, 4);

        transport.submit(line("ab\n"));
        transport.submit(line("toolong\n"));
        transport.submit(line("x\n"));
        assert_eq!(packets.strings(), vec!["ab\n", "toolong\n"]);

        transport.close().unwrap();
        assert_eq!(packets.strings(), vec!["ab\n", "toolong\n", "x\n"]);
    }

    #[test]
    fn close_drains_pending_lines() {
        let packets = Packets::default();
        let (transport, _ticker) = manual(&packets, 1 << 15);

        transport.submit(line("last:1.000000|g\n"));
        transport.close().unwrap();

        assert_eq!(packets.strings(), vec!["last:1.000000|g\n"]);
    }

    #[test]
    fn write_failure_discards_packet_and_keeps_running() {
        let packets = Packets::failing(1);
        let (transport, ticker) = manual(&packets, 1 << 15);

        transport.submit(line("a\n"));
        tick(&ticker);
        transport.submit(line("b\n"));
        tick(&ticker);

        assert_eq!(packets.strings(), vec!["b\n"]);

        let telemetry = transport.telemetry();
        assert_eq!(telemetry.packets_dropped, 1);
        assert_eq!(telemetry.bytes_dropped, 2);
        assert_eq!(telemetry.packets_sent, 1);
        assert_eq!(telemetry.bytes_sent, 2);

        transport.close().unwrap();
    }

    #[test]
    fn submit_after_close_is_dropped() {
        let packets = Packets::default();
        let (transport, _ticker) = manual(&packets, 1 << 15);

        transport.submit(line("before\n"));
        transport.close().unwrap();
        transport.submit(line("after\n"));

        assert_eq!(packets.strings(), vec!["before\n"]);
        assert_eq!(transport.telemetry().lines_dropped, 1);
        assert!(transport.close().is_ok());
    }

    #[test]
    fn dropped_ticker_does_not_stop_the_transport() {
        let packets = Packets::default();
        let (transport, ticker) = manual(&packets, 1 << 15);
        drop(ticker);

        transport.submit(line("a\n"));
        transport.submit(line("b\n"));
        transport.close().unwrap();

        assert_eq!(packets.strings(), vec!["a\nb\n"]);
    }

    #[test]
    fn concurrent_producers_lose_nothing() {
        let packets = Packets::default();
        let (transport, _ticker) = manual(&packets, 64);
        let transport = Arc::new(transport);

        let handles = (0..4)
            .map(|t| {
                let transport = Arc::clone(&transport);
                thread::spawn(move || {
                    for i in 0..50 {
                        transport.submit(format!("t{t}:{i}|c\n"));
                    }
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.join().unwrap();
        }
        transport.close().unwrap();

        let all = packets.strings().concat();
        assert_eq!(all.lines().count(), 200);
        for t in 0..4 {
            let own = all.lines().filter(|l| l.starts_with(&format!("t{t}:"))).collect::<Vec<_>>();
            let expected = (0..50).map(|i| format!("t{t}:{i}|c")).collect::<Vec<_>>();
            assert_eq!(own, expected);
        }
    }

    #[test]
    fn interval_ticker_flushes() {
        let packets = Packets::default();
        let transport = BufferedTransport::new(packets.clone(), Duration::from_millis(10), 1 << 15).unwrap();

        transport.submit(line("tick:1.000000|c\n"));

        let deadline = Instant::now() + Duration::from_secs(5);
        while packets.strings().is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }

        assert_eq!(packets.strings(), vec!["tick:1.000000|c\n"]);
        transport.close().unwrap();
    }

    #[test]
    fn invalid_configuration() {
        assert!(matches!(
            BufferedTransport::new(Packets::default(), Duration::ZERO, 1024),
            Err(BuildError::InvalidFlushInterval)
        ));
        assert!(matches!(
            BufferedTransport::new(Packets::default(), Duration::from_secs(1), 0),
            Err(BuildError::InvalidPacketLength { len: 0 })
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn packets_preserve_lines(
            lines in arb_vec("[a-z]{1,12}:[0-9]{1,6}\\|[cgh]\n", 0..64),
            max_packet_len in 24usize..256,
        ) {
            let packets = Packets::default();
            let (transport, _ticker) = manual(&packets, max_packet_len);
            for line in &lines {
                transport.submit(line.clone());
            }
            transport.close().unwrap();

            let written = packets.strings();
            prop_assert_eq!(written.concat(), lines.concat());
            for packet in &written {
                prop_assert!(!packet.is_empty());
                prop_assert!(packet.len() <= max_packet_len);
                prop_assert!(packet.ends_with('\n'));
            }
        }
    }
}
