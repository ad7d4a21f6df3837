use std::sync::atomic::{AtomicU64, Ordering};

/// Transport telemetry.
///
/// `Telemetry` collects information about the transport's behavior: how many packets and bytes were written to the
/// output, how many were dropped because the write failed, and how many lines were dropped because they were submitted
/// after the transport was closed. Write failures are never reported to callers, so this is the way to observe them
/// besides the logs.
#[derive(Debug, Default)]
pub struct Telemetry {
    packets_sent: AtomicU64,
    packets_dropped: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_dropped: AtomicU64,
    lines_dropped: AtomicU64,
}

impl Telemetry {
    pub(crate) fn track_packet_send_succeeded(&self, len: usize) {
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(len as u64, Ordering::Relaxed);
    }

    pub(crate) fn track_packet_send_failed(&self, len: usize) {
        self.packets_dropped.fetch_add(1, Ordering::Relaxed);
        self.bytes_dropped.fetch_add(len as u64, Ordering::Relaxed);
    }

    pub(crate) fn track_line_dropped(&self) {
        self.lines_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Takes a point-in-time copy of the counters.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            packets_dropped: self.packets_dropped.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_dropped: self.bytes_dropped.load(Ordering::Relaxed),
            lines_dropped: self.lines_dropped.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of the transport [`Telemetry`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    /// Packets written to the output.
    pub packets_sent: u64,

    /// Packets whose write failed.
    pub packets_dropped: u64,

    /// Bytes written to the output.
    pub bytes_sent: u64,

    /// Bytes in packets whose write failed.
    pub bytes_dropped: u64,

    /// Lines submitted after the transport was closed.
    pub lines_dropped: u64,
}
