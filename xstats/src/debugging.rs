//! Tools for testing code that reports observations.
use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use parking_lot::Mutex;

use crate::{Error, Kind, Sender};

/// A single call made against a [`RecordingSender`].
#[derive(Clone, Debug, PartialEq)]
pub struct Call {
    /// Kind of the observation.
    pub kind: Kind,

    /// Metric name, as received by the sender.
    pub stat: String,

    /// Observed value. Timings are recorded in seconds.
    pub value: f64,

    /// Tags, as received by the sender.
    pub tags: Vec<String>,
}

impl Call {
    /// Creates a new `Call`.
    pub fn new(kind: Kind, stat: &str, value: f64, tags: &[&str]) -> Self {
        Call {
            kind,
            stat: stat.to_string(),
            value,
            tags: tags.iter().map(ToString::to_string).collect(),
        }
    }
}

/// A sender that records every call made against it.
///
/// Useful for asserting on what a piece of instrumented code reports, without running a transport. It can also be
/// configured to fail when closed.
#[derive(Debug, Default)]
pub struct RecordingSender {
    calls: Mutex<Vec<Call>>,
    closes: AtomicUsize,
    close_error: Option<String>,
}

impl RecordingSender {
    /// Creates a new `RecordingSender`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new `RecordingSender` whose `close` always fails with the given message.
    pub fn failing_close<S: Into<String>>(message: S) -> Self {
        RecordingSender { close_error: Some(message.into()), ..Self::default() }
    }

    /// Returns every recorded call, oldest first.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Returns the most recent call, if any.
    pub fn last(&self) -> Option<Call> {
        self.calls.lock().last().cloned()
    }

    /// Returns the number of times the sender was closed.
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::Acquire)
    }

    /// Forgets every recorded call.
    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, kind: Kind, stat: &str, value: f64, tags: &[&str]) {
        self.calls.lock().push(Call::new(kind, stat, value, tags));
    }
}

impl Sender for RecordingSender {
    fn gauge(&self, stat: &str, value: f64, tags: &[&str]) {
        self.record(Kind::Gauge, stat, value, tags);
    }

    fn count(&self, stat: &str, count: f64, tags: &[&str]) {
        self.record(Kind::Count, stat, count, tags);
    }

    fn histogram(&self, stat: &str, value: f64, tags: &[&str]) {
        self.record(Kind::Histogram, stat, value, tags);
    }

    fn timing(&self, stat: &str, duration: Duration, tags: &[&str]) {
        self.record(Kind::Timing, stat, duration.as_secs_f64(), tags);
    }

    fn close(&self) -> Result<(), Error> {
        self.closes.fetch_add(1, Ordering::AcqRel);
        match &self.close_error {
            Some(message) => Err(Error::Other(message.clone())),
            None => Ok(()),
        }
    }
}
