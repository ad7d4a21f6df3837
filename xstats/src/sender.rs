use std::{fmt, time::Duration};

use crate::Error;

/// The kind of an observation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    /// A point-in-time value.
    Gauge,

    /// An incremental quantity accumulated by the collector.
    Count,

    /// A value whose distribution is tracked by the collector.
    Histogram,

    /// An elapsed duration, expressed in seconds.
    Timing,
}

impl Kind {
    /// Returns a human-readable name for the kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Kind::Gauge => "gauge",
            Kind::Count => "count",
            Kind::Histogram => "histogram",
            Kind::Timing => "timing",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single metric data point.
///
/// Observations are transient: they are built at the call site, handed to an encoder, and discarded.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Observation<'a> {
    /// Fully-qualified metric name, prefix included.
    pub name: &'a str,

    /// Kind of the observation.
    pub kind: Kind,

    /// Observed value. Timings are carried in seconds.
    pub value: f64,

    /// Tags attached to the observation, in emission order.
    pub tags: &'a [&'a str],
}

impl<'a> Observation<'a> {
    /// Creates a new `Observation`.
    pub const fn new(name: &'a str, kind: Kind, value: f64, tags: &'a [&'a str]) -> Self {
        Self { name, kind, value, tags }
    }

    /// Creates a timing observation, converting `duration` to seconds.
    pub fn timing(name: &'a str, duration: Duration, tags: &'a [&'a str]) -> Self {
        Self::new(name, Kind::Timing, duration.as_secs_f64(), tags)
    }
}

/// A destination for observations, such as a StatsD or DogStatsD client.
///
/// Every method takes `&self` so that a single sender can be shared between threads. Tags are free-form strings,
/// conventionally in the `key:value` form.
pub trait Sender: Send + Sync {
    /// Measures the value of a particular thing at a particular time, like the amount of fuel in a car's gas tank or
    /// the number of users connected to a system.
    fn gauge(&self, stat: &str, value: f64, tags: &[&str]);

    /// Tracks how many times something happened per second, like the number of database requests or page views.
    fn count(&self, stat: &str, count: f64, tags: &[&str]);

    /// Tracks the statistical distribution of a set of values, like the duration of database queries or the size of
    /// uploaded files.
    fn histogram(&self, stat: &str, value: f64, tags: &[&str]);

    /// Measures an elapsed time.
    fn timing(&self, stat: &str, duration: Duration, tags: &[&str]);

    /// Releases any resources held by the sender.
    ///
    /// Senders without resources to release keep the default implementation, which does nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the sender could not shut down cleanly.
    fn close(&self) -> Result<(), Error> {
        Ok(())
    }
}

/// Closes the given sender.
///
/// # Errors
///
/// Returns whatever error the sender reports while closing.
pub fn close(sender: &dyn Sender) -> Result<(), Error> {
    sender.close()
}
