use std::fmt::Write as _;

use xstats::{Kind, Observation};

/// Turns one observation into one line of text.
///
/// Implementations must append exactly one line to `buf`, terminated by a newline, so that multiple encoded
/// observations can be concatenated into a single packet.
pub trait Encoder: Send + Sync {
    /// Appends the encoded form of `observation` to `buf`.
    fn encode(&self, observation: &Observation<'_>, buf: &mut String);
}

/// The StatsD dialect to encode observations in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Dialect {
    /// Plain StatsD: `name:value|type`. Tags are not supported and are dropped. Timings are sent in milliseconds.
    #[default]
    StatsD,

    /// Datadog's extended StatsD: `name:value|type|#tag1,tag2`. Timings are sent in milliseconds.
    DogStatsD,

    /// Telegraf's extended StatsD: `name,key1=value1,key2=value2:value|type`. Timings are sent in seconds.
    Telegraf,
}

/// How metric values are formatted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueFormat {
    /// A fixed number of decimal digits.
    Fixed(usize),

    /// The shortest representation that round-trips.
    Shortest,
}

impl Default for ValueFormat {
    fn default() -> Self {
        ValueFormat::Fixed(6)
    }
}

/// The built-in newline-delimited encoder.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LineEncoder {
    dialect: Dialect,
    value_format: ValueFormat,
}

impl LineEncoder {
    /// Creates a new `LineEncoder` for the given dialect, formatting values with six decimal digits.
    pub fn new(dialect: Dialect) -> Self {
        LineEncoder { dialect, value_format: ValueFormat::default() }
    }

    /// Sets how values are formatted.
    #[must_use]
    pub fn with_value_format(mut self, value_format: ValueFormat) -> Self {
        self.value_format = value_format;
        self
    }

    /// Returns the dialect of this encoder.
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Returns how this encoder formats values.
    pub fn value_format(&self) -> ValueFormat {
        self.value_format
    }

    // StatsD and DogStatsD read `ms` timings in milliseconds; Telegraf keeps seconds.
    fn wire_value(&self, observation: &Observation<'_>) -> f64 {
        match (observation.kind, self.dialect) {
            (Kind::Timing, Dialect::StatsD | Dialect::DogStatsD) => observation.value * 1000.0,
            _ => observation.value,
        }
    }

    fn write_value(&self, buf: &mut String, value: f64) {
        match self.value_format {
            ValueFormat::Fixed(precision) => {
                let _ = write!(buf, "{value:.precision$}");
            }
            ValueFormat::Shortest => buf.push_str(ryu::Buffer::new().format(value)),
        }
    }
}

impl Encoder for LineEncoder {
    fn encode(&self, observation: &Observation<'_>, buf: &mut String) {
        buf.push_str(observation.name);

        if self.dialect == Dialect::Telegraf {
            for tag in observation.tags {
                buf.push(',');
                write_telegraf_tag(buf, tag);
            }
        }

        buf.push(':');
        self.write_value(buf, self.wire_value(observation));
        buf.push('|');
        buf.push_str(kind_suffix(observation.kind));

        if self.dialect == Dialect::DogStatsD && !observation.tags.is_empty() {
            buf.push_str("|#");
            for (i, tag) in observation.tags.iter().enumerate() {
                if i > 0 {
                    buf.push(',');
                }
                buf.push_str(tag);
            }
        }

        buf.push('\n');
    }
}

const fn kind_suffix(kind: Kind) -> &'static str {
    match kind {
        Kind::Gauge => "g",
        Kind::Count => "c",
        Kind::Histogram => "h",
        Kind::Timing => "ms",
    }
}

fn write_telegraf_tag(buf: &mut String, tag: &str) {
    // Only the first separator becomes `=`: values may legitimately contain colons.
    match tag.split_once(':') {
        Some((key, value)) => {
            buf.push_str(key);
            buf.push('=');
            buf.push_str(value);
        }
        None => buf.push_str(tag),
    }
}
