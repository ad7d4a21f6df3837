use std::{io::Write, time::Duration};

use thiserror::Error;

use crate::{
    encoder::{Dialect, Encoder, LineEncoder, ValueFormat},
    forwarder::{Connection, RemoteAddr},
    sender::StatsdSender,
    transport::BufferedTransport,
};

const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);
const DEFAULT_MAX_PACKET_LEN: usize = 1 << 15;
const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(1);

// Smallest packet able to hold a complete line.
const MIN_PACKET_LEN: usize = "a:0|c\n".len();

/// Errors that could occur while building a StatsD sender.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Failed to parse the remote address.
    #[error("invalid remote address: {reason}")]
    InvalidRemoteAddress {
        /// Details about the parsing failure.
        reason: String,
    },

    /// The maximum packet length is too small to hold any line.
    #[error("invalid maximum packet length: {len}")]
    InvalidPacketLength {
        /// The rejected length.
        len: usize,
    },

    /// The flush interval was zero.
    #[error("flush interval must be greater than zero")]
    InvalidFlushInterval,

    /// Failed to spawn the background thread.
    #[error("failed to spawn background thread for transport")]
    Backend(#[source] std::io::Error),
}

/// Builder for a StatsD sender.
pub struct StatsdBuilder {
    remote_addr: RemoteAddr,
    write_timeout: Duration,
    max_packet_len: usize,
    flush_interval: Duration,
    line_encoder: LineEncoder,
    encoder: Option<Box<dyn Encoder>>,
}

impl StatsdBuilder {
    /// Creates a new `StatsdBuilder` with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the remote address to send metrics to.
    ///
    /// For UDP, the address simply needs to be in the format of `<host>:<port>`. For Unix domain sockets, an address in
    /// the format of `<scheme>://<path>`. The scheme can be either `unix` or `unixgram`, for a stream (`SOCK_STREAM`)
    /// or datagram (`SOCK_DGRAM`) socket, respectively.
    ///
    /// Payloads sent over a `unix` stream socket are framed with a 4-byte little-endian length prefix, as expected by
    /// the Datadog Agent. UDP and `unixgram` payloads are sent as-is.
    ///
    /// Defaults to sending to `127.0.0.1:8125` over UDP.
    ///
    /// # Errors
    ///
    /// If the given address is not able to be parsed as a valid address, an error will be returned indicating the
    /// reason.
    pub fn with_remote_address<A>(mut self, addr: A) -> Result<Self, BuildError>
    where
        A: AsRef<str>,
    {
        self.remote_addr = RemoteAddr::try_from(addr.as_ref())
            .map_err(|reason| BuildError::InvalidRemoteAddress { reason })?;
        Ok(self)
    }

    /// Set the write timeout for sending packets.
    ///
    /// When the write timeout is reached, the write operation will be aborted and the packet being sent at the time
    /// will be dropped without retrying.
    ///
    /// Defaults to 1 second.
    #[must_use]
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the maximum packet length.
    ///
    /// Lines are accumulated until adding another would exceed this length, at which point the packet is sent. A
    /// single line longer than this is sent on its own.
    ///
    /// This should be no larger than what the collector accepts in one read. For UDP over a typical network, values
    /// around 1432 avoid fragmentation.
    ///
    /// Defaults to 32768 bytes.
    #[must_use]
    pub fn with_maximum_packet_length(mut self, max_packet_len: usize) -> Self {
        self.max_packet_len = max_packet_len;
        self
    }

    /// Set the flush interval.
    ///
    /// Buffered lines are sent at least this often, even when the packet is not full.
    ///
    /// Defaults to 1 second.
    #[must_use]
    pub fn with_flush_interval(mut self, flush_interval: Duration) -> Self {
        self.flush_interval = flush_interval;
        self
    }

    /// Set the dialect observations are encoded in.
    ///
    /// Defaults to [`Dialect::StatsD`], which drops tags.
    #[must_use]
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.line_encoder = LineEncoder::new(dialect).with_value_format(self.line_encoder.value_format());
        self
    }

    /// Set how metric values are formatted.
    ///
    /// Defaults to six decimal digits.
    #[must_use]
    pub fn with_value_format(mut self, value_format: ValueFormat) -> Self {
        self.line_encoder = self.line_encoder.with_value_format(value_format);
        self
    }

    /// Use a custom encoder.
    ///
    /// This takes precedence over [`with_dialect`](Self::with_dialect) and
    /// [`with_value_format`](Self::with_value_format).
    #[must_use]
    pub fn with_encoder<E>(mut self, encoder: E) -> Self
    where
        E: Encoder + 'static,
    {
        self.encoder = Some(Box::new(encoder));
        self
    }

    /// Builds the sender, connected to the configured remote address.
    ///
    /// The connection is established lazily, when the first packet is sent.
    ///
    /// # Errors
    ///
    /// If the configuration is invalid, or if the background thread cannot be spawned, an error will be returned.
    pub fn build(self) -> Result<StatsdSender, BuildError> {
        let connection = Connection::new(self.remote_addr.clone(), self.write_timeout);
        self.build_with_writer(connection)
    }

    /// Builds the sender, writing packets to the given writer instead of a network connection.
    ///
    /// Each packet is written with a single call to `write_all`.
    ///
    /// # Errors
    ///
    /// If the configuration is invalid, or if the background thread cannot be spawned, an error will be returned.
    pub fn build_with_writer<W>(self, writer: W) -> Result<StatsdSender, BuildError>
    where
        W: Write + Send + 'static,
    {
        if self.max_packet_len < MIN_PACKET_LEN {
            return Err(BuildError::InvalidPacketLength { len: self.max_packet_len });
        }

        let transport = BufferedTransport::new(writer, self.flush_interval, self.max_packet_len)?;
        let encoder = self.encoder.unwrap_or_else(|| Box::new(self.line_encoder));

        Ok(StatsdSender::new(encoder, transport))
    }
}

impl Default for StatsdBuilder {
    fn default() -> Self {
        StatsdBuilder {
            remote_addr: RemoteAddr::default(),
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            max_packet_len: DEFAULT_MAX_PACKET_LEN,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            line_encoder: LineEncoder::default(),
            encoder: None,
        }
    }
}
