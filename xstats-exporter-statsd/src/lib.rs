//! A StatsD sender for [`xstats`].
//!
//! Observations are encoded as newline-terminated lines in one of three dialects (plain StatsD, DogStatsD or
//! Telegraf), accumulated into packets by a background thread, and sent over UDP or a Unix domain socket.
//!
//! ## Packets
//!
//! Lines are never split across packets. A packet is sent when the next line would not fit in it, when it reaches the
//! maximum packet length, when the flush interval elapses, or when the sender is closed. A single line longer than the
//! maximum packet length is sent on its own.
//!
//! Sending is best-effort: failed writes are logged, counted in the sender's [`Telemetry`], and the packet is dropped.
//!
//! ## Usage
//!
//! ```no_run
//! # use std::{sync::Arc, time::Duration};
//! # use xstats::{Sender as _, XStater as _, XStats};
//! # use xstats_exporter_statsd::{Dialect, StatsdBuilder};
//! let sender = StatsdBuilder::new()
//!     .with_remote_address("127.0.0.1:8125")?
//!     .with_dialect(Dialect::DogStatsD)
//!     .with_flush_interval(Duration::from_millis(500))
//!     .build()?;
//! let sender = Arc::new(sender);
//!
//! let xs = XStats::with_prefix(sender.clone(), "svc.");
//! xs.add_tags(&["env:prod"]);
//! xs.count("requests", 1.0, &["route:/x"]);
//!
//! // Sends anything still buffered.
//! sender.close()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]

mod builder;
pub use self::builder::{BuildError, StatsdBuilder};

mod encoder;
pub use self::encoder::{Dialect, Encoder, LineEncoder, ValueFormat};

mod forwarder;
pub use self::forwarder::{Connection, RemoteAddr};

mod sender;
pub use self::sender::StatsdSender;

mod telemetry;
pub use self::telemetry::{Telemetry, TelemetrySnapshot};

mod transport;
pub use self::transport::BufferedTransport;
