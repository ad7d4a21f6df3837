//! A generic client for service instrumentation.
//!
//! Rather than creating one handle per metric, `xstats` uses a single client to report every observation an
//! application makes: gauges, counts, histograms and timings, each with optional tags. Observations are handed to a
//! [`Sender`], which knows how to deliver them to a metrics system such as StatsD, DogStatsD or Telegraf.
//!
//! # Usage
//!
//! ```
//! # use std::{sync::Arc, time::Duration};
//! # use xstats::{debugging::RecordingSender, Sender, XStater, XStats};
//! // Any `Sender` will do; exporter crates provide ones that talk to real collectors.
//! let sender = Arc::new(RecordingSender::new());
//!
//! // Create a client with a prefix, and attach tags that will be sent with every observation.
//! let xs = XStats::with_prefix(sender.clone(), "svc.");
//! xs.add_tags(&["env:prod"]);
//!
//! // Call-site tags come first, followed by the client's own tags.
//! xs.count("requests", 1.0, &["route:/x"]);
//! assert_eq!(sender.last().unwrap().stat, "svc.requests");
//! assert_eq!(sender.last().unwrap().tags, vec!["route:/x", "env:prod"]);
//!
//! // Derived clients never share tags with their parent.
//! let db = xs.scope("db", &[]);
//! db.add_tags(&["table:users"]);
//! db.timing("query", Duration::from_millis(12), &[]);
//! assert_eq!(sender.last().unwrap().stat, "svc.db.query");
//! assert_eq!(xs.get_tags(), vec!["env:prod"]);
//! ```
//!
//! # Per-request clients
//!
//! Each request can carry its own client, with its own tags, for the lifetime of the request. See the [`context`]
//! module for storing and retrieving a client in request-scoped storage, and [`Handler`] for wrapping a unit of
//! request work. Looking up a client that was never stored returns the [`Nop`] client, so instrumented code never has
//! to check whether metrics are configured.
//!
//! # Pooling
//!
//! Clients recycle their buffers through a [`Pool`] when closed. Closing clears a client completely before its
//! buffers can be reused, so a handle kept past `close` silently stops reporting rather than observing data that
//! belongs to another request.
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]

mod client;
pub use self::client::{XStater, XStats, XStatsBuilder};

pub mod context;
pub use self::context::Handler;

pub mod debugging;

mod error;
pub use self::error::Error;

mod multi;
pub use self::multi::MultiSender;

mod nop;
pub use self::nop::{nop, Nop};

mod pool;
pub use self::pool::Pool;

mod sender;
pub use self::sender::{close, Kind, Observation, Sender};

mod tags;
pub use self::tags::TagSet;
