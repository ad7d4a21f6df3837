use std::{borrow::Cow, fmt, sync::Arc, time::Duration};

use parking_lot::RwLock;

use crate::{
    pool::{Parts, Pool},
    Error, Sender, TagSet,
};

const DEFAULT_DELIMITER: &str = ".";

/// A [`Sender`] that carries its own tags and metric name prefix.
///
/// Every observation sent through an `XStater` has the stored prefix prepended to its name, and the stored tags
/// appended after the call-site tags.
pub trait XStater: Sender {
    /// Adds tags in the `key:value` form. They will be sent with all subsequent observations.
    ///
    /// A tag whose key is already present replaces the previous value.
    fn add_tags(&self, tags: &[&str]);

    /// Adds a single tag. An empty value produces a bare tag.
    fn add_tag(&self, key: &str, value: &str);

    /// Returns a copy of the tags that will be sent along with every observation.
    fn get_tags(&self) -> Vec<String>;

    /// Returns an independent copy sharing the same underlying sender.
    fn copy(&self) -> Box<dyn XStater>;

    /// Returns an independent copy whose prefix is extended with the given scope segments.
    fn scope(&self, scope: &str, scopes: &[&str]) -> Box<dyn XStater>;
}

struct State {
    sender: Option<Arc<dyn Sender>>,
    parts: Parts,
    delimiter: String,
}

fn qualify<'a>(prefix: &str, stat: &'a str) -> Cow<'a, str> {
    if prefix.is_empty() {
        Cow::Borrowed(stat)
    } else {
        let mut name = String::with_capacity(prefix.len() + stat.len());
        name.push_str(prefix);
        name.push_str(stat);
        Cow::Owned(name)
    }
}

/// A scoped, tagged client wrapping a [`Sender`].
///
/// `XStats` is typically created once per unit of work (an incoming request, a background job) so that contextual
/// tags can be attached once and then carried by every observation made during that unit of work. Clients can be
/// derived with [`copy`](XStats::copy) and [`scope`](XStats::scope); derived clients share the underlying sender but
/// never the tags, so mutating one never affects the other.
///
/// All methods take `&self`: a single client can be shared between threads, with tag updates guarded by a lock.
///
/// Closing a client (via [`Sender::close`]) clears its sender, tags and prefix and returns its buffers to its
/// [`Pool`]. Any handle still pointing at a closed client behaves like [`Nop`](crate::Nop).
pub struct XStats {
    state: RwLock<State>,
    pool: Option<Arc<Pool>>,
}

impl XStats {
    /// Creates a new client for the given sender, with no prefix.
    pub fn new(sender: Arc<dyn Sender>) -> Self {
        XStatsBuilder::new(sender).build()
    }

    /// Creates a new client for the given sender. The prefix is prepended verbatim to all metric names.
    pub fn with_prefix<P: Into<String>>(sender: Arc<dyn Sender>, prefix: P) -> Self {
        XStatsBuilder::new(sender).with_prefix(prefix).build()
    }

    /// Creates a new client for the given sender with initial scopes.
    ///
    /// The prefix is the scopes joined by `delimiter`, followed by a trailing `delimiter`.
    pub fn with_scopes(sender: Arc<dyn Sender>, delimiter: &str, scopes: &[&str]) -> Self {
        XStatsBuilder::new(sender).with_delimiter(delimiter).with_scopes(scopes).build()
    }

    /// Creates a builder for a client wrapping the given sender.
    pub fn builder(sender: Arc<dyn Sender>) -> XStatsBuilder {
        XStatsBuilder::new(sender)
    }

    fn from_parts(
        pool: Option<Arc<Pool>>,
        sender: Option<Arc<dyn Sender>>,
        tags: &TagSet,
        prefix: &str,
        delimiter: &str,
    ) -> Self {
        let mut parts = pool.as_ref().map_or_else(Parts::default, |pool| pool.acquire());
        parts.prefix.push_str(prefix);
        parts.tags.clone_from(tags);

        XStats {
            state: RwLock::new(State { sender, parts, delimiter: delimiter.to_string() }),
            pool,
        }
    }

    /// Returns the prefix prepended to every metric name.
    pub fn prefix(&self) -> String {
        self.state.read().parts.prefix.clone()
    }

    /// Returns the delimiter used to join scopes.
    pub fn delimiter(&self) -> String {
        self.state.read().delimiter.clone()
    }

    /// Returns `true` if the client still has a sender, that is, it has not been closed.
    pub fn is_active(&self) -> bool {
        self.state.read().sender.is_some()
    }

    /// Returns an independent copy of this client.
    ///
    /// The copy shares the sender, prefix and delimiter, and starts with a duplicate of the current tags.
    pub fn copy(&self) -> XStats {
        let state = self.state.read();
        XStats::from_parts(
            self.pool.clone(),
            state.sender.clone(),
            &state.parts.tags,
            &state.parts.prefix,
            &state.delimiter,
        )
    }

    /// Returns an independent copy of this client with the given segments appended to its prefix.
    ///
    /// Segments are joined with the client's delimiter, and any trailing delimiter on the current prefix is trimmed
    /// before joining so that scopes never produce a doubled delimiter.
    pub fn scope(&self, scope: &str, scopes: &[&str]) -> XStats {
        let state = self.state.read();
        let prefix = scoped_prefix(&state.parts.prefix, &state.delimiter, scope, scopes);
        XStats::from_parts(
            self.pool.clone(),
            state.sender.clone(),
            &state.parts.tags,
            &prefix,
            &state.delimiter,
        )
    }

    fn emit<F>(&self, stat: &str, tags: &[&str], send: F)
    where
        F: FnOnce(&dyn Sender, &str, &[&str]),
    {
        // The lock is released before forwarding: the sender may block on its transport.
        let (sender, name, stored) = {
            let state = self.state.read();
            let Some(sender) = state.sender.clone() else {
                return;
            };
            (sender, qualify(&state.parts.prefix, stat), state.parts.tags.tags())
        };

        let mut merged = Vec::with_capacity(tags.len() + stored.len());
        merged.extend_from_slice(tags);
        merged.extend(stored.iter().map(String::as_str));
        send(&*sender, &*name, merged.as_slice());
    }
}

impl Sender for XStats {
    fn gauge(&self, stat: &str, value: f64, tags: &[&str]) {
        self.emit(stat, tags, |sender, name, tags| sender.gauge(name, value, tags));
    }

    fn count(&self, stat: &str, count: f64, tags: &[&str]) {
        self.emit(stat, tags, |sender, name, tags| sender.count(name, count, tags));
    }

    fn histogram(&self, stat: &str, value: f64, tags: &[&str]) {
        self.emit(stat, tags, |sender, name, tags| sender.histogram(name, value, tags));
    }

    fn timing(&self, stat: &str, duration: Duration, tags: &[&str]) {
        self.emit(stat, tags, |sender, name, tags| sender.timing(name, duration, tags));
    }

    /// Clears the client and returns its buffers to the pool.
    ///
    /// The underlying sender is not closed: it is usually shared with other clients.
    fn close(&self) -> Result<(), Error> {
        let parts = {
            let mut state = self.state.write();
            state.sender = None;
            state.delimiter.clear();
            std::mem::take(&mut state.parts)
        };

        if let Some(pool) = &self.pool {
            pool.release(parts);
        }

        Ok(())
    }
}

impl XStater for XStats {
    fn add_tags(&self, tags: &[&str]) {
        self.state.write().parts.tags.add_tags(tags);
    }

    fn add_tag(&self, key: &str, value: &str) {
        self.state.write().parts.tags.add_tag(key, value);
    }

    fn get_tags(&self) -> Vec<String> {
        self.state.read().parts.tags.tags()
    }

    fn copy(&self) -> Box<dyn XStater> {
        Box::new(XStats::copy(self))
    }

    fn scope(&self, scope: &str, scopes: &[&str]) -> Box<dyn XStater> {
        Box::new(XStats::scope(self, scope, scopes))
    }
}

impl fmt::Debug for XStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("XStats")
            .field("active", &state.sender.is_some())
            .field("prefix", &state.parts.prefix)
            .field("delimiter", &state.delimiter)
            .field("tags", &state.parts.tags)
            .field("pooled", &self.pool.is_some())
            .finish()
    }
}

fn scoped_prefix(prefix: &str, delimiter: &str, scope: &str, scopes: &[&str]) -> String {
    let parent = if delimiter.is_empty() { prefix } else { prefix.trim_end_matches(delimiter) };

    let mut segments = Vec::with_capacity(2 + scopes.len());
    if !parent.is_empty() {
        segments.push(parent);
    }
    segments.push(scope);
    segments.extend_from_slice(scopes);

    let mut prefix = segments.join(delimiter);
    prefix.push_str(delimiter);
    prefix
}

/// Builder for an [`XStats`] client.
pub struct XStatsBuilder {
    sender: Arc<dyn Sender>,
    prefix: String,
    delimiter: String,
    scopes: Vec<String>,
    tags: TagSet,
    pool: Option<Arc<Pool>>,
}

impl XStatsBuilder {
    /// Creates a new `XStatsBuilder` for the given sender.
    pub fn new(sender: Arc<dyn Sender>) -> Self {
        XStatsBuilder {
            sender,
            prefix: String::new(),
            delimiter: DEFAULT_DELIMITER.to_string(),
            scopes: Vec::new(),
            tags: TagSet::new(),
            pool: Some(Pool::global()),
        }
    }

    /// Sets a prefix prepended verbatim to every metric name.
    ///
    /// Ignored when scopes are set with [`with_scopes`](XStatsBuilder::with_scopes).
    #[must_use]
    pub fn with_prefix<P: Into<String>>(mut self, prefix: P) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Sets the delimiter used to join scopes.
    ///
    /// Defaults to `.`.
    #[must_use]
    pub fn with_delimiter<D: Into<String>>(mut self, delimiter: D) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    /// Sets the initial scopes. The prefix becomes the scopes joined by the delimiter, plus a trailing delimiter.
    #[must_use]
    pub fn with_scopes<S: AsRef<str>>(mut self, scopes: &[S]) -> Self {
        self.scopes = scopes.iter().map(|scope| scope.as_ref().to_string()).collect();
        self
    }

    /// Sets the initial tags, in the `key:value` form.
    #[must_use]
    pub fn with_tags<S: AsRef<str>>(mut self, tags: &[S]) -> Self {
        self.tags.add_tags(tags);
        self
    }

    /// Recycles client buffers through the given pool instead of the global one.
    #[must_use]
    pub fn with_pool(mut self, pool: Arc<Pool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Disables buffer recycling for this client and every client derived from it.
    #[must_use]
    pub fn without_pooling(mut self) -> Self {
        self.pool = None;
        self
    }

    /// Builds the client.
    pub fn build(self) -> XStats {
        let prefix = if self.scopes.is_empty() {
            self.prefix
        } else {
            let mut prefix = self.scopes.join(&self.delimiter);
            prefix.push_str(&self.delimiter);
            prefix
        };

        XStats::from_parts(self.pool, Some(self.sender), &self.tags, &prefix, &self.delimiter)
    }
}
