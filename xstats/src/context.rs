//! Propagation of a per-request client through request-scoped storage.
//!
//! The crate does not assume any particular web framework. Instead, a framework provides somewhere to keep values for
//! the lifetime of a request (a type implementing [`StaterStore`]), and the functions in this module put a client in
//! there and get it back out. [`RequestContext`] is a ready-made store for frameworks without one.
//!
//! Retrieving a client from a store that has none never fails: the shared [`Nop`](crate::Nop) client is returned.
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use tracing::trace;

use crate::{nop, Sender as _, TagSet, XStater, XStats};

static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

const XSTATS_KEY: ContextKey = ContextKey(0);

/// An opaque key identifying a value in request-scoped storage.
///
/// Keys can only be minted through [`ContextKey::new`], which never returns a key already in use, so a key held
/// privately by a library cannot be forged by other code sharing the same store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContextKey(u64);

impl ContextKey {
    /// Creates a new, unique key.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        ContextKey(NEXT_KEY.fetch_add(1, Ordering::Relaxed))
    }
}

/// Request-scoped storage able to hold clients.
pub trait StaterStore {
    /// Associates `stater` with `key`, replacing any previous association.
    fn store(&mut self, key: ContextKey, stater: Arc<dyn XStater>);

    /// Returns the client associated with `key`, if any.
    fn load(&self, key: ContextKey) -> Option<Arc<dyn XStater>>;
}

/// A simple map-backed [`StaterStore`].
#[derive(Clone, Default)]
pub struct RequestContext {
    values: HashMap<ContextKey, Arc<dyn XStater>>,
}

impl RequestContext {
    /// Creates an empty `RequestContext`.
    pub fn new() -> Self {
        Self::default()
    }
}

impl StaterStore for RequestContext {
    fn store(&mut self, key: ContextKey, stater: Arc<dyn XStater>) {
        self.values.insert(key, stater);
    }

    fn load(&self, key: ContextKey) -> Option<Arc<dyn XStater>> {
        self.values.get(&key).cloned()
    }
}

/// Stores the given client in the request context.
pub fn new_context<C: StaterStore + ?Sized>(ctx: &mut C, xs: Arc<dyn XStater>) {
    ctx.store(XSTATS_KEY, xs);
}

/// Retrieves the request's client from the given context.
///
/// If there is none, the shared no-op client is returned so that it can be used without checking for its presence.
pub fn from_context<C: StaterStore + ?Sized>(ctx: &C) -> Arc<dyn XStater> {
    ctx.load(XSTATS_KEY).unwrap_or_else(nop)
}

/// Wraps units of request work with a per-request client.
///
/// For each call to [`handle`](Handler::handle), a fresh [`XStats`] is created with the handler's prefix and tags,
/// stored in the request context, and closed once the work is done.
pub struct Handler {
    sender: Arc<dyn crate::Sender>,
    tags: TagSet,
    prefix: String,
}

impl Handler {
    /// Creates a new `Handler`. The tags are added to every observation made through the per-request clients.
    pub fn new<S: AsRef<str>>(sender: Arc<dyn crate::Sender>, tags: &[S]) -> Self {
        Self::with_prefix(sender, tags, "")
    }

    /// Creates a new `Handler` whose per-request clients prepend `prefix` to every metric name.
    pub fn with_prefix<S, P>(sender: Arc<dyn crate::Sender>, tags: &[S], prefix: P) -> Self
    where
        S: AsRef<str>,
        P: Into<String>,
    {
        let mut tag_set = TagSet::new();
        tag_set.add_tags(tags);
        Handler { sender, tags: tag_set, prefix: prefix.into() }
    }

    /// Runs `next` with a per-request client stored in `ctx`.
    ///
    /// The client is closed when `next` returns, or unwinds, after which any handle to it that escaped the request is
    /// inert.
    pub fn handle<C, F, R>(&self, ctx: &mut C, next: F) -> R
    where
        C: StaterStore + ?Sized,
        F: FnOnce(&mut C) -> R,
    {
        let tags = self.tags.iter().collect::<Vec<_>>();
        let xs = Arc::new(
            XStats::builder(Arc::clone(&self.sender)).with_prefix(self.prefix.as_str()).with_tags(&tags).build(),
        );
        new_context(ctx, xs.clone());

        let _guard = CloseOnDrop(xs);
        next(ctx)
    }
}

struct CloseOnDrop(Arc<XStats>);

impl Drop for CloseOnDrop {
    fn drop(&mut self) {
        if let Err(e) = self.0.close() {
            trace!(error = %e, "Failed to close request client.");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        panic::{self, AssertUnwindSafe},
        sync::Arc,
    };

    use super::{from_context, new_context, ContextKey, Handler, RequestContext, StaterStore};
    use crate::{
        debugging::{Call, RecordingSender},
        Kind, Sender as _, XStater as _, XStats,
    };

    #[test]
    fn missing_client_yields_nop() {
        let ctx = RequestContext::new();
        let xs = from_context(&ctx);
        xs.add_tags(&["a:1"]);
        xs.count("c", 1.0, &[]);
        assert!(xs.get_tags().is_empty());
    }

    #[test]
    fn stored_client_is_retrieved() {
        let sender = Arc::new(RecordingSender::new());
        let mut ctx = RequestContext::new();
        new_context(&mut ctx, Arc::new(XStats::new(sender.clone())));

        let xs = from_context(&ctx);
        xs.add_tags(&["user:42"]);
        from_context(&ctx).gauge("g", 1.0, &[]);

        assert_eq!(sender.last(), Some(Call::new(Kind::Gauge, "g", 1.0, &["user:42"])));
    }

    #[test]
    fn keys_are_unique() {
        let a = ContextKey::new();
        let b = ContextKey::new();
        assert_ne!(a, b);

        let mut ctx = RequestContext::new();
        new_context(&mut ctx, Arc::new(XStats::new(Arc::new(RecordingSender::new()))));
        assert!(ctx.load(a).is_none());
    }

    #[test]
    fn handler_scopes_a_client_to_the_request() {
        let sender = Arc::new(RecordingSender::new());
        let handler = Handler::with_prefix(sender.clone(), &["envtag:val"], "api.");

        let mut ctx = RequestContext::new();
        let escaped = handler.handle(&mut ctx, |ctx| {
            let xs = from_context(&*ctx);
            xs.add_tags(&["route:/users"]);
            xs.count("requests", 1.0, &["method:get"]);
            xs
        });

        assert_eq!(
            sender.calls(),
            vec![Call::new(Kind::Count, "api.requests", 1.0, &["method:get", "envtag:val", "route:/users"])]
        );

        escaped.count("late", 1.0, &[]);
        assert_eq!(sender.calls().len(), 1);
        assert!(escaped.get_tags().is_empty());
    }

    #[test]
    fn handler_closes_the_client_when_the_request_panics() {
        let sender = Arc::new(RecordingSender::new());
        let handler = Handler::new(sender.clone(), &["envtag:val"]);

        let mut ctx = RequestContext::new();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            handler.handle(&mut ctx, |ctx| {
                from_context(&*ctx).add_tags(&["route:/boom"]);
                panic!("request failed");
            })
        }));
        assert!(result.is_err());

        let xs = from_context(&ctx);
        assert!(xs.get_tags().is_empty());
        xs.count("late", 1.0, &[]);
        assert!(sender.calls().is_empty());
    }

    #[test]
    fn handler_without_prefix() {
        let sender = Arc::new(RecordingSender::new());
        let handler = Handler::new(sender.clone(), &["a:1"]);

        let mut ctx = RequestContext::new();
        handler.handle(&mut ctx, |ctx| from_context(&*ctx).histogram("h", 2.0, &[]));

        assert_eq!(sender.last(), Some(Call::new(Kind::Histogram, "h", 2.0, &["a:1"])));
    }
}
