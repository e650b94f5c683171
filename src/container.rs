//! Lookup service for named middleware.
//!
//! A chain holds an optional `Arc<dyn Container>` and asks it for a unit only
//! when a [`MiddlewareRef::Named`](crate::MiddlewareRef::Named) entry is
//! reached. The chain never mutates the container.
//!
//! Entries are type-erased so a container can serve more than middleware;
//! the resolver accepts an entry only if it is an `Arc<dyn Middleware>`.
//! [`Registry::middleware`] stores units in exactly that shape.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::Error;
use crate::handler::Handler;
use crate::middleware::{FnMiddleware, Middleware};
use crate::request::Request;
use crate::response::Response;

/// A type-erased service handed out by a [`Container`].
pub type Entry = Arc<dyn Any + Send + Sync>;

/// Resolves symbolic names into services.
///
/// Implementations that build entries on demand should memoise expensive
/// construction; the chain does not cache and asks again on every dispatch.
pub trait Container: Send + Sync {
    fn get(&self, id: &str) -> Result<Entry, LookupError>;

    fn has(&self, id: &str) -> bool {
        self.get(id).is_ok()
    }
}

/// No entry is registered under the requested name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LookupError {
    id: String,
}

impl LookupError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn id(&self) -> &str { &self.id }
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no entry registered for `{}`", self.id)
    }
}

impl std::error::Error for LookupError {}

// ── Registry ─────────────────────────────────────────────────────────────────

/// In-memory [`Container`] filled once at startup.
///
/// ```rust
/// use std::sync::Arc;
/// use tether::{Chain, MiddlewareRef, Registry, Request, Response};
///
/// let registry = Registry::new()
///     .func("hello", |_req, _next| Ok(Response::text("hello")));
///
/// let mut chain = Chain::new(vec![MiddlewareRef::named("hello")], Some(Arc::new(registry))).unwrap();
/// let res = chain.dispatch(Request::get("/")).unwrap();
/// assert_eq!(res.body().as_ref(), b"hello");
/// ```
#[derive(Clone, Default)]
pub struct Registry {
    entries: HashMap<String, Entry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a middleware instance under `id`.
    pub fn middleware<M: Middleware + 'static>(self, id: &str, middleware: M) -> Self {
        self.shared(id, Arc::new(middleware))
    }

    /// Registers a function unit under `id`.
    pub fn func<F>(self, id: &str, f: F) -> Self
    where
        F: Fn(Request, &mut dyn Handler) -> Result<Response, Error> + Send + Sync + 'static,
    {
        self.shared(id, Arc::new(FnMiddleware(Arc::new(f))))
    }

    /// Registers a unit that is already shared.
    pub fn shared(self, id: &str, middleware: Arc<dyn Middleware>) -> Self {
        self.service(id, middleware)
    }

    /// Registers an arbitrary service. Named middleware references that hit
    /// one of these fail as invalid middleware.
    pub fn service<T: Any + Send + Sync>(mut self, id: &str, service: T) -> Self {
        self.entries.insert(id.to_owned(), Arc::new(service));
        self
    }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

impl Container for Registry {
    fn get(&self, id: &str) -> Result<Entry, LookupError> {
        self.entries.get(id)
            .map(Arc::clone)
            .ok_or_else(|| LookupError::not_found(id))
    }

    fn has(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<_> = self.entries.keys().collect();
        ids.sort();
        f.debug_struct("Registry").field("ids", &ids).finish()
    }
}
