//! The middleware dispatcher.
//!
//! # Cursor
//!
//! A [`Chain`] owns its reference list and one cursor. The cursor is idle
//! between dispatches, set to `0` by [`Chain::dispatch`] and moved forward by
//! exactly one every time a unit calls the continuation:
//!
//! ```text
//! Idle ──dispatch──▶ Active(0) ──handle──▶ Active(1) ──handle──▶ … Active(n-1)
//!                        │                     │                        │
//!                        └──── unit returns ───┴──▶ Terminated          └──handle──▶ Exhausted (error)
//! ```
//!
//! Both entry points take `&mut self`, so the borrow checker already rules
//! out two requests sharing one cursor. Servers handling requests in
//! parallel clone the chain per request; the clone shares the reference list
//! and the container and starts idle.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::container::Container;
use crate::error::{ConfigError, Error};
use crate::handler::Handler;
use crate::middleware::{Middleware, MiddlewareRef};
use crate::request::Request;
use crate::response::Response;

/// An ordered, non-empty sequence of middleware producing one response per
/// request.
///
/// ```rust
/// use http::StatusCode;
/// use tether::{Chain, MiddlewareRef, Request, Response};
///
/// let mut chain = Chain::new(vec![
///     MiddlewareRef::func(|req, next| {
///         let mut res = next.handle(req)?;
///         res.append_header("X-Wrapped", "1");
///         Ok(res)
///     }),
///     MiddlewareRef::func(|_req, _next| Ok(Response::text("ok"))),
/// ], None).unwrap();
///
/// let res = chain.dispatch(Request::get("/")).unwrap();
/// assert_eq!(res.status_code(), StatusCode::OK);
/// assert_eq!(res.header("x-wrapped"), Some("1"));
/// ```
pub struct Chain {
    middleware: Arc<[MiddlewareRef]>,
    container: Option<Arc<dyn Container>>,
    cursor: Option<usize>,
}

impl Chain {
    /// Fails with a configuration error if `middleware` is empty.
    pub fn new(
        middleware: Vec<MiddlewareRef>,
        container: Option<Arc<dyn Container>>,
    ) -> Result<Self, Error> {
        if middleware.is_empty() {
            return Err(ConfigError::EmptyChain.into());
        }
        Ok(Self { middleware: middleware.into(), container, cursor: None })
    }

    pub fn len(&self) -> usize { self.middleware.len() }

    /// Always `false`; construction rejects empty chains.
    pub fn is_empty(&self) -> bool { self.middleware.is_empty() }

    /// Index of the unit currently running, `None` outside of a dispatch.
    pub fn cursor(&self) -> Option<usize> { self.cursor }

    /// Runs `request` through the chain from the first unit.
    ///
    /// Whatever the units produce, response or error, is returned unchanged.
    /// The cursor is idle again afterwards, so the chain can be dispatched
    /// again.
    pub fn dispatch(&mut self, request: Request) -> Result<Response, Error> {
        debug!(method = %request.method(), path = request.path(), units = self.len(), "dispatch");

        self.cursor = Some(0);
        let result = self.run(0, request);
        self.cursor = None;

        match &result {
            Ok(res) => debug!(status = res.status_code().as_u16(), "dispatch finished"),
            Err(e) => debug!(error = %e, "dispatch failed"),
        }
        result
    }

    fn run(&mut self, index: usize, request: Request) -> Result<Response, Error> {
        let unit = self.resolve(index)?;
        unit.process(request, self)
    }

    fn resolve(&self, index: usize) -> Result<Arc<dyn Middleware>, Error> {
        let reference = self.middleware.get(index).ok_or(Error::Exhausted)?;
        trace!(index, kind = reference.kind(), "resolving middleware");
        reference.resolve(self.container.as_deref())
    }
}

impl Handler for Chain {
    /// Advances the cursor and runs the next unit.
    ///
    /// Fails with [`Error::Exhausted`] past the last unit and with
    /// [`Error::NotDispatched`] when no dispatch is in progress.
    fn handle(&mut self, request: Request) -> Result<Response, Error> {
        let Some(current) = self.cursor else {
            return Err(Error::NotDispatched);
        };
        let index = current + 1;
        self.cursor = Some(index);

        if index >= self.middleware.len() {
            warn!(units = self.len(), "middleware chain exhausted without a response");
            return Err(Error::Exhausted);
        }
        self.run(index, request)
    }
}

/// The clone shares references and container, and starts idle.
impl Clone for Chain {
    fn clone(&self) -> Self {
        Self {
            middleware: Arc::clone(&self.middleware),
            container: self.container.clone(),
            cursor: None,
        }
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("middleware", &self.middleware)
            .field("container", &self.container.is_some())
            .field("cursor", &self.cursor)
            .finish()
    }
}
