//! Serving a single request.
//!
//! [`Server`] glues the three collaborators of one request-response cycle:
//! the request it was created with, a chain built from its middleware list,
//! and an [`Emitter`] that writes the result out. It is the shape used by
//! CGI-style front ends, tests and tools that already hold a request; for
//! listening on a socket see [`HttpServer`](crate::HttpServer).

use std::sync::Arc;

use tracing::debug;

use crate::chain::Chain;
use crate::container::Container;
use crate::emitter::{Emitter, StreamEmitter};
use crate::error::Error;
use crate::middleware::MiddlewareRef;
use crate::request::Request;
use crate::response::Response;

/// Dispatches one request and emits the response.
///
/// ```rust
/// use tether::{MiddlewareRef, Request, Response, Server};
///
/// let server = Server::new(
///     vec![MiddlewareRef::func(|_req, _next| Ok(Response::text("ok")))],
///     Request::get("/"),
/// );
/// let res = server.handle(None).unwrap();
/// assert_eq!(res.body().as_ref(), b"ok");
/// ```
pub struct Server {
    middleware: Vec<MiddlewareRef>,
    request: Request,
    emitter: Option<Box<dyn Emitter>>,
}

impl Server {
    pub fn new(middleware: Vec<MiddlewareRef>, request: Request) -> Self {
        Self { middleware, request, emitter: None }
    }

    pub fn request(&self) -> &Request { &self.request }

    pub fn set_request(&mut self, request: Request) {
        self.request = request;
    }

    /// Replaces the default stdout emitter.
    pub fn set_emitter(&mut self, emitter: impl Emitter + 'static) {
        self.emitter = Some(Box::new(emitter));
    }

    /// Drops a custom emitter, going back to stdout.
    pub fn reset(&mut self) {
        self.emitter = None;
    }

    /// Dispatches the current request through a fresh chain.
    ///
    /// An empty middleware list fails here, as a configuration error.
    pub fn handle(&self, container: Option<Arc<dyn Container>>) -> Result<Response, Error> {
        let mut chain = Chain::new(self.middleware.clone(), container)?;
        chain.dispatch(self.request.clone())
    }

    pub fn emit(&mut self, response: Response) -> Result<(), Error> {
        debug!(status = response.status_code().as_u16(), "emitting response");
        match &mut self.emitter {
            Some(emitter) => emitter.emit(response),
            None => StreamEmitter::stdout().emit(response),
        }
    }

    /// [`handle`](Self::handle) followed by [`emit`](Self::emit).
    pub fn listen(&mut self, container: Option<Arc<dyn Container>>) -> Result<(), Error> {
        let response = self.handle(container)?;
        self.emit(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use http::StatusCode;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<Response>>>);

    impl Emitter for Captured {
        fn emit(&mut self, response: Response) -> Result<(), Error> {
            self.0.lock().unwrap().push(response);
            Ok(())
        }
    }

    fn echo_path() -> Vec<MiddlewareRef> {
        vec![MiddlewareRef::func(|req, _| Ok(Response::text(req.path().to_owned())))]
    }

    #[test]
    fn listen_emits_dispatched_response() {
        let captured = Captured::default();
        let mut server = Server::new(echo_path(), Request::get("/first"));
        server.set_emitter(captured.clone());

        server.listen(None).unwrap();
        server.set_request(Request::get("/second"));
        server.listen(None).unwrap();

        let bodies: Vec<_> = captured.0.lock().unwrap().iter().map(|r| r.body().clone()).collect();
        assert_eq!(bodies, ["/first", "/second"]);
    }

    #[test]
    fn empty_middleware_fails_before_emitting() {
        let captured = Captured::default();
        let mut server = Server::new(Vec::new(), Request::get("/"));
        server.set_emitter(captured.clone());

        let err = server.listen(None).err().unwrap();
        assert!(err.is_config());
        assert!(captured.0.lock().unwrap().is_empty());
    }

    #[test]
    fn handle_passes_container_through() {
        let registry = crate::Registry::new()
            .func("gone", |_, _| Ok(Response::status(StatusCode::GONE)));
        let server = Server::new(vec!["gone".into()], Request::get("/"));

        let res = server.handle(Some(Arc::new(registry))).unwrap();
        assert_eq!(res.status_code(), StatusCode::GONE);
        assert_eq!(server.request().path(), "/");
    }
}
