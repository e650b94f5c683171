//! # tether
//!
//! Ordered middleware dispatch for HTTP services.
//!
//! ## The contract
//!
//! A [`Chain`] is a fixed list of middleware. A request enters at the first
//! unit; every unit either answers it or hands it to the rest of the chain
//! and gets the answer back. Exactly one response comes out, or an error.
//!
//! Units are declared three ways and may be mixed freely:
//!
//! - **functions** — `|req, next| ...` closures or `fn` items
//! - **names** — looked up in a [`Container`] only when reached
//! - **instances** — anything implementing [`Middleware`]
//!
//! What tether intentionally leaves to the units: routing, content
//! negotiation, sessions, error pages. The chain sequences, nothing more.
//!
//! ## Quick start
//!
//! ```rust
//! use http::StatusCode;
//! use tether::{Chain, Error, Handler, Middleware, MiddlewareRef, Registry, Request, Response};
//! use std::sync::Arc;
//!
//! struct RequireToken;
//!
//! impl Middleware for RequireToken {
//!     fn process(&self, req: Request, next: &mut dyn Handler) -> Result<Response, Error> {
//!         match req.header("x-token") {
//!             Some(_) => next.handle(req),
//!             None => Ok(Response::status(StatusCode::UNAUTHORIZED)),
//!         }
//!     }
//! }
//!
//! let registry = Registry::new().middleware("auth", RequireToken);
//!
//! let mut chain = Chain::new(vec![
//!     MiddlewareRef::named("auth"),
//!     MiddlewareRef::func(|_req, _next| Ok(Response::text("ok"))),
//! ], Some(Arc::new(registry))).unwrap();
//!
//! let denied = chain.dispatch(Request::get("/")).unwrap();
//! assert_eq!(denied.status_code(), StatusCode::UNAUTHORIZED);
//!
//! let allowed = chain.dispatch(Request::get("/").with_header("X-Token", "t")).unwrap();
//! assert_eq!(allowed.body().as_ref(), b"ok");
//! ```
//!
//! To put a chain on the network use [`HttpServer`]; to run a single request
//! and write the result somewhere use [`Server`] with an [`Emitter`].

mod chain;
mod container;
mod emitter;
mod error;
mod handler;
mod http_server;
mod request;
mod response;
mod server;

pub mod middleware;

pub use chain::Chain;
pub use container::{Container, Entry, LookupError, Registry};
pub use emitter::{Emitter, StreamEmitter};
pub use error::{ConfigError, Error, HttpError};
pub use handler::Handler;
pub use http_server::HttpServer;
pub use middleware::{Middleware, MiddlewareRef};
pub use request::Request;
pub use response::{ContentType, Response, ResponseBuilder};
pub use server::Server;
