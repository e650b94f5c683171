//! Middleware units and how references to them are resolved.
//!
//! A chain is declared as a list of [`MiddlewareRef`]s, which may mix three
//! shapes:
//!
//! | Reference | Resolved into |
//! |---|---|
//! | [`MiddlewareRef::func`] | the closure wrapped in an adapter |
//! | [`MiddlewareRef::named`] | whatever the [`Container`] registered under that name |
//! | [`MiddlewareRef::instance`] | the instance itself |
//!
//! Resolution happens one entry at a time, when the chain's cursor reaches
//! it. A named unit behind a short-circuiting one is never looked up.

use std::fmt;
use std::sync::Arc;

use crate::container::Container;
use crate::error::{ConfigError, Error};
use crate::handler::Handler;
use crate::request::Request;
use crate::response::Response;

/// A request-processing unit.
///
/// A unit either answers the request itself or delegates to `next` and
/// returns (possibly after changing) what comes back.
///
/// ```rust
/// use tether::{Error, Handler, Middleware, Request, Response};
///
/// struct PoweredBy;
///
/// impl Middleware for PoweredBy {
///     fn process(&self, req: Request, next: &mut dyn Handler) -> Result<Response, Error> {
///         let mut res = next.handle(req)?;
///         res.append_header("X-Powered-By", "tether");
///         Ok(res)
///     }
/// }
/// ```
pub trait Middleware: Send + Sync {
    fn process(&self, request: Request, next: &mut dyn Handler) -> Result<Response, Error>;
}

/// Signature shared by every function unit.
pub type MiddlewareFn =
    dyn Fn(Request, &mut dyn Handler) -> Result<Response, Error> + Send + Sync;

/// Adapter giving a plain function the [`Middleware`] shape.
pub(crate) struct FnMiddleware(pub(crate) Arc<MiddlewareFn>);

impl Middleware for FnMiddleware {
    fn process(&self, request: Request, next: &mut dyn Handler) -> Result<Response, Error> {
        (self.0)(request, next)
    }
}

// ── References ───────────────────────────────────────────────────────────────

/// One entry of a chain, resolved lazily into an `Arc<dyn Middleware>`.
#[derive(Clone)]
pub enum MiddlewareRef {
    Func(Arc<MiddlewareFn>),
    Named(String),
    Instance(Arc<dyn Middleware>),
}

impl MiddlewareRef {
    /// ```rust
    /// use tether::MiddlewareRef;
    ///
    /// let passthrough = MiddlewareRef::func(|req, next| next.handle(req));
    /// ```
    pub fn func<F>(f: F) -> Self
    where
        F: Fn(Request, &mut dyn Handler) -> Result<Response, Error> + Send + Sync + 'static,
    {
        Self::Func(Arc::new(f))
    }

    /// Looked up in the chain's container when the cursor reaches it.
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    pub fn instance<M: Middleware + 'static>(middleware: M) -> Self {
        Self::Instance(Arc::new(middleware))
    }

    /// Same as [`instance`](Self::instance) for a unit already behind an `Arc`.
    pub fn shared(middleware: Arc<dyn Middleware>) -> Self {
        Self::Instance(middleware)
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Func(_) => "func",
            Self::Named(_) => "named",
            Self::Instance(_) => "instance",
        }
    }

    /// Produces the uniform unit for this reference.
    ///
    /// Named references need `container`; the entry it returns must have been
    /// registered as middleware (see [`Registry::middleware`](crate::Registry::middleware)).
    /// Nothing is cached, so resolving twice asks the container twice.
    pub fn resolve(&self, container: Option<&dyn Container>) -> Result<Arc<dyn Middleware>, Error> {
        match self {
            Self::Func(f) => Ok(Arc::new(FnMiddleware(Arc::clone(f)))),
            Self::Instance(m) => Ok(Arc::clone(m)),
            Self::Named(name) => {
                let container = container
                    .ok_or_else(|| ConfigError::NoContainer { name: name.clone() })?;
                let entry = container.get(name).map_err(ConfigError::Lookup)?;
                let middleware = (*entry)
                    .downcast_ref::<Arc<dyn Middleware>>()
                    .ok_or_else(|| ConfigError::InvalidMiddleware { name: name.clone() })?;
                Ok(Arc::clone(middleware))
            }
        }
    }
}

impl fmt::Debug for MiddlewareRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Func(_) => f.write_str("Func(..)"),
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Self::Instance(_) => f.write_str("Instance(..)"),
        }
    }
}

impl From<&str> for MiddlewareRef {
    fn from(name: &str) -> Self { Self::named(name) }
}

impl From<String> for MiddlewareRef {
    fn from(name: String) -> Self { Self::named(name) }
}

impl From<Arc<dyn Middleware>> for MiddlewareRef {
    fn from(middleware: Arc<dyn Middleware>) -> Self { Self::shared(middleware) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::Registry;
    use http::StatusCode;

    struct Teapot;

    impl Middleware for Teapot {
        fn process(&self, _: Request, _: &mut dyn Handler) -> Result<Response, Error> {
            Ok(Response::status(StatusCode::IM_A_TEAPOT))
        }
    }

    struct Unreachable;

    impl Handler for Unreachable {
        fn handle(&mut self, _: Request) -> Result<Response, Error> {
            panic!("terminal unit must not delegate");
        }
    }

    fn run(unit: Arc<dyn Middleware>) -> StatusCode {
        unit.process(Request::get("/"), &mut Unreachable).unwrap().status_code()
    }

    #[test]
    fn func_is_wrapped() {
        let reference = MiddlewareRef::func(|_, _| Ok(Response::status(StatusCode::ACCEPTED)));
        assert_eq!(run(reference.resolve(None).unwrap()), StatusCode::ACCEPTED);
    }

    #[test]
    fn instance_is_used_as_is() {
        let unit: Arc<dyn Middleware> = Arc::new(Teapot);
        let resolved = MiddlewareRef::shared(Arc::clone(&unit)).resolve(None).unwrap();
        assert!(Arc::ptr_eq(&unit, &resolved));
    }

    #[test]
    fn named_without_container_is_config_error() {
        let err = MiddlewareRef::named("auth").resolve(None).err().unwrap();
        assert!(matches!(err, Error::Config(ConfigError::NoContainer { ref name }) if name == "auth"));
    }

    #[test]
    fn named_unknown_is_lookup_error() {
        let registry = Registry::new();
        let err = MiddlewareRef::named("auth").resolve(Some(&registry as &dyn Container)).err().unwrap();
        assert!(matches!(err, Error::Config(ConfigError::Lookup(_))));
    }

    #[test]
    fn named_non_middleware_is_invalid() {
        let registry = Registry::new().service("auth", 42_u32);
        let err = MiddlewareRef::named("auth").resolve(Some(&registry as &dyn Container)).err().unwrap();
        assert!(matches!(err, Error::Config(ConfigError::InvalidMiddleware { .. })));
    }

    #[test]
    fn named_middleware_resolves() {
        let registry = Registry::new().middleware("teapot", Teapot);
        let unit = MiddlewareRef::from("teapot").resolve(Some(&registry as &dyn Container)).unwrap();
        assert_eq!(run(unit), StatusCode::IM_A_TEAPOT);
    }
}
