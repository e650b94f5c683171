//! Minimal tether example — logging, token auth and a JSON endpoint.
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example basic
//!
//! Try:
//!   curl -i http://localhost:3000/users/42
//!   curl -i -H 'x-token: s3cret' http://localhost:3000/users/42

use std::sync::Arc;
use std::time::Instant;

use http::StatusCode;
use tether::{
    Chain, Error, Handler, HttpServer, Middleware, MiddlewareRef, Registry, Request, Response,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt::init();

    let registry = Registry::new()
        .middleware("auth", RequireToken { token: "s3cret" })
        .func("users", get_user);

    let chain = Chain::new(vec![
        MiddlewareRef::func(access_log),
        MiddlewareRef::named("auth"),
        MiddlewareRef::named("users"),
    ], Some(Arc::new(registry)))?;

    HttpServer::bind("0.0.0.0:3000")?
        .serve(chain)
        .await
}

// Wraps everything below it and logs what came back.
fn access_log(req: Request, next: &mut dyn Handler) -> Result<Response, Error> {
    let started = Instant::now();
    let method = req.method().clone();
    let path = req.path().to_owned();

    let res = next.handle(req)?;
    info!(%method, %path, status = res.status_code().as_u16(), elapsed = ?started.elapsed(), "request");
    Ok(res)
}

// Short-circuits with 401 unless the token matches.
struct RequireToken {
    token: &'static str,
}

impl Middleware for RequireToken {
    fn process(&self, req: Request, next: &mut dyn Handler) -> Result<Response, Error> {
        if req.header("x-token") != Some(self.token) {
            return Ok(Response::builder()
                .status(StatusCode::UNAUTHORIZED)
                .header("WWW-Authenticate", "Token")
                .no_body());
        }
        next.handle(req)
    }
}

// Terminal unit: never calls `next`.
fn get_user(req: Request, _next: &mut dyn Handler) -> Result<Response, Error> {
    let id = req.path().rsplit('/').next().unwrap_or("unknown");
    Ok(Response::json(format!(r#"{{"id":"{id}","name":"alice"}}"#)))
}
