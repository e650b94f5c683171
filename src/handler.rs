//! The continuation contract.
//!
//! Every unit receives the rest of the pipeline as a `&mut dyn Handler`.
//! Calling [`Handler::handle`] runs the next unit and hands back whatever
//! response travels up from there; not calling it ends the pipeline with the
//! unit's own response.
//!
//! ```text
//! chain.dispatch(req)
//!        ↓ resolve unit 0
//! unit0.process(req, &mut chain)
//!        ↓ next.handle(req)        ← cursor 0 → 1
//! unit1.process(req, &mut chain)
//!        ↓ returns Response        ← no further delegation
//! unit0 sees it, may wrap it, returns it
//! ```
//!
//! [`Chain`](crate::Chain) is the only implementation the crate ships, but
//! units can be exercised against any stub that implements the trait.

use crate::error::Error;
use crate::request::Request;
use crate::response::Response;

/// Produces the response for a request on behalf of the remaining pipeline.
pub trait Handler {
    fn handle(&mut self, request: Request) -> Result<Response, Error>;
}
