//! The command dispatch middleware.
//!
//! Every command registration runs through the same ordered pipeline:
//! rate-limit -> permission -> disable-check -> handler. The stages are
//! declared data ([`pipeline::STAGES`]), not implicit wrapping order.
//!
//! - `registry` - command registrations and first-token matching
//! - `pipeline` - the ordered middleware chain and its execution
//! - `rate_limit` - sliding-window limiter over a TTL counter store
//! - `anon` - anonymous-admin identity-proof continuations
//! - `audit` - log-channel forwarding for handler log messages

pub mod anon;
pub mod audit;
pub mod pipeline;
pub mod rate_limit;
pub mod registry;

pub use anon::AnonProofs;
pub use rate_limit::{CounterStore, MemoryCounterStore, RateLimiter};
pub use registry::{CommandCtx, CommandRegistry, CommandSpec};
