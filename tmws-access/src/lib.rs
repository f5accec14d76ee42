//! # tmws-access
//!
//! The policy engine consulted on every read and write, plus per-agent
//! rate limiting. Policy evaluation is pure; the limiter is the only
//! stateful piece.

pub mod policy;
pub mod rate_limit;

pub use policy::{evaluate, Decision, Operation};
pub use rate_limit::{QuotaKind, RateLimiter, RateLimits};
