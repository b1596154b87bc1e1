//! Corral Ratelimit - Sliding-window rate limiting
//!
//! Accepts or rejects calls per identity against a trailing time window of
//! recorded timestamps kept in the remote store, so the decision is shared
//! by every process fronting the same identity.

mod limiter;

pub use limiter::SlidingWindowLimiter;
