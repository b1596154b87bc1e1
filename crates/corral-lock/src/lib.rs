//! Corral Lock - Distributed lease locks
//!
//! This crate provides:
//! - Named exclusive leases with bounded-wait acquisition
//! - Owner-matched atomic release
//! - A scoped `with_lock` helper that always releases
//!
//! Locks are thin clients over the remote store: the lock record is one
//! store key holding an opaque owner token, expiring via TTL. A crashed
//! holder never wedges a resource: the lease runs out and the key frees
//! itself.

mod manager;
mod model;

pub use manager::LockManager;
pub use model::{LockOptions, OwnerToken};
