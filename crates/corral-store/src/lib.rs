//! Corral Store - Remote store interface
//!
//! This crate defines:
//! - `RemoteStore`: the atomic key-value/stream operations every Corral
//!   component is built on
//! - Stream data model (`EntryId`, `StreamEntry`, `PendingEntry`)
//! - `MemoryStore`: an in-process implementation of the full interface,
//!   used by tests and single-process deployments

pub mod memory;
pub mod model;
pub mod store;

// Re-export commonly used types
pub use memory::MemoryStore;
pub use model::{EntryId, PendingEntry, StreamEntry};
pub use store::RemoteStore;
