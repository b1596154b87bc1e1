//! Corral Stream - Reliable, at-least-once stream consumption
//!
//! This crate provides:
//! - `MessageHandler`: the application's processing callback
//! - `StreamConsumer`: a blocking delivery loop per `(group, consumer)` pair
//! - `ReclaimTask`: periodic recovery of entries abandoned by crashed or
//!   stalled consumers
//!
//! Delivery is at-least-once: an entry stays pending until acknowledged, and
//! reclaim can hand it to another consumer after its original owner goes
//! quiet. Handlers must therefore be idempotent: the delivery count of any
//! entry may exceed 1, and a reclaimed entry can run after newer entries
//! were already acknowledged.

mod consumer;
mod handler;
mod reclaim;

pub use consumer::{ConsumerConfig, StreamConsumer};
pub use handler::MessageHandler;
pub use reclaim::ReclaimTask;
