//! The cart state engine and the snapshot it publishes.

mod engine;
mod snapshot;

pub use engine::CartEngine;
pub use snapshot::{CartSnapshot, SnapshotError};
