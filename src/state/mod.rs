//! Checkpoint module
//!
//! Tracks, per logical source, the watermark of the newest raw object that
//! has been transformed. The checkpoint is read once when a run starts and
//! written once when it ends.
//!
//! # Overview
//!
//! The state module provides:
//! - `Checkpoint` - source name to watermark map with monotonic advancement
//! - `CheckpointStore` - persistence of the checkpoint as one JSON object
//!
//! Only one run may write a given checkpoint key at a time. Two concurrent
//! runs would each save their own view and the last writer wins.

mod manager;
mod types;

pub use manager::CheckpointStore;
pub use types::Checkpoint;
