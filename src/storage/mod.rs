//! Object storage module
//!
//! Abstracts the raw and processed buckets behind one small trait so that
//! every component can run against S3, GCS, Azure, local disk or memory.
//!
//! # Overview
//!
//! The storage module provides:
//! - `Storage` - list/get/put/head with a distinguishable "not found"
//! - `ObjectStoreStorage` - backed by the `object_store` crate, built from a URL
//! - `MemoryStorage` - in-process store with explicit modification times

mod memory;
mod object;
mod types;

pub use memory::MemoryStorage;
pub use object::{open_storage, ObjectStoreStorage};
pub use types::Storage;
