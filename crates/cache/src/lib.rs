//! In-memory module cache.
//!
//! This crate provides the ephemeral cache that tracks the current known
//! state of every watched registry. The cache is not the source of truth -
//! the registries themselves are. If the process restarts, the cache is
//! rebuilt from scratch on the first scan.
//!
//! # Architecture
//! Two mappings are tracked per (registry, module):
//! - **Channel digests**: the last observed image digest for each release
//!   channel, used by the scanner to short-circuit unchanged channels.
//! - **Versions**: the repacked documentation archive for each concrete
//!   version, together with the set of release channels currently pointing
//!   at it.
//!
//! The scanner is the only writer. Everyone else reads through
//! [`snapshot()`](Cache::snapshot), which returns an immutable value copy;
//! archive buffers are shared by reference and never mutated after
//! insertion.

mod models;
mod store;

pub use crate::models::SnapshotEntry;
pub use crate::store::Cache;
