//! Watcher Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. See `ERRORS.md` for design rationale.
//!
//! TODO: Definitely going to refactor this later once I've written a few
//!       more crates. Designing errors in Rust is **hard** and I don't want
//!       to resort to anyhow+thiserror just because I don't want to deal with it.

use derive_more::{Display, Error};

/// A watcher error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for watcher operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// Deliberately tiny: every registry, image or extraction failure is
/// recovered inside the scan at the smallest enclosing scope and logged,
/// never propagated. Cancellation is the one thing that must rise all the
/// way out.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The scan's cancellation token fired mid-scan.
    #[display("scan cancelled")]
    Cancelled,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
