//! Registry Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. See `ERRORS.md` for design rationale.
//!
//! TODO: Definitely going to refactor this later once I've written a few
//!       more crates. Designing errors in Rust is **hard** and I don't want
//!       to resort to anyhow+thiserror just because I don't want to deal with it.

use derive_more::{Display, Error};
use std::io::Error as IoError;

/// A registry error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
/// The scanner treats every one of these as recoverable at the smallest
/// enclosing scope: a failing registry skips that registry, a failing module
/// skips that module, a failing channel skips that channel.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The registry cannot enumerate its modules (unreachable, auth, ...).
    #[display("registry unavailable: {_0}")]
    RegistryUnavailable(#[error(not(source))] String),
    /// The module's tag list cannot be fetched.
    #[display("module unavailable: {_0}")]
    ModuleUnavailable(#[error(not(source))] String),
    /// The requested image reference does not exist.
    #[display("image not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// Underlying I/O error while talking to the registry.
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// A digest string did not have the `algorithm:hex` shape.
    #[display("invalid digest: {_0}")]
    InvalidDigest(#[error(not(source))] String),
    /// A tag named a release channel outside the known set.
    #[display("invalid release channel: {_0}")]
    InvalidChannel(#[error(not(source))] String),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RegistryUnavailable(_) | Self::ModuleUnavailable(_) | Self::Io(_)
        )
    }
}
