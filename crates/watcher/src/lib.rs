//! Periodic registry scanning and change propagation.
//!
//! This crate ties the system together: the [`Scanner`] walks every
//! configured [`RegistryClient`](modwatch_registry::RegistryClient) looking
//! for release channels whose image digest moved, pulls the new version's
//! documentation archive through
//! [`modwatch_archive`], and publishes the result into the
//! [`Cache`](modwatch_cache::Cache). The [`Runner`] drives scans on a fixed
//! period, and [`Subscription`] tells interested consumers when a scan
//! changed something.
//!
//! Failure philosophy: a scan never fails. Every registry, module and
//! channel error is recovered exactly where it happened and logged at
//! `warn`; unreachable registries keep serving stale cache entries until
//! they come back. The only thing that stops a scan is cancellation.

pub mod error;
mod runner;
mod scanner;
mod subscribe;

pub use crate::runner::{DEFAULT_SCAN_PERIOD, Runner};
pub use crate::scanner::{ScanSummary, Scanner};
pub use crate::subscribe::{Notifier, Subscription};
