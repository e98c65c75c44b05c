//! Registry capability layer.
//!
//! This crate defines the narrow interface the watcher consumes from a
//! container registry: enumerate modules, enumerate tags, and fetch images
//! either by release channel or by concrete version. The concrete wire
//! protocol (OCI distribution, authentication, retries) lives behind the
//! [`RegistryClient`] trait so alternative adapters plug in at the boundary.
//!
//! Also home to the two small value types the rest of the system is built
//! on: [`ReleaseChannel`] (the closed set of stability lanes a tag may name)
//! and [`Digest`] (the content identifier used for cheap change detection).
//!
//! The `mock` feature provides an in-memory [`MockRegistry`](client::mock::MockRegistry)
//! for tests.

mod channel;
pub mod client;
mod digest;
pub mod error;

pub use crate::channel::ReleaseChannel;
#[cfg(feature = "mock")]
pub use crate::client::mock::{MockImage, MockRegistry};
pub use crate::client::{ClientHandle, Image, ImageHandle, ImageReader, RegistryClient};
pub use crate::digest::Digest;
