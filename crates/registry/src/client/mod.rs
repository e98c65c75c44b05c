//! Registry client trait and image capability.
//!
//! This module defines the `RegistryClient` trait, the unified interface the
//! scanner consumes for enumerating modules and fetching their images, and
//! the `Image` trait describing the two capabilities the core needs from a
//! fetched image (its digest and its filesystem contents as a tar stream).

#[cfg(feature = "mock")]
pub mod mock;

use crate::channel::ReleaseChannel;
use crate::digest::Digest;
use crate::error::Result;
use async_trait::async_trait;
use std::io::Read;
use std::sync::Arc;

/// Shared handle to a configured registry client.
pub type ClientHandle = Arc<dyn RegistryClient + Send + Sync>;
/// Owned handle to a fetched image.
pub type ImageHandle = Box<dyn Image + Send + Sync>;
/// Synchronous reader over an image's concatenated filesystem contents
/// (a tar archive), suitable for use inside
/// [`spawn_blocking`](https://docs.rs/tokio/latest/tokio/task/fn.spawn_blocking.html).
pub type ImageReader = Box<dyn Read + Send>;

/// A fetched container image, narrowed to the two capabilities the watcher
/// consumes.
///
/// Implementations own whatever connection or buffer backs the image; the
/// reader returned by [`extract()`](Self::extract) releases all resources
/// when dropped, on every exit path.
#[async_trait]
pub trait Image: Send + Sync {
    /// Content identifier of the image.
    ///
    /// Two images with equal digests are byte-identical, so comparing this
    /// against a cached value is a cheap way to decide whether any further
    /// work is needed.
    async fn digest(&self) -> Result<Digest>;

    /// Open the image's filesystem contents as a tar byte stream.
    ///
    /// The async setup (opening the connection, resolving layers) happens
    /// before returning; the returned reader is synchronous so the actual
    /// tar walk can run under `spawn_blocking`.
    async fn extract(&self) -> Result<ImageReader>;
}

/// Unified interface to a single container registry.
///
/// One client exists per configured registry. Every method may fail, and the
/// scanner recovers from each failure at the smallest possible granularity,
/// so implementations should return errors rather than retrying internally
/// for long periods. Timeouts are the implementation's responsibility; the
/// scanner only imposes cancellation.
///
/// # Examples
///
/// ```
/// use modwatch_registry::{Image, ReleaseChannel, RegistryClient};
/// use modwatch_registry::error::Result;
///
/// async fn stable_digest(client: &dyn RegistryClient, module: &str) -> Result<String> {
///     let image = client.release_image(module, ReleaseChannel::Stable).await?;
///     Ok(image.digest().await?.to_string())
/// }
/// ```
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Stable identifier of the configured registry (name taken from the
    /// configuration object key). Used as the first component of every cache
    /// key, so it should be unique across the configured set.
    fn name(&self) -> &str;

    /// List the modules this registry serves.
    async fn modules(&self) -> Result<Vec<String>>;

    /// List all tags published for a module.
    ///
    /// Returns every tag as-is; filtering down to the known release-channel
    /// set is the caller's job.
    async fn list_tags(&self, module: &str) -> Result<Vec<String>>;

    /// Fetch the image a release channel currently points at.
    async fn release_image(&self, module: &str, channel: ReleaseChannel) -> Result<ImageHandle>;

    /// Fetch the image for a concrete module version.
    async fn image(&self, module: &str, version: &str) -> Result<ImageHandle>;
}
