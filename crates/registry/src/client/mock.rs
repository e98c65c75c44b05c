//! In-memory registry client for testing.

use crate::channel::ReleaseChannel;
use crate::client::{Image, ImageHandle, ImageReader, RegistryClient};
use crate::digest::Digest;
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory registry client for testing.
///
/// Modules, tags and images live in a `BTreeMap` behind a [`RwLock`], so all
/// trait methods can operate on `&self` without external synchronisation.
/// The registry is cheaply cloneable and clones share state, which lets a
/// test hand a [`ClientHandle`](crate::ClientHandle) to the scanner while
/// keeping its own handle around to publish new releases or inject failures
/// between scans.
///
/// # Examples
///
/// ```
/// use modwatch_registry::{MockRegistry, RegistryClient, ReleaseChannel};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let registry = MockRegistry::new("mock");
/// registry
///     .publish("console", ReleaseChannel::Alpha, "1.2.3", &[
///         ("docs/README.md", &b"# Console"[..]),
///     ])
///     .await;
/// assert_eq!(registry.modules().await?, vec!["console".to_string()]);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct MockRegistry {
    name: String,
    inner: Arc<RwLock<Inner>>,
}

#[derive(Default)]
struct Inner {
    fail_modules: bool,
    modules: BTreeMap<String, MockModule>,
    image_fetches: u64,
}

#[derive(Default)]
struct MockModule {
    releases: BTreeMap<ReleaseChannel, MockRelease>,
    versions: BTreeMap<String, Vec<u8>>,
    extra_tags: Vec<String>,
}

struct MockRelease {
    digest: Digest,
    payload: Vec<u8>,
}

impl MockRegistry {
    /// Create an empty mock registry with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: Arc::new(RwLock::new(Inner::default())),
        }
    }

    /// Point a release channel at a version, publishing the version image
    /// alongside it.
    ///
    /// The release-channel image is a tar containing a single `version.json`
    /// naming the version; the version image is a tar of `files`. The
    /// channel's digest is derived from the release payload, so republishing
    /// the same version is a no-op from the scanner's point of view and
    /// publishing a different version changes the digest.
    pub async fn publish(
        &self,
        module: &str,
        channel: ReleaseChannel,
        version: &str,
        files: &[(&str, &[u8])],
    ) {
        let manifest = format!("{{\"version\": \"{version}\"}}");
        let payload = Self::tarball(&[("version.json", manifest.as_bytes())]);
        let image = Self::tarball(files);
        let mut inner = self.inner.write().await;
        let entry = inner.modules.entry(module.to_string()).or_default();
        entry.releases.insert(channel, MockRelease {
            digest: Self::digest_of(&payload),
            payload,
        });
        entry.versions.insert(version.to_string(), image);
        tracing::debug!(module, channel = %channel, version, "Mock release published");
    }

    /// Point a release channel at a raw tar payload, without publishing any
    /// version image.
    ///
    /// Useful for broken-image scenarios: a payload without a `version.json`
    /// exercises the version-missing path.
    pub async fn publish_release_payload(&self, module: &str, channel: ReleaseChannel, payload: Vec<u8>) {
        let mut inner = self.inner.write().await;
        let entry = inner.modules.entry(module.to_string()).or_default();
        entry.releases.insert(channel, MockRelease {
            digest: Self::digest_of(&payload),
            payload,
        });
    }

    /// Publish an additional tag that is not a release channel.
    pub async fn add_tag(&self, module: &str, tag: impl Into<String>) {
        let mut inner = self.inner.write().await;
        let entry = inner.modules.entry(module.to_string()).or_default();
        entry.extra_tags.push(tag.into());
    }

    /// Make `modules()` fail (or succeed again) on subsequent calls.
    pub async fn fail_modules(&self, fail: bool) {
        self.inner.write().await.fail_modules = fail;
    }

    /// How many times `image()` has been called, successfully or not.
    pub async fn image_fetches(&self) -> u64 {
        self.inner.read().await.image_fetches
    }

    /// Build an in-memory tar archive of regular files.
    ///
    /// Panics if the archive cannot be constructed. The panic is DELIBERATE:
    /// this is test tooling, and if test setup is wrong the test should not
    /// pass.
    pub fn tarball(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (path, data) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, path, *data)
                .expect("MockRegistry::tarball: append failed");
        }
        builder.into_inner().expect("MockRegistry::tarball: finalize failed")
    }

    fn digest_of(payload: &[u8]) -> Digest {
        format!("blake3:{}", blake3::hash(payload))
            .parse()
            .expect("blake3 output is valid hex")
    }
}

#[async_trait]
impl RegistryClient for MockRegistry {
    fn name(&self) -> &str {
        &self.name
    }

    async fn modules(&self) -> Result<Vec<String>> {
        let inner = self.inner.read().await;
        if inner.fail_modules {
            exn::bail!(ErrorKind::RegistryUnavailable(self.name.clone()));
        }
        Ok(inner.modules.keys().cloned().collect())
    }

    async fn list_tags(&self, module: &str) -> Result<Vec<String>> {
        let inner = self.inner.read().await;
        let Some(entry) = inner.modules.get(module) else {
            exn::bail!(ErrorKind::ModuleUnavailable(module.to_string()));
        };
        // Real registries list version tags alongside the channel tags; the
        // scanner is expected to filter the former out.
        let mut tags: Vec<String> = entry.releases.keys().map(|channel| channel.to_string()).collect();
        tags.extend(entry.versions.keys().cloned());
        tags.extend(entry.extra_tags.iter().cloned());
        Ok(tags)
    }

    async fn release_image(&self, module: &str, channel: ReleaseChannel) -> Result<ImageHandle> {
        let inner = self.inner.read().await;
        let release = inner
            .modules
            .get(module)
            .and_then(|entry| entry.releases.get(&channel));
        let Some(release) = release else {
            exn::bail!(ErrorKind::NotFound(format!("{module}:{channel}")));
        };
        Ok(Box::new(MockImage::new(release.digest.clone(), release.payload.clone())))
    }

    async fn image(&self, module: &str, version: &str) -> Result<ImageHandle> {
        let mut inner = self.inner.write().await;
        inner.image_fetches += 1;
        let data = inner
            .modules
            .get(module)
            .and_then(|entry| entry.versions.get(version));
        let Some(data) = data else {
            exn::bail!(ErrorKind::NotFound(format!("{module}:{version}")));
        };
        let digest = Self::digest_of(data);
        Ok(Box::new(MockImage::new(digest, data.clone())))
    }
}

/// An in-memory [`Image`] backed by a byte buffer.
pub struct MockImage {
    digest: Digest,
    data: Vec<u8>,
}

impl MockImage {
    /// Create an image from a digest and its tar contents.
    pub fn new(digest: Digest, data: Vec<u8>) -> Self {
        Self { digest, data }
    }
}

#[async_trait]
impl Image for MockImage {
    async fn digest(&self) -> Result<Digest> {
        Ok(self.digest.clone())
    }

    async fn extract(&self) -> Result<ImageReader> {
        Ok(Box::new(Cursor::new(self.data.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_registry_lists_no_modules() {
        let registry = MockRegistry::new("empty");
        assert!(registry.modules().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn tags_include_versions_and_extras() {
        let registry = MockRegistry::new("mock");
        registry
            .publish("console", ReleaseChannel::Alpha, "1.2.3", &[])
            .await;
        registry.add_tag("console", "latest").await;
        let tags = registry.list_tags("console").await.unwrap();
        assert!(tags.contains(&"alpha".to_string()));
        assert!(tags.contains(&"1.2.3".to_string()));
        assert!(tags.contains(&"latest".to_string()));
    }

    #[tokio::test]
    async fn failure_injection_is_reversible() {
        let registry = MockRegistry::new("mock");
        registry.fail_modules(true).await;
        assert!(registry.modules().await.is_err());
        registry.fail_modules(false).await;
        assert!(registry.modules().await.is_ok());
    }

    #[tokio::test]
    async fn republish_keeps_digest_stable() {
        let registry = MockRegistry::new("mock");
        registry.publish("console", ReleaseChannel::Beta, "2.0.0", &[]).await;
        let first = registry
            .release_image("console", ReleaseChannel::Beta)
            .await
            .unwrap()
            .digest()
            .await
            .unwrap();
        registry.publish("console", ReleaseChannel::Beta, "2.0.0", &[]).await;
        let second = registry
            .release_image("console", ReleaseChannel::Beta)
            .await
            .unwrap()
            .digest()
            .await
            .unwrap();
        assert_eq!(first, second);

        registry.publish("console", ReleaseChannel::Beta, "3.0.0", &[]).await;
        let third = registry
            .release_image("console", ReleaseChannel::Beta)
            .await
            .unwrap()
            .digest()
            .await
            .unwrap();
        assert_ne!(first, third);
    }

    #[tokio::test]
    async fn image_fetches_are_counted() {
        let registry = MockRegistry::new("mock");
        registry.publish("console", ReleaseChannel::Alpha, "1.2.3", &[]).await;
        assert_eq!(registry.image_fetches().await, 0);
        registry.image("console", "1.2.3").await.unwrap();
        assert!(registry.image("console", "9.9.9").await.is_err());
        assert_eq!(registry.image_fetches().await, 2);
    }
}
