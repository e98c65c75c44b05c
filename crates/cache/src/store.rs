use crate::models::{ModuleState, SnapshotEntry, VersionState};
use modwatch_registry::{Digest, ReleaseChannel};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Process-wide cache of watched registries.
///
/// Cloning is cheap and clones share state, so the scanner can hold one
/// handle for writing while subscribers hold their own for snapshots. One
/// lock guards the whole structure; every write happens under a single
/// exclusive acquisition, so readers never observe a partially constructed
/// module entry. `BTreeMap`s keep iteration order stable, which makes
/// [`snapshot()`](Cache::snapshot) deterministic without a sort.
///
/// # Examples
///
/// ```
/// use modwatch_cache::Cache;
/// use modwatch_registry::ReleaseChannel;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let cache = Cache::new();
/// cache
///     .set_archive("prod", "console", "1.2.3", ReleaseChannel::Alpha, vec![0x1f])
///     .await;
/// let snapshot = cache.snapshot().await;
/// assert_eq!(snapshot.len(), 1);
/// assert_eq!(snapshot[0].version, "1.2.3");
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct Cache {
    inner: Arc<RwLock<BTreeMap<String, BTreeMap<String, ModuleState>>>>,
}

impl Cache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The last digest observed for a release channel, if any.
    pub async fn release_digest(&self, registry: &str, module: &str, channel: ReleaseChannel) -> Option<Digest> {
        let inner = self.inner.read().await;
        inner
            .get(registry)
            .and_then(|modules| modules.get(module))
            .and_then(|state| state.digests.get(&channel))
            .cloned()
    }

    /// Record the digest a release channel currently points at.
    ///
    /// The scanner writes this only after the corresponding archive has been
    /// fetched and inserted, so a digest in the cache always has a matching
    /// version behind it.
    pub async fn set_release_digest(&self, registry: &str, module: &str, channel: ReleaseChannel, digest: Digest) {
        let mut inner = self.inner.write().await;
        let state = module_entry(&mut inner, registry, module);
        state.digests.insert(channel, digest);
    }

    /// Insert or update a version's documentation archive and point `channel`
    /// at it.
    ///
    /// Whichever version the channel referenced before loses it; a version
    /// left with no referencing channels stays in the cache (and in
    /// snapshots) until [`reap_orphans()`](Cache::reap_orphans) collects it.
    /// Re-inserting the same (version, channel, bytes) is a no-op as far as
    /// observable state goes.
    pub async fn set_archive(
        &self,
        registry: &str,
        module: &str,
        version: &str,
        channel: ReleaseChannel,
        archive: Vec<u8>,
    ) {
        let mut inner = self.inner.write().await;
        let state = module_entry(&mut inner, registry, module);
        for (existing, version_state) in state.versions.iter_mut() {
            if existing != version {
                version_state.channels.remove(&channel);
            }
        }
        match state.versions.get_mut(version) {
            Some(version_state) => {
                version_state.archive = Arc::from(archive);
                version_state.channels.insert(channel);
            },
            None => {
                state.versions.insert(version.to_string(), VersionState {
                    archive: Arc::from(archive),
                    channels: BTreeSet::from([channel]),
                });
            },
        }
    }

    /// Drop every version no release channel references any more.
    ///
    /// Returns the number of versions removed. The scanner calls this at the
    /// end of each scan, so a version orphaned by a channel bump disappears
    /// on the scan that orphaned it.
    pub async fn reap_orphans(&self) -> usize {
        let mut inner = self.inner.write().await;
        let mut reaped = 0;
        for (registry, modules) in inner.iter_mut() {
            for (module, state) in modules.iter_mut() {
                state.versions.retain(|version, version_state| {
                    if version_state.channels.is_empty() {
                        tracing::debug!(registry = %registry, module = %module, version = %version, "Reaping orphaned version");
                        reaped += 1;
                        false
                    } else {
                        true
                    }
                });
            }
        }
        reaped
    }

    /// A point-in-time copy of the flattened cache contents.
    ///
    /// Entries come out ordered by (registry, module, version). Archive
    /// buffers are shared by reference, not copied; they are immutable after
    /// insertion, so the snapshot never changes under the caller.
    pub async fn snapshot(&self) -> Vec<SnapshotEntry> {
        let inner = self.inner.read().await;
        let mut entries = Vec::new();
        for (registry, modules) in inner.iter() {
            for (module, state) in modules {
                for (version, version_state) in &state.versions {
                    entries.push(SnapshotEntry {
                        registry: registry.clone(),
                        module: module.clone(),
                        version: version.clone(),
                        archive: Arc::clone(&version_state.archive),
                        channels: version_state.channels.clone(),
                    });
                }
            }
        }
        entries
    }
}

fn module_entry<'a>(
    inner: &'a mut BTreeMap<String, BTreeMap<String, ModuleState>>,
    registry: &str,
    module: &str,
) -> &'a mut ModuleState {
    inner
        .entry(registry.to_string())
        .or_default()
        .entry(module.to_string())
        .or_default()
}
