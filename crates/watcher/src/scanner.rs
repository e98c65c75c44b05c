//! Scan orchestration across registries, modules and release channels.

use crate::error::{ErrorKind, Result};
use crate::subscribe::{Notifier, Subscription};
use modwatch_cache::Cache;
use modwatch_registry::{ClientHandle, Image, RegistryClient, ReleaseChannel};
use std::future::Future;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Tally of what a single [`Scanner::scan_once`] pass did.
///
/// A scan is successful as long as it ran to completion; `failed` counts
/// items (registries, modules or channels) that were skipped after a logged
/// error, not a failure of the scan itself.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ScanSummary {
    /// Registries visited.
    pub registries: usize,
    /// Channels whose archive was (re-)fetched and published.
    pub updated: usize,
    /// Channels skipped because the release digest matched the cache.
    pub unchanged: usize,
    /// Items skipped after a recovered error.
    pub failed: usize,
    /// Orphaned versions reaped at the end of the scan.
    pub reaped: usize,
}

/// Walks every configured registry and brings the cache up to date.
///
/// The scanner is the cache's only writer. Within a scan, work is skipped at
/// the cheapest possible point: a release channel whose image digest matches
/// the cached digest costs one digest fetch and nothing else. Every external
/// failure is confined to the item it occurred on - a failing registry skips
/// that registry, a failing module that module, a failing channel that
/// channel - and surfaces as a `warn` log plus a `failed` tick in the
/// summary, never as an error.
///
/// The cached digest for a channel is written only after the whole
/// fetch-extract-insert chain for that channel succeeded. A transient
/// failure therefore leaves the previous digest in place and the channel is
/// picked up again on the next scan, at the cost of re-fetching the release
/// image once per scan while the failure lasts.
pub struct Scanner {
    clients: Vec<ClientHandle>,
    cache: Cache,
    notifier: Notifier,
}

impl Scanner {
    /// Create a scanner over a configured set of registry clients.
    pub fn new(clients: Vec<ClientHandle>, cache: Cache) -> Self {
        Self {
            clients,
            cache,
            notifier: Notifier::new(),
        }
    }

    /// The cache this scanner writes into.
    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Subscribe to edge-triggered change events.
    ///
    /// An event fires after every scan that changed the cache (archives
    /// published or orphans reaped). Delivery is best-effort; see
    /// [`Subscription`].
    pub fn subscribe(&self) -> Subscription {
        self.notifier.subscribe()
    }

    /// Run one full scan over every registry.
    ///
    /// Never fails on registry, image or extraction errors; the only error
    /// out of here is [`Cancelled`](crate::error::ErrorKind::Cancelled),
    /// raised promptly when `cancel` fires while the scan is waiting on
    /// external I/O.
    #[instrument(skip_all, fields(registries = self.clients.len()))]
    pub async fn scan_once(&self, cancel: &CancellationToken) -> Result<ScanSummary> {
        let mut summary = ScanSummary::default();
        for client in &self.clients {
            self.scan_registry(client.as_ref(), cancel, &mut summary).await?;
            summary.registries += 1;
        }
        summary.reaped = self.cache.reap_orphans().await;
        if summary.updated > 0 || summary.reaped > 0 {
            self.notifier.notify();
        }
        tracing::debug!(
            registries = summary.registries,
            updated = summary.updated,
            unchanged = summary.unchanged,
            failed = summary.failed,
            reaped = summary.reaped,
            "Scan complete"
        );
        Ok(summary)
    }

    async fn scan_registry(
        &self,
        client: &dyn RegistryClient,
        cancel: &CancellationToken,
        summary: &mut ScanSummary,
    ) -> Result<()> {
        let registry = client.name();
        let modules = match cancellable(cancel, client.modules()).await? {
            Ok(modules) => modules,
            Err(err) => {
                tracing::warn!(registry, error = %err, "Cannot enumerate modules; skipping registry");
                summary.failed += 1;
                return Ok(());
            },
        };
        for module in &modules {
            let tags = match cancellable(cancel, client.list_tags(module)).await? {
                Ok(tags) => tags,
                Err(err) => {
                    tracing::warn!(registry, module = %module, error = %err, "Cannot list tags; skipping module");
                    summary.failed += 1;
                    continue;
                },
            };
            // Anything that isn't a known release channel (version tags,
            // `latest`, ...) is ignored at the source.
            let channels: Vec<ReleaseChannel> = tags.iter().filter_map(|tag| tag.parse().ok()).collect();
            for channel in channels {
                self.scan_channel(client, module, channel, cancel, summary).await?;
            }
        }
        Ok(())
    }

    async fn scan_channel(
        &self,
        client: &dyn RegistryClient,
        module: &str,
        channel: ReleaseChannel,
        cancel: &CancellationToken,
        summary: &mut ScanSummary,
    ) -> Result<()> {
        let registry = client.name();
        let release = match cancellable(cancel, client.release_image(module, channel)).await? {
            Ok(image) => image,
            Err(err) => {
                tracing::warn!(registry, module = %module, channel = %channel, error = %err, "Cannot fetch release image; skipping channel");
                summary.failed += 1;
                return Ok(());
            },
        };
        let digest = match cancellable(cancel, release.digest()).await? {
            Ok(digest) => digest,
            Err(err) => {
                tracing::warn!(registry, module = %module, channel = %channel, error = %err, "Cannot read release digest; skipping channel");
                summary.failed += 1;
                return Ok(());
            },
        };
        if self.cache.release_digest(registry, module, channel).await.as_ref() == Some(&digest) {
            summary.unchanged += 1;
            return Ok(());
        }

        let Some(version) = self.resolve_version(client, module, channel, release.as_ref(), cancel).await? else {
            summary.failed += 1;
            return Ok(());
        };
        let image = match cancellable(cancel, client.image(module, &version)).await? {
            Ok(image) => image,
            Err(err) => {
                tracing::warn!(registry, module = %module, version = %version, error = %err, "Cannot fetch version image; skipping channel");
                summary.failed += 1;
                return Ok(());
            },
        };
        let Some(docs) = self.repack_docs(client, module, &version, image.as_ref(), cancel).await? else {
            summary.failed += 1;
            return Ok(());
        };

        self.cache.set_archive(registry, module, &version, channel, docs).await;
        // Digest last: everything above succeeded, so from the next scan's
        // point of view this channel is now up to date.
        self.cache.set_release_digest(registry, module, channel, digest).await;
        summary.updated += 1;
        tracing::info!(registry, module = %module, channel = %channel, version = %version, "Release channel updated");
        Ok(())
    }

    /// Resolve the version a release-channel image points at.
    ///
    /// `None` means the failure was logged and the channel must not advance.
    async fn resolve_version(
        &self,
        client: &dyn RegistryClient,
        module: &str,
        channel: ReleaseChannel,
        release: &dyn Image,
        cancel: &CancellationToken,
    ) -> Result<Option<String>> {
        let registry = client.name();
        let reader = match cancellable(cancel, release.extract()).await? {
            Ok(reader) => reader,
            Err(err) => {
                tracing::warn!(registry, module = %module, channel = %channel, error = %err, "Cannot open release image; skipping channel");
                return Ok(None);
            },
        };
        // The stream is open; the tar walk itself is synchronous.
        match task::spawn_blocking(move || modwatch_archive::read_version(reader)).await {
            Ok(Ok(version)) => Ok(Some(version)),
            Ok(Err(err)) => {
                tracing::warn!(registry, module = %module, channel = %channel, error = %err, "Cannot resolve version; channel does not advance");
                Ok(None)
            },
            Err(err) => {
                tracing::warn!(registry, module = %module, channel = %channel, error = %err, "Version extraction task failed; skipping channel");
                Ok(None)
            },
        }
    }

    /// Filter a version image down to its documentation archive.
    ///
    /// `None` means the failure was logged and the channel must not advance.
    async fn repack_docs(
        &self,
        client: &dyn RegistryClient,
        module: &str,
        version: &str,
        image: &dyn Image,
        cancel: &CancellationToken,
    ) -> Result<Option<Vec<u8>>> {
        let registry = client.name();
        let reader = match cancellable(cancel, image.extract()).await? {
            Ok(reader) => reader,
            Err(err) => {
                tracing::warn!(registry, module = %module, version = %version, error = %err, "Cannot open version image; skipping channel");
                return Ok(None);
            },
        };
        match task::spawn_blocking(move || modwatch_archive::repack_docs(reader)).await {
            Ok(Ok(docs)) => Ok(Some(docs)),
            Ok(Err(err)) => {
                tracing::warn!(registry, module = %module, version = %version, error = %err, "Documentation extraction failed; skipping channel");
                Ok(None)
            },
            Err(err) => {
                tracing::warn!(registry, module = %module, version = %version, error = %err, "Documentation extraction task failed; skipping channel");
                Ok(None)
            },
        }
    }
}

/// Race a scan-side await against cancellation.
///
/// Biased towards the token so shutdown wins even when the inner future is
/// already ready.
async fn cancellable<T>(cancel: &CancellationToken, operation: impl Future<Output = T>) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => exn::bail!(ErrorKind::Cancelled),
        output = operation => Ok(output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modwatch_cache::SnapshotEntry;
    use modwatch_registry::MockRegistry;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    const DOCS: &[(&str, &[u8])] = &[
        ("docs/README.md", b"# module docs"),
        ("openapi/schema.yaml", b"openapi: 3.0"),
        ("src/main.go", b"package main"),
    ];

    fn scanner_for(mocks: &[&MockRegistry]) -> Scanner {
        let clients: Vec<ClientHandle> = mocks
            .iter()
            .map(|mock| Arc::new((*mock).clone()) as ClientHandle)
            .collect();
        Scanner::new(clients, Cache::new())
    }

    fn rows_for<'a>(snapshot: &'a [SnapshotEntry], registry: &str) -> Vec<&'a SnapshotEntry> {
        snapshot.iter().filter(|entry| entry.registry == registry).collect()
    }

    fn archive_paths(entry: &SnapshotEntry) -> Vec<String> {
        tar::Archive::new(&entry.archive[..])
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().display().to_string())
            .collect()
    }

    /// Two registries, two modules each; `clientTwo/parca` points both its
    /// channels at the same version.
    async fn seed() -> (MockRegistry, MockRegistry) {
        let one = MockRegistry::new("clientOne");
        one.publish("console", ReleaseChannel::Alpha, "1.2.2", DOCS).await;
        one.publish("console", ReleaseChannel::Beta, "2.2.3", DOCS).await;
        one.publish("parca", ReleaseChannel::RockSolid, "3.3.3", DOCS).await;
        one.publish("parca", ReleaseChannel::Stable, "3.3.4", DOCS).await;
        one.add_tag("console", "latest").await;

        let two = MockRegistry::new("clientTwo");
        two.publish("console", ReleaseChannel::Alpha, "1.2.2", DOCS).await;
        two.publish("console", ReleaseChannel::Beta, "2.2.3", DOCS).await;
        two.publish("parca", ReleaseChannel::RockSolid, "4.0.0", DOCS).await;
        two.publish("parca", ReleaseChannel::Stable, "4.0.0", DOCS).await;
        (one, two)
    }

    #[tokio::test]
    async fn first_scan_populates_both_registries() {
        let (one, two) = seed().await;
        let scanner = scanner_for(&[&one, &two]);
        let cancel = CancellationToken::new();

        let summary = scanner.scan_once(&cancel).await.unwrap();
        assert_eq!(summary.registries, 2);
        assert_eq!(summary.updated, 8);
        assert_eq!(summary.failed, 0);

        let snapshot = scanner.cache().snapshot().await;
        assert_eq!(rows_for(&snapshot, "clientOne").len(), 4);
        let two_rows = rows_for(&snapshot, "clientTwo");
        assert_eq!(two_rows.len(), 3);

        let parca = two_rows
            .iter()
            .find(|entry| entry.module == "parca")
            .unwrap();
        assert_eq!(parca.version, "4.0.0");
        assert_eq!(
            parca.channels,
            BTreeSet::from([ReleaseChannel::RockSolid, ReleaseChannel::Stable])
        );

        // Archives carry the filtered documentation payload.
        let paths = archive_paths(parca);
        assert!(paths.contains(&"docs/README.md".to_string()));
        assert!(paths.contains(&"openapi/schema.yaml".to_string()));
        assert!(!paths.contains(&"src/main.go".to_string()));
    }

    #[tokio::test]
    async fn rescan_after_channel_bump_reaps_orphans() {
        let (one, two) = seed().await;
        let scanner = scanner_for(&[&one, &two]);
        let cancel = CancellationToken::new();
        scanner.scan_once(&cancel).await.unwrap();

        let alpha_before = scanner
            .cache()
            .release_digest("clientOne", "console", ReleaseChannel::Alpha)
            .await
            .unwrap();

        one.publish("console", ReleaseChannel::Beta, "3.3.3", DOCS).await;
        one.publish("parca", ReleaseChannel::Stable, "4.4.4", DOCS).await;

        let summary = scanner.scan_once(&cancel).await.unwrap();
        assert_eq!(summary.updated, 2);
        assert_eq!(summary.unchanged, 6);
        assert_eq!(summary.reaped, 2);

        // Untouched channels keep their digest.
        let alpha_after = scanner
            .cache()
            .release_digest("clientOne", "console", ReleaseChannel::Alpha)
            .await
            .unwrap();
        assert_eq!(alpha_before, alpha_after);

        let snapshot = scanner.cache().snapshot().await;
        let versions: Vec<&str> = rows_for(&snapshot, "clientOne")
            .iter()
            .map(|entry| entry.version.as_str())
            .collect();
        assert!(!versions.contains(&"2.2.3"));
        assert!(!versions.contains(&"3.3.4"));
        let bumped = snapshot
            .iter()
            .find(|entry| {
                entry.registry == "clientOne" && entry.module == "console" && entry.version == "3.3.3"
            })
            .unwrap();
        assert_eq!(bumped.channels, BTreeSet::from([ReleaseChannel::Beta]));
    }

    #[tokio::test]
    async fn failing_registry_does_not_poison_the_other() {
        let (one, two) = seed().await;
        let scanner = scanner_for(&[&one, &two]);
        let cancel = CancellationToken::new();
        scanner.scan_once(&cancel).await.unwrap();
        let before = rows_for(&scanner.cache().snapshot().await, "clientOne")
            .into_iter()
            .cloned()
            .collect::<Vec<_>>();

        one.fail_modules(true).await;
        two.publish("console", ReleaseChannel::Beta, "5.0.0", DOCS).await;

        let summary = scanner.scan_once(&cancel).await.unwrap();
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.updated, 1);

        let snapshot = scanner.cache().snapshot().await;
        // The unreachable registry keeps serving stale data.
        assert_eq!(
            rows_for(&snapshot, "clientOne").into_iter().cloned().collect::<Vec<_>>(),
            before
        );
        assert!(
            rows_for(&snapshot, "clientTwo")
                .iter()
                .any(|entry| entry.version == "5.0.0")
        );
    }

    #[tokio::test]
    async fn missing_version_file_does_not_advance_the_channel() {
        let broken = MockRegistry::new("broken");
        broken
            .publish_release_payload(
                "console",
                ReleaseChannel::Alpha,
                MockRegistry::tarball(&[("README.md", b"no version here")]),
            )
            .await;
        let scanner = scanner_for(&[&broken]);
        let cancel = CancellationToken::new();

        let summary = scanner.scan_once(&cancel).await.unwrap();
        assert_eq!(summary.updated, 0);
        assert_eq!(summary.failed, 1);
        assert!(scanner.cache().snapshot().await.is_empty());
        // The digest was not stored either, so the channel is retried.
        assert_eq!(
            scanner
                .cache()
                .release_digest("broken", "console", ReleaseChannel::Alpha)
                .await,
            None
        );

        // A later, fixed publish recovers on the next scan.
        broken.publish("console", ReleaseChannel::Alpha, "1.0.0", DOCS).await;
        let summary = scanner.scan_once(&cancel).await.unwrap();
        assert_eq!(summary.updated, 1);
        assert_eq!(scanner.cache().snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn unchanged_digests_short_circuit_all_downloads() {
        let (one, two) = seed().await;
        let scanner = scanner_for(&[&one, &two]);
        let cancel = CancellationToken::new();

        scanner.scan_once(&cancel).await.unwrap();
        let first = scanner.cache().snapshot().await;
        let fetches_after_first = one.image_fetches().await + two.image_fetches().await;

        let summary = scanner.scan_once(&cancel).await.unwrap();
        assert_eq!(summary.updated, 0);
        assert_eq!(summary.unchanged, 8);
        // No version image was fetched on the second pass.
        assert_eq!(one.image_fetches().await + two.image_fetches().await, fetches_after_first);
        assert_eq!(scanner.cache().snapshot().await, first);
    }

    #[tokio::test]
    async fn subscription_fires_only_on_change() {
        let (one, two) = seed().await;
        let scanner = scanner_for(&[&one, &two]);
        let mut subscription = scanner.subscribe();
        let cancel = CancellationToken::new();

        scanner.scan_once(&cancel).await.unwrap();
        assert!(subscription.poll_changed());

        scanner.scan_once(&cancel).await.unwrap();
        assert!(!subscription.poll_changed());
    }

    #[tokio::test]
    async fn cancellation_aborts_the_scan() {
        let (one, two) = seed().await;
        let scanner = scanner_for(&[&one, &two]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = scanner.scan_once(&cancel).await.unwrap_err();
        assert_eq!(*err, ErrorKind::Cancelled);
        assert!(scanner.cache().snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn empty_registry_is_harmless() {
        let empty = MockRegistry::new("empty");
        let (one, _) = seed().await;
        let scanner = scanner_for(&[&empty, &one]);
        let cancel = CancellationToken::new();

        let summary = scanner.scan_once(&cancel).await.unwrap();
        assert_eq!(summary.registries, 2);
        assert_eq!(summary.failed, 0);

        let snapshot = scanner.cache().snapshot().await;
        assert!(rows_for(&snapshot, "empty").is_empty());
        assert_eq!(rows_for(&snapshot, "clientOne").len(), 4);
    }

    #[tokio::test]
    async fn module_with_only_foreign_tags_yields_nothing() {
        let registry = MockRegistry::new("quiet");
        registry.add_tag("console", "latest").await;
        registry.add_tag("console", "v1.2.3").await;
        let scanner = scanner_for(&[&registry]);
        let cancel = CancellationToken::new();

        let summary = scanner.scan_once(&cancel).await.unwrap();
        assert_eq!(summary.updated, 0);
        assert_eq!(summary.failed, 0);
        assert!(scanner.cache().snapshot().await.is_empty());
    }
}
