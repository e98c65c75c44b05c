use modwatch_registry::{Digest, ReleaseChannel};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// One row of the flattened cache view: a concrete module version, its
/// documentation archive, and the release channels currently pointing at it.
///
/// Snapshot entries are plain values. The archive buffer is shared by
/// reference with the cache (and any other snapshots), but it is immutable
/// after insertion, so holding an entry never observes later cache writes.
/// Equality compares the archive by content, so two snapshots taken with no
/// intervening mutation compare equal.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SnapshotEntry {
    pub registry: String,
    pub module: String,
    pub version: String,
    pub archive: Arc<[u8]>,
    pub channels: BTreeSet<ReleaseChannel>,
}

/// Per-module cache state: latest digest per channel, archive per version.
#[derive(Debug, Default)]
pub(crate) struct ModuleState {
    pub(crate) digests: BTreeMap<ReleaseChannel, Digest>,
    pub(crate) versions: BTreeMap<String, VersionState>,
}

/// A cached version: its repacked documentation archive and the channels
/// referencing it. An empty channel set marks the version as orphaned and
/// eligible for reaping.
#[derive(Debug)]
pub(crate) struct VersionState {
    pub(crate) archive: Arc<[u8]>,
    pub(crate) channels: BTreeSet<ReleaseChannel>,
}
