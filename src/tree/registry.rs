use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

use super::{DirKind, DirNode, TrackFile};

/// Memo tables giving each entity exactly one node.
///
/// Owned by the filesystem root; nothing here is process-global, so two
/// filesystems (or two tests) never share nodes. Entries nothing else holds
/// are dropped by [`NodeRegistry::prune`].
#[derive(Debug, Default)]
pub struct NodeRegistry {
    dirs: DashMap<DirKind, Arc<DirNode>>,
    tracks: DashMap<String, Arc<TrackFile>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> Arc<DirNode> {
        self.dir(DirKind::Root)
    }

    pub fn dir(&self, kind: DirKind) -> Arc<DirNode> {
        self.dirs
            .entry(kind.clone())
            .or_insert_with(|| Arc::new(DirNode::new(kind)))
            .clone()
    }

    /// The node for `track_id`, created with the given duration on first use.
    pub fn track(&self, track_id: &str, duration_ms: u64, bitrate_kbps: u32) -> Arc<TrackFile> {
        if let Some(track) = self.tracks.get(track_id) {
            return track.clone();
        }
        self.tracks
            .entry(track_id.to_string())
            .or_insert_with(|| Arc::new(TrackFile::new(track_id, duration_ms, bitrate_kbps)))
            .clone()
    }

    pub fn get_track(&self, track_id: &str) -> Option<Arc<TrackFile>> {
        self.tracks.get(track_id).map(|track| track.clone())
    }

    /// Drops nodes referenced only by the registry: no directory index
    /// lists them and no open file holds them. Returns how many went.
    ///
    /// Dropping a directory releases its index, which can orphan its
    /// children in turn; those go on the next call.
    pub fn prune(&self) -> usize {
        let before = self.dirs.len() + self.tracks.len();
        self.dirs.retain(|kind, dir| {
            matches!(kind, DirKind::Root | DirKind::IdRoot | DirKind::Ids(_))
                || Arc::strong_count(dir) > 1
        });
        self.tracks
            .retain(|_, track| track.open_count() > 0 || Arc::strong_count(track) > 1);
        let removed = before.saturating_sub(self.dirs.len() + self.tracks.len());
        if removed > 0 {
            debug!("Pruned {} unreferenced nodes", removed);
        }
        removed
    }

    pub fn dir_count(&self) -> usize {
        self.dirs.len()
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }
}
