//! Catalog mutations performed through directories.
//!
//! Only playlists (add, remove, reorder tracks) and the followed-artists
//! directory (follow, unfollow) accept them. Each one is a single catalog
//! call followed by an invalidation of the directory, so the next listing
//! shows the result.

use tracing::info;

use super::{naming, DirKind, DirNode, Node};
use crate::catalog::EntityKind;
use crate::error::{FsError, Result};
use crate::fs::FsContext;

/// What to add: free text to search for, or an existing node.
#[derive(Debug, Clone, Copy)]
pub enum ChildRef<'a> {
    Name(&'a str),
    Node(&'a Node),
}

/// Catalog refusals become permission errors; a missing entity stays
/// not-found.
fn rejected(err: FsError) -> FsError {
    match err {
        FsError::NotFound(_) => err,
        other => FsError::unsupported(other.to_string()),
    }
}

async fn resolve(ctx: &FsContext, query: &str, kind: EntityKind) -> Result<String> {
    ctx.fetcher
        .search(query, kind)
        .await?
        .ok_or_else(|| FsError::not_found(format!("no {} matching {:?}", kind, query)))
}

impl DirNode {
    fn read_only(&self) -> FsError {
        FsError::unsupported(format!("{} is read-only", self.kind()))
    }

    /// Adds a track to a playlist, or follows an artist.
    pub async fn add_child(&self, ctx: &FsContext, child: ChildRef<'_>) -> Result<()> {
        match self.kind() {
            DirKind::Playlist(playlist_id) => {
                let track_id = match child {
                    ChildRef::Node(node) => match node.as_track() {
                        Some(track) => track.track_id().to_string(),
                        None => {
                            return Err(FsError::unsupported(
                                "only tracks can be added to a playlist",
                            ))
                        }
                    },
                    ChildRef::Name(name) => {
                        resolve(ctx, &naming::search_query(name), EntityKind::Track).await?
                    }
                };
                ctx.fetcher
                    .playlist_add(playlist_id, &track_id)
                    .await
                    .map_err(rejected)?;
                info!("➕ Added track {} to playlist {}", track_id, playlist_id);
            }
            DirKind::FollowedArtists => {
                let artist_id = match child {
                    ChildRef::Node(node) => match node.as_dir().map(|dir| dir.kind()) {
                        Some(DirKind::Artist(id)) => id.clone(),
                        _ => return Err(FsError::unsupported("only artists can be followed")),
                    },
                    ChildRef::Name(name) => {
                        resolve(ctx, &naming::search_query(name), EntityKind::Artist).await?
                    }
                };
                ctx.fetcher.follow(&artist_id).await.map_err(rejected)?;
                info!("➕ Following artist {}", artist_id);
            }
            _ => return Err(self.read_only()),
        }

        self.invalidate(ctx).await;
        Ok(())
    }

    /// Removes a track from a playlist, or unfollows an artist.
    pub async fn remove_child(&self, ctx: &FsContext, name: &str) -> Result<()> {
        match self.kind() {
            DirKind::Playlist(playlist_id) => {
                let index = self.index(ctx).await?;
                let track = match index.entries().get(name).map(Node::followed) {
                    Some(Node::Track(track)) => track.clone(),
                    Some(_) => return Err(FsError::unsupported(format!("{} is not a track", name))),
                    None if index.extras().contains_key(name) => return Err(self.read_only()),
                    None => return Err(FsError::not_found(name)),
                };
                let position = index
                    .position(name)
                    .ok_or_else(|| FsError::not_found(name))?;
                let snapshot = index.source()["snapshot_id"].as_str().unwrap_or_default();

                ctx.fetcher
                    .playlist_remove(playlist_id, track.track_id(), position, snapshot)
                    .await
                    .map_err(rejected)?;
                info!(
                    "🗑️ Removed track {} (position {}) from playlist {}",
                    track.track_id(),
                    position,
                    playlist_id
                );
            }
            DirKind::FollowedArtists => {
                let node = self.lookup(ctx, name).await?;
                let artist_id = match node.as_dir().map(|dir| dir.kind()) {
                    Some(DirKind::Artist(id)) => id.clone(),
                    _ => return Err(self.read_only()),
                };
                ctx.fetcher.unfollow(&artist_id).await.map_err(rejected)?;
                info!("🗑️ Unfollowed artist {}", artist_id);
            }
            _ => return Err(self.read_only()),
        }

        self.invalidate(ctx).await;
        Ok(())
    }

    /// Moves a playlist track. `new` must start with the 1-based target
    /// position, as in `"003 - ..."`.
    pub async fn rename_child(&self, ctx: &FsContext, old: &str, new: &str) -> Result<()> {
        let DirKind::Playlist(playlist_id) = self.kind() else {
            return Err(self.read_only());
        };
        if old == new {
            return Ok(());
        }

        let index = self.index(ctx).await?;
        if index.entries().get(old).and_then(Node::as_track).is_none() {
            return Err(FsError::not_found(old));
        }
        let from = index.position(old).ok_or_else(|| FsError::not_found(old))?;

        let target = naming::parse_position_prefix(new)
            .map(|(position, _)| position)
            .filter(|position| *position > 0)
            .ok_or_else(|| {
                FsError::unsupported(format!("{:?} does not start with a position", new))
            })?;
        // Translate the displayed position to a remote one; local files are
        // hidden but still occupy remote positions.
        let mut remote: Vec<usize> = index.entries().keys().filter_map(|n| index.position(n)).collect();
        remote.sort_unstable();
        let to = remote
            .get(target - 1)
            .or(remote.last())
            .copied()
            .ok_or_else(|| FsError::not_found(old))?;

        if from == to {
            return Ok(());
        }
        let snapshot = index.source()["snapshot_id"].as_str().unwrap_or_default();
        ctx.fetcher
            .playlist_reorder(playlist_id, from, to, snapshot)
            .await
            .map_err(rejected)?;
        info!("🔀 Moved playlist {} track {} -> {}", playlist_id, from, to);

        self.invalidate(ctx).await;
        Ok(())
    }
}
