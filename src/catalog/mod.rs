//! # Catalog Module
//!
//! The narrow contract the filesystem needs from the remote music catalog,
//! plus the routines that turn single entity fetches into complete directory
//! content by draining server-side pagination.
//!
//! ## Architecture
//!
//! ### [`CatalogFetcher`]
//! Implemented by the HTTP client in [`crate::sources::spotify`] and by the
//! in-memory fakes used in tests. Every call may fail with a transport error;
//! the core never retries, it surfaces the failure to the caller.
//!
//! ### [`pages`]
//! Cursor-following pagination: a page carries its items and the cursor of
//! the next page, and collection routines keep requesting until no cursor is
//! returned.
//!
//! ### [`content`]
//! One routine per directory-backing entity (artist with albums, album with
//! tracks, playlist with tracks, followed artists, user playlists). These are
//! what the content cache calls on a miss.

pub mod content;
pub mod pages;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use std::fmt;

use crate::error::Result;
pub use pages::{drain_pages, fetch_all_pages, Page};

/// Kinds of remote entities and collections the catalog can fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Artist,
    /// First page of an artist's albums.
    ArtistAlbums,
    Album,
    Playlist,
    Track,
    /// First page of the artists the user follows.
    FollowedArtists,
    /// First page of the user's own and followed playlists.
    UserPlaylists,
    /// Public profile of any user.
    User,
    /// First page of a user's public playlists.
    UserPublicPlaylists,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Artist => "artist",
            EntityKind::ArtistAlbums => "artist_albums",
            EntityKind::Album => "album",
            EntityKind::Playlist => "playlist",
            EntityKind::Track => "track",
            EntityKind::FollowedArtists => "followed_artists",
            EntityKind::UserPlaylists => "user_playlists",
            EntityKind::User => "user",
            EntityKind::UserPublicPlaylists => "user_public_playlists",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one fetched blob of catalog content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub kind: EntityKind,
    pub id: String,
}

impl CacheKey {
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.id.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}:{}", self.kind, self.id)
        }
    }
}

/// Contract with the remote catalog.
///
/// Ids are catalog ids (no `spotify:` URI prefix). Collection kinds
/// ([`EntityKind::FollowedArtists`], [`EntityKind::UserPlaylists`]) ignore
/// the id.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogFetcher: Send + Sync {
    /// Fetches one entity, or the first page of a collection kind.
    async fn fetch_entity(&self, kind: EntityKind, id: &str) -> Result<Value>;

    /// Fetches the page a previous page's cursor points at.
    async fn fetch_page(&self, cursor: &str) -> Result<Page>;

    /// Resolves free text to the id of the best match, if any.
    async fn search(&self, query: &str, kind: EntityKind) -> Result<Option<String>>;

    /// Downloads an arbitrary catalog asset (cover art, preview clips).
    async fn fetch_blob(&self, url: &str) -> Result<Bytes>;

    async fn follow(&self, artist_id: &str) -> Result<()>;

    async fn unfollow(&self, artist_id: &str) -> Result<()>;

    async fn playlist_add(&self, playlist_id: &str, track_id: &str) -> Result<()>;

    async fn playlist_remove(
        &self,
        playlist_id: &str,
        track_id: &str,
        position: usize,
        snapshot_id: &str,
    ) -> Result<()>;

    async fn playlist_reorder(
        &self,
        playlist_id: &str,
        from_pos: usize,
        to_pos: usize,
        snapshot_id: &str,
    ) -> Result<()>;
}
