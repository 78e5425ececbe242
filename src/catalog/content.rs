//! Complete directory content for each entity kind.
//!
//! Each routine returns one JSON blob holding the entity plus its whole child
//! collection, with pagination already drained. That blob is what gets cached
//! and what the `.json` dump files show.

use serde_json::Value;
use tracing::debug;

use super::{drain_pages, CatalogFetcher, EntityKind, Page};
use crate::error::{FsError, Result};

/// Artist object with an `albums` array.
pub async fn fetch_artist(fetcher: &dyn CatalogFetcher, id: &str) -> Result<Value> {
    let mut artist = fetcher.fetch_entity(EntityKind::Artist, id).await?;
    let first = Page::from_value(&fetcher.fetch_entity(EntityKind::ArtistAlbums, id).await?)?;
    let albums = drain_pages(fetcher, first).await?;

    debug!("Artist {} has {} albums", id, albums.len());
    set_field(&mut artist, "albums", Value::Array(albums))?;
    Ok(artist)
}

/// Album object whose `tracks` paging object is replaced by the full array.
pub async fn fetch_album(fetcher: &dyn CatalogFetcher, id: &str) -> Result<Value> {
    let mut album = fetcher.fetch_entity(EntityKind::Album, id).await?;
    let first = Page::from_value(album.get("tracks").unwrap_or(&Value::Null))?;
    let tracks = drain_pages(fetcher, first).await?;

    debug!("Album {} has {} tracks", id, tracks.len());
    set_field(&mut album, "tracks", Value::Array(tracks))?;
    Ok(album)
}

/// Playlist object whose `tracks` holds the playable track objects.
///
/// Local files and removed (null) tracks are dropped. `track_positions`
/// holds, for each kept track, its position in the remote playlist, which is
/// what removals must address.
pub async fn fetch_playlist(fetcher: &dyn CatalogFetcher, id: &str) -> Result<Value> {
    let mut playlist = fetcher.fetch_entity(EntityKind::Playlist, id).await?;
    let first = Page::from_value(playlist.get("tracks").unwrap_or(&Value::Null))?;
    let items = drain_pages(fetcher, first).await?;

    let mut tracks = Vec::with_capacity(items.len());
    let mut positions = Vec::with_capacity(items.len());
    for (position, mut item) in items.into_iter().enumerate() {
        if item["is_local"].as_bool().unwrap_or(false) {
            continue;
        }
        let track = item
            .get_mut("track")
            .map(Value::take)
            .filter(Value::is_object);
        if let Some(track) = track {
            tracks.push(track);
            positions.push(Value::from(position));
        }
    }

    debug!("Playlist {} has {} playable tracks", id, tracks.len());
    set_field(&mut playlist, "tracks", Value::Array(tracks))?;
    set_field(&mut playlist, "track_positions", Value::Array(positions))?;
    Ok(playlist)
}

/// Array of every artist the user follows.
pub async fn fetch_followed_artists(fetcher: &dyn CatalogFetcher) -> Result<Value> {
    let first = Page::from_value(&fetcher.fetch_entity(EntityKind::FollowedArtists, "").await?)?;
    Ok(Value::Array(drain_pages(fetcher, first).await?))
}

/// Array of every playlist in the user's library.
pub async fn fetch_user_playlists(fetcher: &dyn CatalogFetcher) -> Result<Value> {
    let first = Page::from_value(&fetcher.fetch_entity(EntityKind::UserPlaylists, "").await?)?;
    Ok(Value::Array(drain_pages(fetcher, first).await?))
}

/// User profile with a `playlists` array of their public playlists.
pub async fn fetch_user(fetcher: &dyn CatalogFetcher, id: &str) -> Result<Value> {
    let mut user = fetcher.fetch_entity(EntityKind::User, id).await?;
    let first = Page::from_value(&fetcher.fetch_entity(EntityKind::UserPublicPlaylists, id).await?)?;
    let playlists = drain_pages(fetcher, first).await?;

    debug!("User {} has {} public playlists", id, playlists.len());
    set_field(&mut user, "playlists", Value::Array(playlists))?;
    Ok(user)
}

fn set_field(target: &mut Value, key: &str, value: Value) -> Result<()> {
    target
        .as_object_mut()
        .ok_or_else(|| FsError::remote(format!("malformed entity: expected object for {}", key)))?
        .insert(key.to_string(), value);
    Ok(())
}
