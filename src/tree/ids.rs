use std::{fmt, sync::Arc};
use tracing::debug;

use super::{
    dir::{DirKind, DirNode},
    file::{desktop_entry, StaticFile},
    Node,
};
use crate::error::{FsError, Result};
use crate::fs::FsContext;

/// Subdirectories of `/.id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdKind {
    Track,
    Album,
    Artist,
    User,
    Playlist,
}

impl IdKind {
    pub const ALL: [IdKind; 5] = [
        IdKind::Track,
        IdKind::Album,
        IdKind::Artist,
        IdKind::User,
        IdKind::Playlist,
    ];

    fn dir_kind(self, id: &str) -> Option<DirKind> {
        let id = id.to_string();
        match self {
            IdKind::Track => None,
            IdKind::Album => Some(DirKind::Album(id)),
            IdKind::Artist => Some(DirKind::Artist(id)),
            IdKind::User => Some(DirKind::User(id)),
            IdKind::Playlist => Some(DirKind::Playlist(id)),
        }
    }
}

impl fmt::Display for IdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IdKind::Track => "track",
            IdKind::Album => "album",
            IdKind::Artist => "artist",
            IdKind::User => "user",
            IdKind::Playlist => "playlist",
        };
        f.write_str(name)
    }
}

/// Files a track id answers to under `/.id/track`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrackView {
    Audio,
    Json,
    Desktop,
}

impl TrackView {
    fn parse(name: &str) -> Option<(&str, TrackView)> {
        let (id, extension) = name.rsplit_once('.')?;
        let view = match extension {
            "mp3" => TrackView::Audio,
            "json" => TrackView::Json,
            "desktop" => TrackView::Desktop,
            _ => return None,
        };
        (!id.is_empty()).then_some((id, view))
    }
}

/// Path of a track's audio file below `/.id/`.
pub fn track_path(track_id: &str) -> String {
    format!("{}/{}.mp3", IdKind::Track, track_id)
}

/// Resolves `name` inside `/.id/<kind>`. Ids are checked against the
/// catalog before any node is created, so unknown ids leave no trace in the
/// registry.
pub async fn lookup(ctx: &FsContext, kind: IdKind, name: &str) -> Result<Node> {
    let missing = || FsError::not_found(format!("{} in /.id/{}", name, kind));

    let Some(dir_kind) = kind.dir_kind(name) else {
        let (track_id, view) = TrackView::parse(name).ok_or_else(missing)?;
        return track_view(ctx, track_id, view).await;
    };

    // Fills the content cache; the registered node reads from it.
    DirNode::new(dir_kind.clone()).content(ctx).await?;
    debug!("Resolved {} by id", dir_kind);
    Ok(Node::Directory(ctx.registry.dir(dir_kind)))
}

async fn track_view(ctx: &FsContext, track_id: &str, view: TrackView) -> Result<Node> {
    let track = ctx.cached_track(track_id).await?;

    let node = match view {
        TrackView::Audio => {
            let duration = track["duration_ms"].as_u64().unwrap_or(0);
            Node::Track(
                ctx.registry
                    .track(track_id, duration, ctx.config.target_bitrate_kbps),
            )
        }
        TrackView::Json => {
            let json = serde_json::to_string_pretty(track.as_ref())
                .map_err(|e| FsError::remote(format!("cannot serialize track {}: {}", track_id, e)))?;
            Node::File(Arc::new(StaticFile::inline(json)))
        }
        TrackView::Desktop => {
            let name = track["name"].as_str().unwrap_or(track_id);
            let url = track["external_urls"]["spotify"].as_str().unwrap_or_default();
            Node::File(Arc::new(StaticFile::inline(desktop_entry(name, url))))
        }
    };
    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::EntityKind;
    use crate::testing::{album_track, FakeCatalog, TestFs};
    use pretty_assertions::assert_eq;
    use serde_json::Value;

    fn catalog() -> FakeCatalog {
        let catalog = FakeCatalog::new();
        catalog.add_album("al1", "Discovery", vec![album_track("t1", "One More Time", 1, 1)]);
        catalog.add_playlist("pl1", "Mix", &["t1"]);
        catalog.add_user("u1", "Thomas", &["pl1"]);
        catalog
    }

    async fn text(fs: &TestFs, node: Node) -> String {
        let Node::File(file) = node else {
            panic!("{:?} is not a static file", node)
        };
        String::from_utf8(file.contents(fs.ctx.fetcher.as_ref()).await.to_vec()).unwrap()
    }

    #[test]
    fn test_track_view_names() {
        assert_eq!(TrackView::parse("t1.mp3"), Some(("t1", TrackView::Audio)));
        assert_eq!(TrackView::parse("t1.json"), Some(("t1", TrackView::Json)));
        assert_eq!(TrackView::parse("t1.desktop"), Some(("t1", TrackView::Desktop)));
        assert_eq!(TrackView::parse("t1.flac"), None);
        assert_eq!(TrackView::parse(".mp3"), None);
        assert_eq!(TrackView::parse("t1"), None);
        assert_eq!(track_path("t1"), "track/t1.mp3");
    }

    #[tokio::test]
    async fn test_track_views() {
        let fs = TestFs::new(catalog());

        let audio = lookup(&fs.ctx, IdKind::Track, "t1.mp3").await.unwrap();
        let track = audio.as_track().unwrap();
        assert!(Arc::ptr_eq(track, &fs.ctx.registry.get_track("t1").unwrap()));
        assert_eq!(track.duration_ms(), 1000);

        let json = text(&fs, lookup(&fs.ctx, IdKind::Track, "t1.json").await.unwrap()).await;
        let json: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(json["name"], "One More Time");

        let desktop = text(&fs, lookup(&fs.ctx, IdKind::Track, "t1.desktop").await.unwrap()).await;
        assert!(desktop.contains("Name=One More Time\n"));
        assert!(desktop.contains("URL=https://open.spotify.com/track/t1\n"));

        // All three views share one fetch.
        assert_eq!(fs.catalog.fetch_count(EntityKind::Track, "t1"), 1);
    }

    #[tokio::test]
    async fn test_unknown_ids_are_not_registered() {
        let fs = TestFs::new(catalog());
        let before = (fs.ctx.registry.dir_count(), fs.ctx.registry.track_count());

        for (kind, name) in [
            (IdKind::Track, "nope.mp3"),
            (IdKind::Track, "t1.ogg"),
            (IdKind::Album, "nope"),
            (IdKind::User, "nope"),
        ] {
            let result = lookup(&fs.ctx, kind, name).await;
            assert!(matches!(result, Err(FsError::NotFound(_))), "{} {}", kind, name);
        }
        assert_eq!(
            (fs.ctx.registry.dir_count(), fs.ctx.registry.track_count()),
            before
        );
        // The bad extension never reached the catalog.
        assert_eq!(fs.catalog.fetch_count(EntityKind::Track, "t1"), 0);
    }

    #[tokio::test]
    async fn test_directory_ids_share_registry_nodes() {
        let fs = TestFs::new(catalog());
        let by_id = lookup(&fs.ctx, IdKind::Album, "al1").await.unwrap();
        let registered = fs.ctx.registry.dir(DirKind::Album("al1".into()));
        assert!(Arc::ptr_eq(by_id.as_dir().unwrap(), &registered));

        // Listing reuses the content fetched to check the id.
        registered.list(&fs.ctx).await.unwrap();
        assert_eq!(fs.catalog.fetch_count(EntityKind::Album, "al1"), 1);
    }
}
