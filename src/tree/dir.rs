use serde_json::Value;
use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    fmt,
    sync::{Arc, LazyLock},
};
use tokio::sync::Mutex;
use tracing::debug;

use super::{
    file::{desktop_entry, StaticFile},
    ids::{self, IdKind},
    naming::{self, NameAllocator},
    LinkNode, Node,
};
use crate::catalog::{content, CacheKey, EntityKind};
use crate::error::{FsError, Result};
use crate::fs::FsContext;

pub const DESKTOP_FILE: &str = ".directory";
pub const COVER_FILE: &str = "cover.jpg";
/// Hidden root of the by-id tree.
pub const ID_DIR: &str = ".id";

static ROOT_CONTENT: LazyLock<Arc<Value>> = LazyLock::new(|| Arc::new(Value::Null));

/// What a directory shows.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DirKind {
    Root,
    /// `/Artists`
    FollowedArtists,
    /// `/Playlists`
    UserPlaylists,
    Artist(String),
    Album(String),
    /// One disc of a multi-disc album.
    Disc { album_id: String, disc: u64 },
    Playlist(String),
    /// A user's public playlists.
    User(String),
    /// `/.id`
    IdRoot,
    /// `/.id/<kind>`, answering lookups by entity id.
    Ids(IdKind),
}

impl DirKind {
    /// Content cache entry backing this directory. Discs share their album's.
    pub fn cache_key(&self) -> Option<CacheKey> {
        match self {
            DirKind::Root | DirKind::IdRoot | DirKind::Ids(_) => None,
            DirKind::FollowedArtists => Some(CacheKey::new(EntityKind::FollowedArtists, "")),
            DirKind::UserPlaylists => Some(CacheKey::new(EntityKind::UserPlaylists, "")),
            DirKind::Artist(id) => Some(CacheKey::new(EntityKind::Artist, id.as_str())),
            DirKind::Album(id) | DirKind::Disc { album_id: id, .. } => {
                Some(CacheKey::new(EntityKind::Album, id.as_str()))
            }
            DirKind::Playlist(id) => Some(CacheKey::new(EntityKind::Playlist, id.as_str())),
            DirKind::User(id) => Some(CacheKey::new(EntityKind::User, id.as_str())),
        }
    }

    /// Name of the JSON dump of this directory's content.
    pub fn dump_name(&self) -> Option<&'static str> {
        match self {
            DirKind::Root | DirKind::IdRoot | DirKind::Ids(_) => None,
            DirKind::FollowedArtists => Some(".artists.json"),
            DirKind::UserPlaylists => Some(".playlists.json"),
            DirKind::Artist(_) => Some(".artist.json"),
            DirKind::Album(_) | DirKind::Disc { .. } => Some(".album.json"),
            DirKind::Playlist(_) => Some(".playlist.json"),
            DirKind::User(_) => Some(".user.json"),
        }
    }

    /// Whether the content is a single entity (with name, url and images)
    /// rather than a bare collection.
    pub fn is_entity(&self) -> bool {
        !matches!(
            self,
            DirKind::Root
                | DirKind::FollowedArtists
                | DirKind::UserPlaylists
                | DirKind::IdRoot
                | DirKind::Ids(_)
        )
    }

    /// Path from inside this directory back up to `/.id/`, for the links
    /// it lists. `None` where children are real nodes.
    pub fn id_prefix(&self) -> Option<&'static str> {
        match self {
            DirKind::FollowedArtists | DirKind::UserPlaylists => Some("../.id/"),
            DirKind::Artist(_) | DirKind::Album(_) | DirKind::Playlist(_) | DirKind::User(_) => {
                Some("../../")
            }
            DirKind::Disc { .. } => Some("../../../"),
            DirKind::Root | DirKind::IdRoot | DirKind::Ids(_) => None,
        }
    }

    /// Where this directory lives under `/.id`, as `"album/<id>"`.
    pub fn id_path(&self) -> Option<String> {
        let (kind, id) = match self {
            DirKind::Artist(id) => (IdKind::Artist, id),
            DirKind::Album(id) => (IdKind::Album, id),
            DirKind::Playlist(id) => (IdKind::Playlist, id),
            DirKind::User(id) => (IdKind::User, id),
            _ => return None,
        };
        Some(format!("{}/{}", kind, id))
    }

    fn label(&self) -> &'static str {
        match self {
            DirKind::Root => "Spotify",
            DirKind::FollowedArtists => "Artists",
            DirKind::UserPlaylists => "Playlists",
            DirKind::IdRoot => "Catalog by id",
            _ => "",
        }
    }
}

impl fmt::Display for DirKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirKind::Root => write!(f, "root"),
            DirKind::FollowedArtists => write!(f, "followed artists"),
            DirKind::UserPlaylists => write!(f, "user playlists"),
            DirKind::Artist(id) => write!(f, "artist:{}", id),
            DirKind::Album(id) => write!(f, "album:{}", id),
            DirKind::Disc { album_id, disc } => write!(f, "album:{}/disc:{}", album_id, disc),
            DirKind::Playlist(id) => write!(f, "playlist:{}", id),
            DirKind::User(id) => write!(f, "user:{}", id),
            DirKind::IdRoot => write!(f, "ids"),
            DirKind::Ids(kind) => write!(f, "ids:{}", kind),
        }
    }
}

/// Name → node mapping derived from one content blob.
#[derive(Debug)]
pub struct DirectoryIndex {
    source: Arc<Value>,
    entries: BTreeMap<String, Node>,
    extras: BTreeMap<String, Node>,
    /// Resolvable but never listed.
    hidden: BTreeMap<String, Node>,
    /// Remote playlist position of each track entry.
    positions: BTreeMap<String, usize>,
}

impl DirectoryIndex {
    pub fn source(&self) -> &Arc<Value> {
        &self.source
    }

    /// Children derived from the content.
    pub fn entries(&self) -> &BTreeMap<String, Node> {
        &self.entries
    }

    /// Synthetic files (dump, cover, link file).
    pub fn extras(&self) -> &BTreeMap<String, Node> {
        &self.extras
    }

    pub fn get(&self, name: &str) -> Option<&Node> {
        self.entries
            .get(name)
            .or_else(|| self.extras.get(name))
            .or_else(|| self.hidden.get(name))
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    /// Every name, synthetic files first.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Node)> {
        self.extras.iter().chain(self.entries.iter())
    }

    pub fn len(&self) -> usize {
        self.entries.len() + self.extras.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A directory node. Its index is built lazily from the cached content and
/// rebuilt whenever the cache hands out a different content blob.
#[derive(Debug)]
pub struct DirNode {
    kind: DirKind,
    index: Mutex<Option<Arc<DirectoryIndex>>>,
}

impl DirNode {
    pub fn new(kind: DirKind) -> Self {
        Self {
            kind,
            index: Mutex::new(None),
        }
    }

    pub fn kind(&self) -> &DirKind {
        &self.kind
    }

    /// The directory's catalog content, from the cache or fetched on a miss.
    pub async fn content(&self, ctx: &FsContext) -> Result<Arc<Value>> {
        let Some(key) = self.kind.cache_key() else {
            return Ok(ROOT_CONTENT.clone());
        };

        let fetcher = ctx.fetcher.as_ref();
        ctx.cache
            .get_or_fetch(key, || async {
                let value = match &self.kind {
                    DirKind::Root | DirKind::IdRoot | DirKind::Ids(_) => Value::Null,
                    DirKind::FollowedArtists => content::fetch_followed_artists(fetcher).await?,
                    DirKind::UserPlaylists => content::fetch_user_playlists(fetcher).await?,
                    DirKind::Artist(id) => content::fetch_artist(fetcher, id).await?,
                    DirKind::Album(id) | DirKind::Disc { album_id: id, .. } => {
                        content::fetch_album(fetcher, id).await?
                    }
                    DirKind::Playlist(id) => content::fetch_playlist(fetcher, id).await?,
                    DirKind::User(id) => content::fetch_user(fetcher, id).await?,
                };
                Ok::<_, FsError>(Arc::new(value))
            })
            .await
    }

    /// The current index, rebuilt if the content changed since the last one.
    pub async fn index(&self, ctx: &FsContext) -> Result<Arc<DirectoryIndex>> {
        let mut slot = self.index.lock().await;
        let content = self.content(ctx).await?;

        if let Some(index) = slot.as_ref() {
            if Arc::ptr_eq(&index.source, &content) {
                return Ok(index.clone());
            }
        }

        let index = Arc::new(build_index(ctx, &self.kind, content)?);
        debug!("Indexed {}: {} entries", self.kind, index.len());
        *slot = Some(index.clone());
        Ok(index)
    }

    /// Child nodes, without the synthetic files.
    pub async fn children(&self, ctx: &FsContext) -> Result<BTreeMap<String, Node>> {
        Ok(self.index(ctx).await?.entries().clone())
    }

    pub async fn lookup(&self, ctx: &FsContext, name: &str) -> Result<Node> {
        if let DirKind::Ids(kind) = &self.kind {
            return ids::lookup(ctx, *kind, name).await;
        }
        self.index(ctx)
            .await?
            .get(name)
            .cloned()
            .ok_or_else(|| FsError::not_found(format!("{} in {}", name, self.kind)))
    }

    /// Every name in the directory, synthetic files included.
    pub async fn list(&self, ctx: &FsContext) -> Result<Vec<(String, Node)>> {
        Ok(self
            .index(ctx)
            .await?
            .iter()
            .map(|(name, node)| (name.clone(), node.clone()))
            .collect())
    }

    /// Drops the cached content and the index built from it.
    pub async fn invalidate(&self, ctx: &FsContext) {
        if let Some(key) = self.kind.cache_key() {
            ctx.cache.invalidate(&key);
        }
        *self.index.lock().await = None;
        debug!("Invalidated {}", self.kind);
    }
}

fn items(value: &Value) -> &[Value] {
    value.as_array().map(Vec::as_slice).unwrap_or_default()
}

/// Accumulates the entries of one index, keeping sibling names unique.
struct IndexBuilder<'a> {
    ctx: &'a FsContext,
    /// Set where entities are listed as links.
    id_prefix: Option<&'static str>,
    names: NameAllocator,
    entries: BTreeMap<String, Node>,
    positions: BTreeMap<String, usize>,
}

impl<'a> IndexBuilder<'a> {
    fn new(ctx: &'a FsContext, kind: &DirKind, reserved: impl IntoIterator<Item = String>) -> Self {
        let mut names = NameAllocator::new();
        for name in reserved {
            names.claim(name);
        }
        Self {
            ctx,
            id_prefix: kind.id_prefix(),
            names,
            entries: BTreeMap::new(),
            positions: BTreeMap::new(),
        }
    }

    fn dir(&mut self, name: String, kind: DirKind) {
        let name = self.names.claim(name);
        self.entries
            .insert(name, Node::Directory(self.ctx.registry.dir(kind)));
    }

    /// Wraps `node` in a link to `/.id/<path>` where this directory lists links.
    fn linked(&self, path: Option<String>, node: Node) -> Node {
        match (self.id_prefix, path) {
            (Some(prefix), Some(path)) => {
                Node::Link(Arc::new(LinkNode::new(format!("{}{}", prefix, path), node)))
            }
            _ => node,
        }
    }

    fn entity(&mut self, name: String, kind: DirKind) {
        let path = kind.id_path();
        let node = self.linked(path, Node::Directory(self.ctx.registry.dir(kind)));
        let name = self.names.claim(name);
        self.entries.insert(name, node);
    }

    /// Adds a track entry; returns its final name, or `None` for tracks
    /// without an id (unavailable in the market).
    fn track(&mut self, name: String, track: &Value) -> Option<String> {
        let id = track["id"].as_str()?;
        let duration = track["duration_ms"].as_u64().unwrap_or(0);
        let node = self
            .ctx
            .registry
            .track(id, duration, self.ctx.config.target_bitrate_kbps);
        let node = self.linked(Some(ids::track_path(id)), Node::Track(node));
        let name = self.names.claim(name);
        self.entries.insert(name.clone(), node);
        Some(name)
    }

    fn entities(&mut self, list: &Value, kind: impl Fn(String) -> DirKind) {
        for entity in items(list) {
            if let Some(id) = entity["id"].as_str() {
                self.entity(naming::entity_name(entity), kind(id.to_string()));
            }
        }
    }
}

fn build_index(ctx: &FsContext, kind: &DirKind, source: Arc<Value>) -> Result<DirectoryIndex> {
    let extras = build_extras(kind, &source)?;
    let mut builder = IndexBuilder::new(ctx, kind, extras.keys().cloned());
    let mut hidden = BTreeMap::new();

    match kind {
        DirKind::Root => {
            builder.dir("Artists".into(), DirKind::FollowedArtists);
            builder.dir("Playlists".into(), DirKind::UserPlaylists);
            hidden.insert(
                ID_DIR.to_string(),
                Node::Directory(ctx.registry.dir(DirKind::IdRoot)),
            );
        }
        DirKind::IdRoot => {
            for id_kind in IdKind::ALL {
                builder.dir(id_kind.to_string(), DirKind::Ids(id_kind));
            }
        }
        DirKind::Ids(_) => {}
        DirKind::User(_) => builder.entities(&source["playlists"], DirKind::Playlist),
        DirKind::FollowedArtists => builder.entities(&source, DirKind::Artist),
        DirKind::UserPlaylists => builder.entities(&source, DirKind::Playlist),
        DirKind::Artist(_) => builder.entities(&source["albums"], DirKind::Album),
        DirKind::Album(album_id) | DirKind::Disc { album_id, .. } => {
            let only_disc = match kind {
                DirKind::Disc { disc, .. } => Some(*disc),
                _ => None,
            };
            let tracks = items(&source["tracks"]);
            let disc_of = |track: &Value| track["disc_number"].as_u64().unwrap_or(1);
            let discs: BTreeSet<u64> = tracks.iter().map(disc_of).collect();

            if only_disc.is_none() && discs.len() > 1 {
                for disc in discs {
                    builder.dir(
                        naming::disc_dir_name(disc),
                        DirKind::Disc {
                            album_id: album_id.clone(),
                            disc,
                        },
                    );
                }
            } else {
                let shown: Vec<&Value> = tracks
                    .iter()
                    .filter(|track| only_disc.map_or(true, |disc| disc_of(track) == disc))
                    .collect();
                let numbers: HashSet<u64> = shown
                    .iter()
                    .filter_map(|track| track["track_number"].as_u64())
                    .collect();
                let numbered = numbers.len() > 1;

                for track in shown {
                    builder.track(naming::album_track_name(track, numbered), track);
                }
            }
        }
        DirKind::Playlist(_) => {
            let remote_positions = items(&source["track_positions"]);
            for (index, track) in items(&source["tracks"]).iter().enumerate() {
                let name = naming::playlist_track_name(index + 1, track);
                if let Some(name) = builder.track(name, track) {
                    let position = remote_positions
                        .get(index)
                        .and_then(Value::as_u64)
                        .map_or(index, |p| p as usize);
                    builder.positions.insert(name, position);
                }
            }
        }
    }

    Ok(DirectoryIndex {
        source,
        entries: builder.entries,
        extras,
        hidden,
        positions: builder.positions,
    })
}

fn build_extras(kind: &DirKind, source: &Value) -> Result<BTreeMap<String, Node>> {
    let mut extras = BTreeMap::new();

    if let Some(dump) = kind.dump_name() {
        let json = serde_json::to_string_pretty(source)
            .map_err(|e| FsError::remote(format!("cannot serialize {}: {}", kind, e)))?;
        extras.insert(dump.to_string(), Node::File(Arc::new(StaticFile::inline(json))));
    }

    let (name, url) = if kind.is_entity() {
        let name = source["name"]
            .as_str()
            .or_else(|| source["display_name"].as_str())
            .unwrap_or_default();
        let name = match kind {
            DirKind::Disc { disc, .. } => format!("{} ({})", name, naming::disc_dir_name(*disc)),
            _ => name.to_string(),
        };
        let url = source["external_urls"]["spotify"].as_str().unwrap_or_default();
        (name, url.to_string())
    } else {
        (kind.label().to_string(), String::new())
    };
    extras.insert(
        DESKTOP_FILE.to_string(),
        Node::File(Arc::new(StaticFile::inline(desktop_entry(&name, &url)))),
    );

    if kind.is_entity() {
        let url = source["images"][0]["url"].as_str().map(str::to_string);
        extras.insert(COVER_FILE.to_string(), Node::File(Arc::new(StaticFile::cover(url))));
    }

    Ok(extras)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{album_track, FakeCatalog, TestFs};
    use pretty_assertions::assert_eq;

    fn names(list: &[(String, Node)]) -> Vec<&str> {
        list.iter().map(|(name, _)| name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_root_lists_fixed_collections() {
        let fs = TestFs::new(FakeCatalog::new());
        let root = fs.ctx.registry.root();
        let listing = root.list(&fs.ctx).await.unwrap();
        assert_eq!(names(&listing), vec![DESKTOP_FILE, "Artists", "Playlists"]);
    }

    #[tokio::test]
    async fn test_same_name_album_tracks_get_distinct_files() {
        let catalog = FakeCatalog::new();
        catalog.add_album(
            "al1",
            "Live",
            vec![
                album_track("t1", "Intro", 1, 1),
                album_track("t2", "Intro", 1, 2),
                album_track("t3", "AC/DC Cover", 1, 3),
            ],
        );
        let fs = TestFs::new(catalog);
        let album = fs.ctx.registry.dir(DirKind::Album("al1".into()));

        let children = album.children(&fs.ctx).await.unwrap();
        let names: Vec<&str> = children.keys().map(String::as_str).collect();
        assert_eq!(
            names,
            vec!["01 - Intro.mp3", "02 - Intro.mp3", "03 - AC\u{2215}DC Cover.mp3"]
        );
    }

    #[tokio::test]
    async fn test_unnumbered_duplicates_get_suffix() {
        let catalog = FakeCatalog::new();
        catalog.add_album(
            "al1",
            "Single",
            vec![album_track("t1", "Song", 1, 1), album_track("t2", "Song", 1, 1)],
        );
        let fs = TestFs::new(catalog);
        let album = fs.ctx.registry.dir(DirKind::Album("al1".into()));

        let children = album.children(&fs.ctx).await.unwrap();
        let names: Vec<&str> = children.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["Song (2).mp3", "Song.mp3"]);
    }

    #[tokio::test]
    async fn test_multi_disc_album_groups_by_disc() {
        let catalog = FakeCatalog::new();
        catalog.add_album(
            "al1",
            "Double",
            vec![
                album_track("t1", "One", 1, 1),
                album_track("t2", "Two", 1, 2),
                album_track("t3", "Three", 2, 1),
            ],
        );
        let fs = TestFs::new(catalog);
        let album = fs.ctx.registry.dir(DirKind::Album("al1".into()));

        let children = album.children(&fs.ctx).await.unwrap();
        assert_eq!(children.keys().collect::<Vec<_>>(), vec!["Disc 1", "Disc 2"]);

        let disc2 = album.lookup(&fs.ctx, "Disc 2").await.unwrap();
        let disc2 = disc2.as_dir().unwrap();
        let tracks = disc2.children(&fs.ctx).await.unwrap();
        assert_eq!(tracks.keys().collect::<Vec<_>>(), vec!["Three.mp3"]);

        // Both directories come from one fetch.
        assert_eq!(fs.catalog.fetch_count(EntityKind::Album, "al1"), 1);
    }

    #[tokio::test]
    async fn test_extras_resolve_by_name_only() {
        let catalog = FakeCatalog::new();
        catalog.add_album("al1", "Discovery", vec![album_track("t1", "One", 1, 1)]);
        let fs = TestFs::new(catalog);
        let album = fs.ctx.registry.dir(DirKind::Album("al1".into()));

        let children = album.children(&fs.ctx).await.unwrap();
        assert!(!children.contains_key(".album.json"));
        assert!(!children.contains_key(COVER_FILE));

        for extra in [".album.json", COVER_FILE, DESKTOP_FILE] {
            assert!(matches!(album.lookup(&fs.ctx, extra).await, Ok(Node::File(_))));
        }

        let Node::File(dump) = album.lookup(&fs.ctx, ".album.json").await.unwrap() else {
            unreachable!()
        };
        let json: Value = serde_json::from_slice(&dump.contents(fs.ctx.fetcher.as_ref()).await).unwrap();
        assert_eq!(json["name"], "Discovery");
        assert_eq!(json["tracks"][0]["id"], "t1");

        let Node::File(desktop) = album.lookup(&fs.ctx, DESKTOP_FILE).await.unwrap() else {
            unreachable!()
        };
        let text = desktop.contents(fs.ctx.fetcher.as_ref()).await;
        assert!(std::str::from_utf8(&text).unwrap().contains("Name=Discovery\n"));
    }

    #[tokio::test]
    async fn test_same_entity_is_one_node_across_paths() {
        let catalog = FakeCatalog::new();
        catalog.add_album("al1", "Shared", vec![album_track("t1", "Hit", 1, 1)]);
        catalog.add_playlist("pl1", "Mix", &["t1"]);
        let fs = TestFs::new(catalog);

        let album = fs.ctx.registry.dir(DirKind::Album("al1".into()));
        let playlist = fs.ctx.registry.dir(DirKind::Playlist("pl1".into()));
        let via_album = album.lookup(&fs.ctx, "Hit.mp3").await.unwrap();
        let via_playlist = playlist
            .lookup(&fs.ctx, "001 - Test Artist - Hit.mp3")
            .await
            .unwrap();
        assert!(via_album.same_as(&via_playlist));
    }

    #[tokio::test]
    async fn test_listing_failure_surfaces_as_error() {
        let catalog = FakeCatalog::new();
        catalog.add_album("al1", "Flaky", vec![album_track("t1", "One", 1, 1)]);
        catalog.set_failing(EntityKind::Album, "al1", true);
        let fs = TestFs::new(catalog);
        let album = fs.ctx.registry.dir(DirKind::Album("al1".into()));

        assert!(matches!(album.list(&fs.ctx).await, Err(FsError::RemoteFailure(_))));

        // Not cached: the next listing fetches again.
        fs.catalog.set_failing(EntityKind::Album, "al1", false);
        assert_eq!(album.children(&fs.ctx).await.unwrap().len(), 1);
        assert_eq!(fs.catalog.fetch_count(EntityKind::Album, "al1"), 2);
    }

    #[tokio::test]
    async fn test_index_is_reused_until_invalidated() {
        let catalog = FakeCatalog::new();
        catalog.add_album("al1", "Stable", vec![album_track("t1", "One", 1, 1)]);
        let fs = TestFs::new(catalog);
        let album = fs.ctx.registry.dir(DirKind::Album("al1".into()));

        let first = album.index(&fs.ctx).await.unwrap();
        let second = album.index(&fs.ctx).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        album.invalidate(&fs.ctx).await;
        let third = album.index(&fs.ctx).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(fs.catalog.fetch_count(EntityKind::Album, "al1"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_index_rebuilds_after_ttl() {
        let catalog = FakeCatalog::new();
        catalog.add_album("al1", "Aging", vec![album_track("t1", "One", 1, 1)]);
        let fs = TestFs::new(catalog);
        let album = fs.ctx.registry.dir(DirKind::Album("al1".into()));

        let first = album.index(&fs.ctx).await.unwrap();
        tokio::time::advance(fs.ctx.config.cache_ttl()).await;
        let second = album.index(&fs.ctx).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(fs.catalog.fetch_count(EntityKind::Album, "al1"), 2);
    }

    #[tokio::test]
    async fn test_concurrent_listings_share_one_fetch() {
        let catalog = FakeCatalog::new();
        catalog.add_album("al1", "Popular", vec![album_track("t1", "One", 1, 1)]);
        let fs = TestFs::new(catalog);
        let album = fs.ctx.registry.dir(DirKind::Album("al1".into()));

        let listings = futures::future::join_all((0..8).map(|_| album.list(&fs.ctx))).await;
        assert!(listings.iter().all(Result::is_ok));
        assert_eq!(fs.catalog.fetch_count(EntityKind::Album, "al1"), 1);
    }
}
