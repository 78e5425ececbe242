//! In-memory stand-ins for the catalog, the playback transport and the
//! encoder, shared by the unit tests.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};
use tokio::sync::Notify;

use crate::audio::{EncoderFactory, PcmChunk, PcmEncoder, PcmSink, PlaybackTransport};
use crate::catalog::{CatalogFetcher, EntityKind, Page};
use crate::config::Config;
use crate::container::{TagSource, TrackTags};
use crate::error::{FsError, Result};
use crate::fs::{CatalogFs, FsContext};

/// Small items per page, so collections of three or more span pages.
const PAGE_SIZE: usize = 2;

pub fn test_config() -> Config {
    Config {
        access_token: "test-token".to_string(),
        cache_ttl_secs: 3600,
        id3_header_size: 4096,
        pcm_queue_depth: 4,
        ..Config::default()
    }
}

/// Album track object as the catalog returns it inside an album.
pub fn album_track(id: &str, name: &str, disc: u64, number: u64) -> Value {
    json!({
        "id": id,
        "name": name,
        "artists": [{ "name": "Test Artist" }],
        "disc_number": disc,
        "track_number": number,
        "duration_ms": 1000,
        "external_urls": { "spotify": format!("https://open.spotify.com/track/{}", id) }
    })
}

/// Writes each sample as two little-endian bytes.
#[derive(Debug, Default)]
pub struct ByteEncoder;

impl EncoderFactory for ByteEncoder {
    fn create(&self, _bitrate_kbps: u32) -> Result<Box<dyn PcmEncoder>> {
        Ok(Box::new(ByteEncoder))
    }
}

impl PcmEncoder for ByteEncoder {
    fn encode(&mut self, chunk: &PcmChunk) -> Result<Vec<u8>> {
        Ok(chunk.samples.iter().flat_map(|s| s.to_le_bytes()).collect())
    }

    fn flush(&mut self) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }
}

/// Fixed tags, no catalog needed.
pub struct StaticTags;

#[async_trait]
impl TagSource for StaticTags {
    async fn track_tags(&self, track_id: &str) -> Result<TrackTags> {
        Ok(TrackTags {
            title: format!("Static {}", track_id),
            artists: vec!["Test Artist".into()],
            ..TrackTags::default()
        })
    }
}

/// What the fake transport does for one track. Chunks are mono, 44.1 kHz.
#[derive(Debug, Clone)]
pub enum Script {
    /// Deliver the chunks, then end cleanly.
    Play(Vec<Vec<i16>>),
    /// Deliver the chunks, then fail.
    FailAfter(Vec<Vec<i16>>, FsError),
    /// Deliver the chunks, then wait for `stop`.
    Hold(Vec<Vec<i16>>),
    /// Never deliver anything and never notice `stop`.
    Stall,
}

fn owned(chunks: &[&[i16]]) -> Vec<Vec<i16>> {
    chunks.iter().map(|chunk| chunk.to_vec()).collect()
}

impl Script {
    pub fn play(chunks: &[&[i16]]) -> Self {
        Script::Play(owned(chunks))
    }

    pub fn fail_after(chunks: &[&[i16]], err: FsError) -> Self {
        Script::FailAfter(owned(chunks), err)
    }

    pub fn hold(chunks: &[&[i16]]) -> Self {
        Script::Hold(owned(chunks))
    }
}

/// Scripted transport that records what it was asked to do.
#[derive(Default)]
pub struct FakeTransport {
    scripts: Mutex<HashMap<String, Script>>,
    loads: Mutex<Vec<String>>,
    stops: AtomicUsize,
    stop_signal: Notify,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, track_id: &str, script: Script) {
        self.scripts.lock().insert(track_id.to_string(), script);
    }

    pub fn loads(&self) -> Vec<String> {
        self.loads.lock().clone()
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// Highest number of sessions that ran at once.
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    async fn run(&self, script: Script, sink: &PcmSink) -> Result<()> {
        let (chunks, ending) = match script {
            Script::Play(chunks) => (chunks, None),
            Script::FailAfter(chunks, err) => (chunks, Some(Err(err))),
            Script::Hold(chunks) => (chunks, Some(Ok(()))),
            Script::Stall => return std::future::pending().await,
        };
        for samples in chunks {
            sink.deliver(PcmChunk::new(samples, 1, 44_100)).await?;
        }
        match ending {
            None => Ok(()),
            Some(Err(err)) => Err(err),
            Some(Ok(())) => {
                self.stop_signal.notified().await;
                Ok(())
            }
        }
    }
}

struct Running<'a>(&'a AtomicUsize);

impl Drop for Running<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PlaybackTransport for FakeTransport {
    async fn load(&self, track_id: &str, sink: PcmSink) -> Result<()> {
        self.loads.lock().push(track_id.to_string());
        let running = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(running, Ordering::SeqCst);

        let script = self
            .scripts
            .lock()
            .get(track_id)
            .cloned()
            .unwrap_or(Script::Play(Vec::new()));
        // Sessions may be dropped mid-run, so the count is released on drop.
        let _running = Running(&self.active);
        self.run(script, &sink).await
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        // Only sessions already waiting hear the stop, like a real transport.
        self.stop_signal.notify_waiters();
    }
}

#[derive(Debug)]
struct FakePlaylist {
    name: String,
    /// Track ids; `None` is a local file.
    items: Vec<Option<String>>,
}

#[derive(Debug, Default)]
struct CatalogState {
    artists: BTreeMap<String, String>,
    artist_albums: BTreeMap<String, Vec<String>>,
    albums: BTreeMap<String, (String, Vec<Value>)>,
    tracks: BTreeMap<String, Value>,
    playlists: BTreeMap<String, FakePlaylist>,
    /// User id → (display name, public playlist ids).
    users: BTreeMap<String, (String, Vec<String>)>,
    followed: Vec<String>,
    snapshot: u64,
    failing: HashSet<(EntityKind, String)>,
    reject_mutations: bool,
    fetches: HashMap<(EntityKind, String), usize>,
    searches: usize,
    mutations: Vec<String>,
}

impl CatalogState {
    fn album_summary(&self, id: &str) -> Value {
        let name = self.albums.get(id).map(|(name, _)| name.as_str()).unwrap_or(id);
        json!({
            "id": id,
            "name": name,
            "images": [{ "url": format!("https://img/{}", id) }],
        })
    }

    fn artist(&self, id: &str) -> Value {
        json!({
            "id": id,
            "name": self.artists.get(id).cloned().unwrap_or_default(),
            "images": [{ "url": format!("https://img/{}", id) }],
            "external_urls": { "spotify": format!("https://open.spotify.com/artist/{}", id) },
        })
    }

    fn playlist_item(&self, item: &Option<String>) -> Value {
        match item.as_ref().and_then(|id| self.tracks.get(id)) {
            Some(track) => json!({ "is_local": false, "track": track }),
            None => json!({ "is_local": true, "track": { "id": null, "name": "local.mp3" } }),
        }
    }

    /// Every item of a paginated collection.
    fn collection(&self, kind: EntityKind, id: &str) -> Result<Vec<Value>> {
        let missing = || FsError::not_found(format!("{}:{}", kind, id));
        Ok(match kind {
            EntityKind::ArtistAlbums => self
                .artist_albums
                .get(id)
                .map(|albums| albums.iter().map(|album| self.album_summary(album)).collect())
                .unwrap_or_default(),
            EntityKind::Album => self.albums.get(id).ok_or_else(missing)?.1.clone(),
            EntityKind::Playlist => self
                .playlists
                .get(id)
                .ok_or_else(missing)?
                .items
                .iter()
                .map(|item| self.playlist_item(item))
                .collect(),
            EntityKind::FollowedArtists => self.followed.iter().map(|id| self.artist(id)).collect(),
            EntityKind::UserPlaylists => self
                .playlists
                .iter()
                .map(|(id, playlist)| json!({ "id": id, "name": playlist.name }))
                .collect(),
            EntityKind::UserPublicPlaylists => self
                .users
                .get(id)
                .ok_or_else(missing)?
                .1
                .iter()
                .filter_map(|playlist_id| {
                    let playlist = self.playlists.get(playlist_id)?;
                    Some(json!({ "id": playlist_id, "name": playlist.name }))
                })
                .collect(),
            EntityKind::Artist | EntityKind::Track | EntityKind::User => return Err(missing()),
        })
    }

    fn page(&self, kind: EntityKind, id: &str, offset: usize) -> Result<Value> {
        let items = self.collection(kind, id)?;
        let end = (offset + PAGE_SIZE).min(items.len());
        let next = (end < items.len()).then(|| format!("{}|{}|{}", kind, id, end));
        let page = items[offset.min(end)..end].to_vec();
        Ok(json!({ "items": page, "next": next }))
    }

    fn entity(&self, kind: EntityKind, id: &str) -> Result<Value> {
        let missing = || FsError::not_found(format!("{}:{}", kind, id));
        match kind {
            EntityKind::Artist => {
                if !self.artists.contains_key(id) {
                    return Err(missing());
                }
                Ok(self.artist(id))
            }
            EntityKind::ArtistAlbums
            | EntityKind::UserPlaylists
            | EntityKind::UserPublicPlaylists => self.page(kind, id, 0),
            EntityKind::User => {
                let (name, _) = self.users.get(id).ok_or_else(missing)?;
                Ok(json!({
                    "id": id,
                    "display_name": name,
                    "images": [],
                    "external_urls": { "spotify": format!("https://open.spotify.com/user/{}", id) },
                }))
            }
            EntityKind::FollowedArtists => Ok(json!({ "artists": self.page(kind, id, 0)? })),
            EntityKind::Album => {
                let (name, tracks) = self.albums.get(id).ok_or_else(missing)?;
                Ok(json!({
                    "id": id,
                    "name": name,
                    "artists": [{ "name": "Test Artist" }],
                    "total_tracks": tracks.len(),
                    "release_date": "2001-03-12",
                    "images": [{ "url": format!("https://img/{}", id) }],
                    "external_urls": { "spotify": format!("https://open.spotify.com/album/{}", id) },
                    "tracks": self.page(kind, id, 0)?,
                }))
            }
            EntityKind::Playlist => {
                let playlist = self.playlists.get(id).ok_or_else(missing)?;
                Ok(json!({
                    "id": id,
                    "name": playlist.name,
                    "snapshot_id": format!("snap-{}", self.snapshot),
                    "images": [{ "url": format!("https://img/{}", id) }],
                    "external_urls": { "spotify": format!("https://open.spotify.com/playlist/{}", id) },
                    "tracks": self.page(kind, id, 0)?,
                }))
            }
            EntityKind::Track => self.tracks.get(id).cloned().ok_or_else(missing),
        }
    }

    fn mutate(&mut self, record: String) -> Result<()> {
        if self.reject_mutations {
            return Err(FsError::remote("HTTP 403 Forbidden"));
        }
        self.mutations.push(record);
        Ok(())
    }
}

fn kind_named(name: &str) -> Option<EntityKind> {
    [
        EntityKind::Artist,
        EntityKind::ArtistAlbums,
        EntityKind::Album,
        EntityKind::Playlist,
        EntityKind::Track,
        EntityKind::FollowedArtists,
        EntityKind::UserPlaylists,
        EntityKind::User,
        EntityKind::UserPublicPlaylists,
    ]
    .into_iter()
    .find(|kind| kind.as_str() == name)
}

/// In-memory catalog with call counting and failure injection.
#[derive(Debug, Default)]
pub struct FakeCatalog {
    state: Mutex<CatalogState>,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_artist(&self, id: &str, name: &str) {
        self.state.lock().artists.insert(id.into(), name.into());
    }

    pub fn add_artist_album(&self, artist_id: &str, album_id: &str) {
        self.state
            .lock()
            .artist_albums
            .entry(artist_id.into())
            .or_default()
            .push(album_id.into());
    }

    /// Registers the album and makes each of its tracks fetchable on its own.
    pub fn add_album(&self, id: &str, name: &str, tracks: Vec<Value>) {
        let mut state = self.state.lock();
        for track in &tracks {
            let Some(track_id) = track["id"].as_str() else {
                continue;
            };
            let mut full = track.clone();
            full["album"] = json!({
                "id": id,
                "name": name,
                "images": [{ "url": format!("https://img/{}", id) }],
            });
            state.tracks.insert(track_id.to_string(), full);
        }
        state.albums.insert(id.into(), (name.into(), tracks));
    }

    pub fn add_playlist(&self, id: &str, name: &str, track_ids: &[&str]) {
        self.state.lock().playlists.insert(
            id.into(),
            FakePlaylist {
                name: name.into(),
                items: track_ids.iter().map(|id| Some(id.to_string())).collect(),
            },
        );
    }

    pub fn insert_local_file(&self, playlist_id: &str, position: usize) {
        if let Some(playlist) = self.state.lock().playlists.get_mut(playlist_id) {
            playlist.items.insert(position, None);
        }
    }

    pub fn add_user(&self, id: &str, name: &str, playlist_ids: &[&str]) {
        self.state.lock().users.insert(
            id.into(),
            (name.into(), playlist_ids.iter().map(|id| id.to_string()).collect()),
        );
    }

    pub fn follow_artist(&self, id: &str) {
        self.state.lock().followed.push(id.into());
    }

    pub fn set_failing(&self, kind: EntityKind, id: &str, failing: bool) {
        let mut state = self.state.lock();
        if failing {
            state.failing.insert((kind, id.into()));
        } else {
            state.failing.remove(&(kind, id.to_string()));
        }
    }

    pub fn reject_mutations(&self, reject: bool) {
        self.state.lock().reject_mutations = reject;
    }

    /// Entity fetches so far, failed ones included.
    pub fn fetch_count(&self, kind: EntityKind, id: &str) -> usize {
        self.state
            .lock()
            .fetches
            .get(&(kind, id.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub fn search_count(&self) -> usize {
        self.state.lock().searches
    }

    pub fn mutations(&self) -> Vec<String> {
        self.state.lock().mutations.clone()
    }
}

#[async_trait]
impl CatalogFetcher for FakeCatalog {
    async fn fetch_entity(&self, kind: EntityKind, id: &str) -> Result<Value> {
        let mut state = self.state.lock();
        *state.fetches.entry((kind, id.to_string())).or_default() += 1;
        if state.failing.contains(&(kind, id.to_string())) {
            return Err(FsError::remote(format!("injected failure for {}:{}", kind, id)));
        }
        state.entity(kind, id)
    }

    async fn fetch_page(&self, cursor: &str) -> Result<Page> {
        let malformed = || FsError::remote(format!("bad cursor {}", cursor));
        let mut parts = cursor.split('|');
        let kind = parts.next().and_then(kind_named).ok_or_else(malformed)?;
        let id = parts.next().ok_or_else(malformed)?;
        let offset = parts
            .next()
            .and_then(|offset| offset.parse().ok())
            .ok_or_else(malformed)?;
        Page::from_value(&self.state.lock().page(kind, id, offset)?)
    }

    async fn search(&self, query: &str, kind: EntityKind) -> Result<Option<String>> {
        let mut state = self.state.lock();
        state.searches += 1;
        let matches = |name: &str| name.eq_ignore_ascii_case(query);
        Ok(match kind {
            EntityKind::Track => state
                .tracks
                .iter()
                .find(|(_, track)| track["name"].as_str().is_some_and(matches))
                .map(|(id, _)| id.clone()),
            EntityKind::Artist => state
                .artists
                .iter()
                .find(|(_, name)| matches(name.as_str()))
                .map(|(id, _)| id.clone()),
            _ => None,
        })
    }

    async fn fetch_blob(&self, url: &str) -> Result<Bytes> {
        if url.contains("broken") {
            return Err(FsError::remote(format!("HTTP 404 for {}", url)));
        }
        Ok(Bytes::from(format!("blob:{}", url)))
    }

    async fn follow(&self, artist_id: &str) -> Result<()> {
        let mut state = self.state.lock();
        if !state.artists.contains_key(artist_id) {
            return Err(FsError::not_found(artist_id));
        }
        state.mutate(format!("follow {}", artist_id))?;
        if !state.followed.iter().any(|id| id == artist_id) {
            state.followed.push(artist_id.into());
        }
        Ok(())
    }

    async fn unfollow(&self, artist_id: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.mutate(format!("unfollow {}", artist_id))?;
        state.followed.retain(|id| id != artist_id);
        Ok(())
    }

    async fn playlist_add(&self, playlist_id: &str, track_id: &str) -> Result<()> {
        let mut state = self.state.lock();
        if !state.tracks.contains_key(track_id) {
            return Err(FsError::not_found(track_id));
        }
        if !state.playlists.contains_key(playlist_id) {
            return Err(FsError::not_found(playlist_id));
        }
        state.mutate(format!("add {} {}", playlist_id, track_id))?;
        state.snapshot += 1;
        if let Some(playlist) = state.playlists.get_mut(playlist_id) {
            playlist.items.push(Some(track_id.into()));
        }
        Ok(())
    }

    async fn playlist_remove(
        &self,
        playlist_id: &str,
        track_id: &str,
        position: usize,
        snapshot_id: &str,
    ) -> Result<()> {
        let mut state = self.state.lock();
        let at_position = state
            .playlists
            .get(playlist_id)
            .ok_or_else(|| FsError::not_found(playlist_id))?
            .items
            .get(position)
            .cloned()
            .flatten();
        if at_position.as_deref() != Some(track_id) {
            return Err(FsError::remote(format!("{} is not at {}", track_id, position)));
        }
        state.mutate(format!(
            "remove {} {}@{} {}",
            playlist_id, track_id, position, snapshot_id
        ))?;
        state.snapshot += 1;
        if let Some(playlist) = state.playlists.get_mut(playlist_id) {
            playlist.items.remove(position);
        }
        Ok(())
    }

    async fn playlist_reorder(
        &self,
        playlist_id: &str,
        from_pos: usize,
        to_pos: usize,
        snapshot_id: &str,
    ) -> Result<()> {
        let mut state = self.state.lock();
        let len = state
            .playlists
            .get(playlist_id)
            .ok_or_else(|| FsError::not_found(playlist_id))?
            .items
            .len();
        if from_pos >= len {
            return Err(FsError::remote(format!("position {} out of range", from_pos)));
        }
        state.mutate(format!(
            "reorder {} {}->{} {}",
            playlist_id, from_pos, to_pos, snapshot_id
        ))?;
        state.snapshot += 1;
        if let Some(playlist) = state.playlists.get_mut(playlist_id) {
            let item = playlist.items.remove(from_pos);
            playlist.items.insert(to_pos.min(len - 1), item);
        }
        Ok(())
    }
}

/// A filesystem over a [`FakeCatalog`] and a [`FakeTransport`].
pub struct TestFs {
    pub fs: CatalogFs,
    pub ctx: Arc<FsContext>,
    pub catalog: Arc<FakeCatalog>,
    pub transport: Arc<FakeTransport>,
}

impl TestFs {
    pub fn new(catalog: FakeCatalog) -> Self {
        let catalog = Arc::new(catalog);
        let transport = Arc::new(FakeTransport::new());
        let fs = CatalogFs::new(
            test_config(),
            catalog.clone(),
            transport.clone(),
            Arc::new(ByteEncoder),
        );
        Self {
            ctx: fs.context().clone(),
            fs,
            catalog,
            transport,
        }
    }
}
