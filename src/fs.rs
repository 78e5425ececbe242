//! # Filesystem Root
//!
//! [`CatalogFs`] is what a filesystem binding (FUSE or otherwise) talks to.
//! It owns the shared [`FsContext`] and maps the binding's calls onto the
//! tree: lookups and listings go through directory indexes, reads through
//! static files or track stream handles, and the mutating calls through the
//! directory mutations.
//!
//! | Binding call | Tree operation |
//! |---|---|
//! | `mkdir` | follow an artist (`/Artists` only) |
//! | `mknod` | add a track to a playlist |
//! | `link` | add an existing node to a playlist or `/Artists` |
//! | `unlink` | remove a playlist track or unfollow an artist |
//! | `rename` | reorder a playlist track |
//!
//! Listed entities are links into `/.id`. [`CatalogFs::lookup`] hands them
//! out as links; [`CatalogFs::resolve`] and [`CatalogFs::open`] follow them.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::{sync::Arc, time::Duration};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::audio::{EncoderFactory, PlaybackEngine, PlaybackTransport, ReadMode, TrackFileHandle};
use crate::cache::{CacheMetrics, ContentCache};
use crate::catalog::{content, CacheKey, CatalogFetcher, EntityKind};
use crate::config::Config;
use crate::container::{TagSource, TrackTags};
use crate::error::{FsError, Result};
use crate::tree::{ChildRef, DirKind, DirNode, Node, NodeRegistry};

/// State shared by every node of one mounted filesystem.
pub struct FsContext {
    pub config: Config,
    pub cache: ContentCache,
    pub fetcher: Arc<dyn CatalogFetcher>,
    pub registry: NodeRegistry,
    pub engine: Arc<PlaybackEngine>,
    pub mounted_at: DateTime<Utc>,
}

impl FsContext {
    pub fn new(config: Config, fetcher: Arc<dyn CatalogFetcher>, engine: Arc<PlaybackEngine>) -> Self {
        Self {
            cache: ContentCache::new(config.cache_capacity, config.cache_ttl()),
            config,
            fetcher,
            registry: NodeRegistry::new(),
            engine,
            mounted_at: Utc::now(),
        }
    }

    pub(crate) async fn cached_track(&self, track_id: &str) -> Result<Arc<serde_json::Value>> {
        let fetcher = self.fetcher.as_ref();
        self.cache
            .get_or_fetch(CacheKey::new(EntityKind::Track, track_id), || async {
                Ok::<_, FsError>(Arc::new(fetcher.fetch_entity(EntityKind::Track, track_id).await?))
            })
            .await
    }

    async fn cached_album(&self, album_id: &str) -> Result<Arc<serde_json::Value>> {
        let fetcher = self.fetcher.as_ref();
        self.cache
            .get_or_fetch(CacheKey::new(EntityKind::Album, album_id), || async {
                Ok::<_, FsError>(Arc::new(content::fetch_album(fetcher, album_id).await?))
            })
            .await
    }
}

/// Track metadata comes from the same cache entries the directories use, so
/// tagging a track found through its album costs no extra fetch.
#[async_trait]
impl TagSource for FsContext {
    async fn track_tags(&self, track_id: &str) -> Result<TrackTags> {
        let track = self.cached_track(track_id).await?;

        let album = match track["album"]["id"].as_str() {
            Some(album_id) => match self.cached_album(album_id).await {
                Ok(album) => Some(album),
                Err(e) => {
                    warn!("⚠️ Tagging {} without album details: {}", track_id, e);
                    None
                }
            },
            None => None,
        };
        let album_value = album.as_deref().unwrap_or(&track["album"]);

        let cover = match album_value["images"][0]["url"].as_str() {
            Some(url) => match self.fetcher.fetch_blob(url).await {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    warn!("⚠️ No cover for {}: {}", track_id, e);
                    None
                }
            },
            None => None,
        };

        Ok(TrackTags::from_catalog(&track, Some(album_value)).with_cover(cover))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Directory,
    RegularFile,
    Symlink,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAttr {
    pub kind: FileType,
    pub size: u64,
    pub perm: u16,
    pub nlink: u32,
    pub mtime: DateTime<Utc>,
}

/// An open file. Track files carry the shared stream handle.
#[derive(Debug)]
pub struct FileHandle {
    node: Node,
    stream: Option<Arc<TrackFileHandle>>,
}

impl FileHandle {
    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn stream(&self) -> Option<&Arc<TrackFileHandle>> {
        self.stream.as_ref()
    }
}

fn dir_of(node: &Node) -> Result<&Arc<DirNode>> {
    node.as_dir()
        .ok_or_else(|| FsError::not_found(format!("{:?} is not a directory", node)))
}

/// The mounted catalog.
pub struct CatalogFs {
    ctx: Arc<FsContext>,
}

impl CatalogFs {
    pub fn new(
        config: Config,
        fetcher: Arc<dyn CatalogFetcher>,
        transport: Arc<dyn PlaybackTransport>,
        encoders: Arc<dyn EncoderFactory>,
    ) -> Self {
        let engine = Arc::new(PlaybackEngine::new(transport, encoders, &config));
        Self::with_context(Arc::new(FsContext::new(config, fetcher, engine)))
    }

    pub fn with_context(ctx: Arc<FsContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Arc<FsContext> {
        &self.ctx
    }

    pub fn root(&self) -> Node {
        Node::Directory(self.ctx.registry.root())
    }

    pub async fn lookup(&self, parent: &Node, name: &str) -> Result<Node> {
        dir_of(parent)?.lookup(&self.ctx, name).await
    }

    /// Walks an absolute path from the root, following links.
    pub async fn resolve(&self, path: &str) -> Result<Node> {
        let mut node = self.root();
        for name in path.split('/').filter(|part| !part.is_empty()) {
            node = self.lookup(&node, name).await?.followed().clone();
        }
        Ok(node)
    }

    pub fn readlink(&self, node: &Node) -> Result<String> {
        match node {
            Node::Link(link) => Ok(link.target().to_string()),
            _ => Err(FsError::unsupported(format!("{:?} is not a link", node))),
        }
    }

    pub async fn getattr(&self, node: &Node) -> Result<FileAttr> {
        let (kind, size, perm, nlink) = match node {
            Node::Directory(_) => (FileType::Directory, 0, 0o755, 2),
            Node::File(file) => (
                FileType::RegularFile,
                file.size(self.ctx.fetcher.as_ref()).await,
                0o444,
                1,
            ),
            Node::Track(track) => (
                FileType::RegularFile,
                track.size(self.ctx.engine.header_size()),
                0o444,
                1,
            ),
            Node::Link(link) => (FileType::Symlink, link.target().len() as u64, 0o777, 1),
        };
        Ok(FileAttr {
            kind,
            size,
            perm,
            nlink,
            mtime: self.ctx.mounted_at,
        })
    }

    /// Every entry of a directory with its attributes.
    pub async fn readdir(&self, dir: &Node) -> Result<Vec<(String, FileAttr)>> {
        let entries = dir_of(dir)?.list(&self.ctx).await?;
        let attrs =
            futures::future::try_join_all(entries.iter().map(|(_, node)| self.getattr(node))).await?;
        Ok(entries
            .into_iter()
            .map(|(name, _)| name)
            .zip(attrs)
            .collect())
    }

    pub fn open(&self, node: &Node) -> Result<FileHandle> {
        let node = node.followed();
        let stream = match node {
            Node::Directory(dir) => {
                return Err(FsError::unsupported(format!("{} is a directory", dir.kind())))
            }
            Node::File(_) => None,
            Node::Track(track) => Some(track.open(&self.ctx.engine)),
            Node::Link(_) => None,
        };
        Ok(FileHandle {
            node: node.clone(),
            stream,
        })
    }

    /// Reads without short reads: only the end of the file returns fewer
    /// bytes than asked for.
    pub async fn read(&self, handle: &FileHandle, offset: u64, len: usize) -> Result<Bytes> {
        self.read_with_mode(handle, offset, len, ReadMode::Full).await
    }

    pub async fn read_with_mode(
        &self,
        handle: &FileHandle,
        offset: u64,
        len: usize,
        mode: ReadMode,
    ) -> Result<Bytes> {
        match (&handle.node, &handle.stream) {
            (Node::File(file), _) => Ok(file.read(self.ctx.fetcher.as_ref(), offset, len).await),
            (Node::Track(_), Some(stream)) => {
                stream.read(self.ctx.as_ref(), offset, len, mode).await
            }
            _ => Err(FsError::not_found("handle has no readable file")),
        }
    }

    pub fn release(&self, handle: FileHandle) -> Result<()> {
        match (&handle.node, &handle.stream) {
            (Node::Track(track), Some(stream)) => track.release(stream),
            _ => Ok(()),
        }
    }

    /// Follows the artist named `name`.
    pub async fn mkdir(&self, parent: &Node, name: &str) -> Result<()> {
        let dir = dir_of(parent)?;
        if *dir.kind() != DirKind::FollowedArtists {
            return Err(FsError::unsupported(format!("cannot create directories in {}", dir.kind())));
        }
        dir.add_child(&self.ctx, ChildRef::Name(name)).await
    }

    /// Adds the track best matching `name` to a playlist.
    pub async fn mknod(&self, parent: &Node, name: &str) -> Result<()> {
        let dir = dir_of(parent)?;
        if !matches!(dir.kind(), DirKind::Playlist(_)) {
            return Err(FsError::unsupported(format!("cannot create files in {}", dir.kind())));
        }
        dir.add_child(&self.ctx, ChildRef::Name(name)).await
    }

    /// Adds an existing node. The new name is decided by the catalog, so
    /// `name` is only logged.
    pub async fn link(&self, node: &Node, parent: &Node, name: &str) -> Result<()> {
        debug!("Linking {:?} as {}", node, name);
        dir_of(parent)?.add_child(&self.ctx, ChildRef::Node(node)).await
    }

    pub async fn unlink(&self, parent: &Node, name: &str) -> Result<()> {
        let dir = dir_of(parent)?;
        if dir.lookup(&self.ctx, name).await?.is_dir() {
            return Err(FsError::unsupported(format!("{} is a directory", name)));
        }
        dir.remove_child(&self.ctx, name).await
    }

    pub async fn rmdir(&self, parent: &Node, name: &str) -> Result<()> {
        let dir = dir_of(parent)?;
        if !dir.lookup(&self.ctx, name).await?.is_dir() {
            return Err(FsError::unsupported(format!("{} is not a directory", name)));
        }
        dir.remove_child(&self.ctx, name).await
    }

    pub async fn rename(
        &self,
        parent: &Node,
        old: &str,
        new_parent: &Node,
        new: &str,
    ) -> Result<()> {
        if !parent.same_as(new_parent) {
            return Err(FsError::unsupported("cannot move entries between directories"));
        }
        dir_of(parent)?.rename_child(&self.ctx, old, new).await
    }

    pub fn cache_metrics(&self) -> CacheMetrics {
        self.ctx.cache.metrics()
    }

    /// Periodically drops expired cache entries, and the nodes nothing
    /// refers to any more, until the task is aborted.
    pub fn spawn_cache_sweeper(&self, every: Duration) -> JoinHandle<()> {
        let ctx = self.ctx.clone();
        info!("🧹 Sweeping the content cache every {:?}", every);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.tick().await;
            loop {
                interval.tick().await;
                ctx.cache.cleanup_old_entries();
                ctx.registry.prune();
            }
        })
    }
}
