//! # Tree Module
//!
//! The virtual directory tree. Directories are synthesized from catalog
//! content; every entity maps to one node, memoized in the
//! [`NodeRegistry`], so state attached to a node (an open stream, a built
//! index) is shared by every path that reaches it.
//!
//! ```text
//! /
//! ├── Artists/                       followed artists
//! │   └── <artist>/                  albums
//! │       └── <album>/               tracks, or "Disc N/" when multi-disc
//! │           └── 01 - <track>.mp3
//! ├── Playlists/                     the user's playlists
//! │   └── <playlist>/
//! │       └── 001 - <artists> - <track>.mp3
//! └── .id/                           hidden; every entity by id
//!     ├── track/<id>.{mp3,json,desktop}
//!     ├── album/<id>/
//!     ├── artist/<id>/
//!     ├── user/<id>/                 that user's public playlists
//!     └── playlist/<id>/
//! ```
//!
//! Artists, albums, playlists, users and tracks are listed as links into
//! `.id`, so each one lives at a single place however it was reached.
//!
//! Besides its children, each directory answers to a few synthetic files:
//! a JSON dump of its content, `cover.jpg` and a `.directory` link file.

pub mod dir;
pub mod file;
pub mod ids;
pub mod link;
pub mod mutate;
pub mod naming;
pub mod registry;
pub mod track;

use std::{fmt, sync::Arc};

pub use dir::{DirKind, DirNode, DirectoryIndex};
pub use file::StaticFile;
pub use ids::IdKind;
pub use link::LinkNode;
pub use mutate::ChildRef;
pub use registry::NodeRegistry;
pub use track::TrackFile;

/// Anything a path can resolve to.
#[derive(Clone)]
pub enum Node {
    Directory(Arc<DirNode>),
    /// Small file held in memory (dumps, covers, link files).
    File(Arc<StaticFile>),
    /// Streamed MP3.
    Track(Arc<TrackFile>),
    /// Link into `/.id`.
    Link(Arc<LinkNode>),
}

impl Node {
    /// Whether this is a directory itself. Links to directories are not.
    pub fn is_dir(&self) -> bool {
        matches!(self, Node::Directory(_))
    }

    pub fn is_link(&self) -> bool {
        matches!(self, Node::Link(_))
    }

    /// The node itself, or what it links to.
    pub fn followed(&self) -> &Node {
        let mut node = self;
        while let Node::Link(link) = node {
            node = link.node();
        }
        node
    }

    /// The directory this is or links to.
    pub fn as_dir(&self) -> Option<&Arc<DirNode>> {
        match self.followed() {
            Node::Directory(dir) => Some(dir),
            _ => None,
        }
    }

    /// The track this is or links to.
    pub fn as_track(&self) -> Option<&Arc<TrackFile>> {
        match self.followed() {
            Node::Track(track) => Some(track),
            _ => None,
        }
    }

    /// Identity comparison, through links.
    pub fn same_as(&self, other: &Node) -> bool {
        match (self.followed(), other.followed()) {
            (Node::Directory(a), Node::Directory(b)) => Arc::ptr_eq(a, b),
            (Node::File(a), Node::File(b)) => Arc::ptr_eq(a, b),
            (Node::Track(a), Node::Track(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Directory(dir) => write!(f, "Directory({})", dir.kind()),
            Node::File(file) => write!(f, "File({:?})", file.known_size()),
            Node::Track(track) => write!(f, "Track({})", track.track_id()),
            Node::Link(link) => write!(f, "Link({})", link.target()),
        }
    }
}
