//! Browse a remote music catalog as a filesystem.
//!
//! Followed artists, their albums and the user's playlists become a lazily
//! fetched directory tree; tracks become MP3 files that are streamed,
//! encoded and tagged on first read. [`fs::CatalogFs`] is the entry point
//! for a filesystem binding.

pub mod audio;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod container;
pub mod error;
pub mod fs;
pub mod sources;
pub mod tree;

#[cfg(test)]
mod testing;
