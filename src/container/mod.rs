//! # Container Module
//!
//! Turns a bare MP3 payload into a self-contained file by wrapping it in tag
//! blocks: an ID3v2.4 header of fixed size in front, an ID3v1.1 trailer at
//! the end.

pub mod framer;
pub mod id3;
pub mod tags;

pub use framer::{ContainerFramer, PayloadSource};
pub use tags::{TagSource, TrackTags};
