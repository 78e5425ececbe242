use async_trait::async_trait;
use bytes::Bytes;
use chrono::{Datelike, NaiveDate};
use serde_json::Value;

use crate::error::Result;

/// Metadata written into a track's tag blocks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackTags {
    pub title: String,
    pub artists: Vec<String>,
    pub album: String,
    pub album_artists: Vec<String>,
    pub track_number: Option<u32>,
    pub track_total: Option<u32>,
    pub disc_number: Option<u32>,
    pub disc_total: Option<u32>,
    /// As published: `YYYY`, `YYYY-MM` or `YYYY-MM-DD`.
    pub release_date: Option<String>,
    pub duration_ms: Option<u64>,
    pub url: Option<String>,
    /// Front cover, JPEG.
    pub cover: Option<Bytes>,
}

impl TrackTags {
    /// Builds tags from a track object and, if known, its album with the full
    /// track list (used for the disc count).
    pub fn from_catalog(track: &Value, album: Option<&Value>) -> Self {
        let album = album.unwrap_or(&track["album"]);

        let disc_total = album["tracks"].as_array().and_then(|tracks| {
            tracks
                .iter()
                .filter_map(|t| t["disc_number"].as_u64())
                .max()
                .map(|max| max as u32)
        });

        Self {
            title: text(&track["name"]),
            artists: names(&track["artists"]),
            album: text(&album["name"]),
            album_artists: names(&album["artists"]),
            track_number: number(&track["track_number"]),
            track_total: number(&album["total_tracks"]),
            disc_number: number(&track["disc_number"]),
            disc_total,
            release_date: album["release_date"]
                .as_str()
                .filter(|date| !date.is_empty())
                .map(str::to_string),
            duration_ms: track["duration_ms"].as_u64(),
            url: track["external_urls"]["spotify"].as_str().map(str::to_string),
            cover: None,
        }
    }

    pub fn with_cover(mut self, cover: Option<Bytes>) -> Self {
        self.cover = cover;
        self
    }

    pub fn year(&self) -> Option<i32> {
        let date = self.release_date.as_deref()?;
        NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map(|d| d.year())
            .ok()
            .or_else(|| date.get(..4)?.parse().ok())
    }

    pub fn artist_line(&self) -> String {
        self.artists.join(", ")
    }
}

/// Where the framer gets a track's metadata from.
#[async_trait]
pub trait TagSource: Send + Sync {
    async fn track_tags(&self, track_id: &str) -> Result<TrackTags>;
}

fn text(value: &Value) -> String {
    value.as_str().unwrap_or_default().to_string()
}

fn number(value: &Value) -> Option<u32> {
    value.as_u64().and_then(|n| u32::try_from(n).ok()).filter(|n| *n > 0)
}

fn names(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item["name"].as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
