//! File and directory naming rules.
//!
//! Catalog names are free text, so they are sanitized before use: the path
//! separator becomes a look-alike character, and siblings that still collide
//! get a numbered suffix.

use regex::Regex;
use serde_json::Value;
use std::{collections::HashSet, sync::LazyLock};

/// Stand-in for `/` inside names (U+2215 DIVISION SLASH).
pub const SLASH_SUBSTITUTE: char = '\u{2215}';

pub const TRACK_EXTENSION: &str = ".mp3";

static POSITION_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)\s+-\s+(.*)$").expect("position prefix regex"));

pub fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| *c != '\0')
        .map(|c| if c == '/' { SLASH_SUBSTITUTE } else { c })
        .collect();

    match cleaned.as_str() {
        "" => "untitled".to_string(),
        "." | ".." => cleaned.replace('.', "\u{2024}"),
        _ => cleaned,
    }
}

/// Name of an entity object, falling back to its id.
pub fn entity_name(entity: &Value) -> String {
    let name = entity["name"]
        .as_str()
        .or_else(|| entity["display_name"].as_str())
        .filter(|name| !name.is_empty())
        .or_else(|| entity["id"].as_str())
        .unwrap_or_default();
    sanitize(name)
}

pub fn artist_names(track: &Value) -> Vec<String> {
    track["artists"]
        .as_array()
        .map(|artists| {
            artists
                .iter()
                .filter_map(|artist| artist["name"].as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// `"07 - Title.mp3"` when the album needs numbering, `"Title.mp3"` otherwise.
pub fn album_track_name(track: &Value, numbered: bool) -> String {
    let title = track["name"].as_str().unwrap_or_default();
    let name = if numbered {
        format!(
            "{:02} - {}{}",
            track["track_number"].as_u64().unwrap_or(0),
            title,
            TRACK_EXTENSION
        )
    } else {
        format!("{}{}", title, TRACK_EXTENSION)
    };
    sanitize(&name)
}

/// `"012 - Artist A, Artist B - Title.mp3"`; `position` is 1-based.
pub fn playlist_track_name(position: usize, track: &Value) -> String {
    let title = track["name"].as_str().unwrap_or_default();
    let artists = artist_names(track);
    let name = if artists.is_empty() {
        format!("{:03} - {}{}", position, title, TRACK_EXTENSION)
    } else {
        format!(
            "{:03} - {} - {}{}",
            position,
            artists.join(", "),
            title,
            TRACK_EXTENSION
        )
    };
    sanitize(&name)
}

pub fn disc_dir_name(disc: u64) -> String {
    format!("Disc {}", disc)
}

/// Splits a leading `"NNN - "` position off a name.
pub fn parse_position_prefix(name: &str) -> Option<(usize, &str)> {
    let captures = POSITION_PREFIX.captures(name)?;
    let position = captures.get(1)?.as_str().parse().ok()?;
    Some((position, captures.get(2)?.as_str()))
}

/// Turns a user-typed file name into a search query.
pub fn search_query(name: &str) -> String {
    let name = name.strip_suffix(TRACK_EXTENSION).unwrap_or(name);
    let name = parse_position_prefix(name).map_or(name, |(_, rest)| rest);
    name.replace(SLASH_SUBSTITUTE, "/").trim().to_string()
}

/// Hands out sibling names that are unique within one directory.
#[derive(Debug, Default)]
pub struct NameAllocator {
    taken: HashSet<String>,
}

impl NameAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `name`, or `"name (2)"`, `"name (3)"`... if it is taken. The
    /// suffix goes before a `.mp3` extension.
    pub fn claim(&mut self, name: String) -> String {
        if self.taken.insert(name.clone()) {
            return name;
        }

        let (stem, extension) = match name.strip_suffix(TRACK_EXTENSION) {
            Some(stem) => (stem, TRACK_EXTENSION),
            None => (name.as_str(), ""),
        };

        let mut counter = 2;
        loop {
            let candidate = format!("{} ({}){}", stem, counter, extension);
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
            counter += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sanitize_replaces_separator() {
        assert_eq!(sanitize("AC/DC"), "AC\u{2215}DC");
        assert_eq!(sanitize("a\0b"), "ab");
        assert_eq!(sanitize(""), "untitled");
        assert_eq!(sanitize(".."), "\u{2024}\u{2024}");
        assert_eq!(sanitize("Back in Black"), "Back in Black");
    }

    #[test]
    fn test_entity_names() {
        assert_eq!(entity_name(&json!({ "id": "ar1", "name": "Justice" })), "Justice");
        assert_eq!(entity_name(&json!({ "id": "u1", "display_name": "DJ/Mix" })), "DJ\u{2215}Mix");
        assert_eq!(entity_name(&json!({ "id": "pl1", "name": "" })), "pl1");
    }

    #[test]
    fn test_album_track_names() {
        let track = json!({ "name": "Intro / Outro", "track_number": 3 });
        assert_eq!(album_track_name(&track, true), "03 - Intro \u{2215} Outro.mp3");
        assert_eq!(album_track_name(&track, false), "Intro \u{2215} Outro.mp3");
    }

    #[test]
    fn test_playlist_track_names() {
        let track = json!({
            "name": "Song",
            "artists": [{ "name": "A" }, { "name": "B" }]
        });
        assert_eq!(playlist_track_name(7, &track), "007 - A, B - Song.mp3");

        let anonymous = json!({ "name": "Song", "artists": [] });
        assert_eq!(playlist_track_name(12, &anonymous), "012 - Song.mp3");
    }

    #[test]
    fn test_allocator_suffixes_collisions() {
        let mut names = NameAllocator::new();
        assert_eq!(names.claim("Live.mp3".to_string()), "Live.mp3");
        assert_eq!(names.claim("Live.mp3".to_string()), "Live (2).mp3");
        assert_eq!(names.claim("Live.mp3".to_string()), "Live (3).mp3");
        assert_eq!(names.claim("Greatest Hits".to_string()), "Greatest Hits");
        assert_eq!(names.claim("Greatest Hits".to_string()), "Greatest Hits (2)");
    }

    #[test]
    fn test_search_query_strips_decorations() {
        assert_eq!(search_query("004 - Daft Punk - One More Time.mp3"), "Daft Punk - One More Time");
        assert_eq!(search_query("One More Time"), "One More Time");
        assert_eq!(parse_position_prefix("12 - x"), Some((12, "x")));
        assert_eq!(parse_position_prefix("Song 2"), None);
    }
}
