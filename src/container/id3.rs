//! ID3 tag serialization.
//!
//! The leading block is an ID3v2.4 tag padded with zeros to a fixed size, so
//! the payload offset of a track file never depends on its metadata. The
//! trailing block is a 128-byte ID3v1.1 tag.

use bytes::{BufMut, Bytes, BytesMut};

use super::TrackTags;

pub const V1_TAG_LEN: usize = 128;
const V2_HEADER_LEN: usize = 10;
const FRAME_HEADER_LEN: usize = 10;
const UTF8: u8 = 0x03;
const PICTURE_FRONT_COVER: u8 = 0x03;

/// 28-bit syncsafe integer (7 bits per byte).
pub fn syncsafe(value: u32) -> [u8; 4] {
    [
        ((value >> 21) & 0x7f) as u8,
        ((value >> 14) & 0x7f) as u8,
        ((value >> 7) & 0x7f) as u8,
        (value & 0x7f) as u8,
    ]
}

fn frame(id: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(FRAME_HEADER_LEN + body.len());
    out.extend_from_slice(id);
    out.extend_from_slice(&syncsafe(body.len() as u32));
    out.extend_from_slice(&[0, 0]);
    out.extend_from_slice(body);
    out
}

fn text_frame(id: &[u8; 4], text: &str) -> Option<Vec<u8>> {
    if text.is_empty() {
        return None;
    }
    let mut body = Vec::with_capacity(1 + text.len());
    body.push(UTF8);
    body.extend_from_slice(text.as_bytes());
    Some(frame(id, &body))
}

fn comment_frame(text: &str) -> Vec<u8> {
    let mut body = Vec::with_capacity(5 + text.len());
    body.push(UTF8);
    body.extend_from_slice(b"eng");
    body.push(0); // empty description
    body.extend_from_slice(text.as_bytes());
    frame(b"COMM", &body)
}

fn picture_frame(image: &[u8]) -> Vec<u8> {
    let mime = if image.starts_with(b"\x89PNG") {
        &b"image/png"[..]
    } else {
        &b"image/jpeg"[..]
    };
    let mut body = Vec::with_capacity(image.len() + mime.len() + 4);
    body.push(UTF8);
    body.extend_from_slice(mime);
    body.push(0);
    body.push(PICTURE_FRONT_COVER);
    body.push(0); // empty description
    body.extend_from_slice(image);
    frame(b"APIC", &body)
}

fn numbered(number: Option<u32>, total: Option<u32>) -> String {
    match (number, total) {
        (Some(n), Some(t)) => format!("{}/{}", n, t),
        (Some(n), None) => n.to_string(),
        _ => String::new(),
    }
}

/// ID3v2.4 tag of exactly `size` bytes.
///
/// Frames that would overflow `size` are left out; the cover picture goes
/// last and is the first to be dropped.
pub fn encode_v2(tags: &TrackTags, size: usize) -> Bytes {
    let mut frames: Vec<Vec<u8>> = [
        text_frame(b"TIT2", &tags.title),
        text_frame(b"TPE1", &tags.artist_line()),
        text_frame(b"TPE2", &tags.album_artists.join(", ")),
        text_frame(b"TALB", &tags.album),
        text_frame(b"TRCK", &numbered(tags.track_number, tags.track_total)),
        text_frame(b"TPOS", &numbered(tags.disc_number, tags.disc_total)),
        tags.release_date.as_deref().and_then(|d| text_frame(b"TDRC", d)),
        tags.duration_ms.and_then(|ms| text_frame(b"TLEN", &ms.to_string())),
        tags.url.as_deref().map(comment_frame),
    ]
    .into_iter()
    .flatten()
    .collect();
    if let Some(cover) = &tags.cover {
        frames.push(picture_frame(cover));
    }

    let size = size.max(V2_HEADER_LEN);
    let mut out = BytesMut::with_capacity(size);
    out.put_slice(b"ID3");
    out.put_slice(&[4, 0, 0]);
    out.put_slice(&syncsafe((size - V2_HEADER_LEN) as u32));

    for frame in frames {
        if out.len() + frame.len() <= size {
            out.put_slice(&frame);
        }
    }
    out.resize(size, 0);
    out.freeze()
}

fn latin1_field(out: &mut BytesMut, text: &str, width: usize) {
    let mut field: Vec<u8> = text
        .chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .take(width)
        .collect();
    field.resize(width, 0);
    out.put_slice(&field);
}

/// 128-byte ID3v1.1 tag.
pub fn encode_v1(tags: &TrackTags) -> Bytes {
    let mut out = BytesMut::with_capacity(V1_TAG_LEN);
    out.put_slice(b"TAG");
    latin1_field(&mut out, &tags.title, 30);
    latin1_field(&mut out, &tags.artist_line(), 30);
    latin1_field(&mut out, &tags.album, 30);
    latin1_field(
        &mut out,
        &tags.year().map(|y| y.to_string()).unwrap_or_default(),
        4,
    );
    latin1_field(&mut out, tags.url.as_deref().unwrap_or_default(), 28);
    out.put_u8(0);
    out.put_u8(tags.track_number.and_then(|n| u8::try_from(n).ok()).unwrap_or(0));
    out.put_u8(255); // no genre
    out.freeze()
}
