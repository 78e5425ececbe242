use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Method, RequestBuilder};
use serde_json::{json, Value};
use tracing::{debug, error};

use crate::catalog::{CatalogFetcher, EntityKind, Page};
use crate::config::Config;
use crate::error::{FsError, Result};

/// Spotify Web API client.
///
/// Authenticates with a bearer token obtained elsewhere (the OAuth flow is
/// not part of this crate). Page cursors are the absolute `next` URLs the
/// API returns.
pub struct SpotifyClient {
    client: reqwest::Client,
    api_url: String,
    token: String,
    page_limit: u32,
}

impl SpotifyClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("spotifyfs/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.access_token.clone(),
            page_limit: config.page_limit,
        })
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client.request(method, url).bearer_auth(&self.token)
    }

    async fn get_json(&self, url: &str) -> Result<Value> {
        debug!("🔍 GET {}", url);
        let response = self.request(Method::GET, url).send().await?;
        let response = checked(response).await?;
        Ok(response.json().await?)
    }

    async fn send(&self, request: RequestBuilder) -> Result<()> {
        checked(request.send().await?).await?;
        Ok(())
    }

    fn endpoint(&self, kind: EntityKind, id: &str) -> String {
        let limit = self.page_limit;
        let path = match kind {
            EntityKind::Artist => format!("/artists/{}", id),
            EntityKind::ArtistAlbums => format!(
                "/artists/{}/albums?include_groups=album,single,compilation&limit={}",
                id, limit
            ),
            EntityKind::Album => format!("/albums/{}", id),
            EntityKind::Playlist => format!("/playlists/{}", id),
            EntityKind::Track => format!("/tracks/{}", id),
            EntityKind::FollowedArtists => format!("/me/following?type=artist&limit={}", limit),
            EntityKind::UserPlaylists => format!("/me/playlists?limit={}", limit),
            EntityKind::User => format!("/users/{}", id),
            EntityKind::UserPublicPlaylists => format!("/users/{}/playlists?limit={}", id, limit),
        };
        format!("{}{}", self.api_url, path)
    }

    fn following(&self, artist_id: &str) -> String {
        format!("{}/me/following?type=artist&ids={}", self.api_url, artist_id)
    }

    fn playlist_tracks(&self, playlist_id: &str) -> String {
        format!("{}/playlists/{}/tracks", self.api_url, playlist_id)
    }
}

/// Turns an unsuccessful response into an error carrying the API's message.
async fn checked(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|value| value["error"]["message"].as_str().map(str::to_string))
        .unwrap_or(body);
    error!("❌ Spotify API error: {} - {}", status, message);

    if status == reqwest::StatusCode::NOT_FOUND {
        Err(FsError::not_found(message))
    } else {
        Err(FsError::remote(format!("HTTP {}: {}", status, message)))
    }
}

fn track_uri(track_id: &str) -> String {
    format!("spotify:track:{}", track_id)
}

/// `insert_before` for moving the item at `from` so it ends up at `to`.
fn insert_before(from: usize, to: usize) -> usize {
    if to > from {
        to + 1
    } else {
        to
    }
}

/// Id of the top hit in a search response.
fn first_hit(response: &Value, kind: EntityKind) -> Option<String> {
    response[format!("{}s", kind.as_str())]["items"][0]["id"]
        .as_str()
        .map(str::to_string)
}

#[async_trait]
impl CatalogFetcher for SpotifyClient {
    async fn fetch_entity(&self, kind: EntityKind, id: &str) -> Result<Value> {
        self.get_json(&self.endpoint(kind, id)).await
    }

    async fn fetch_page(&self, cursor: &str) -> Result<Page> {
        Page::from_value(&self.get_json(cursor).await?)
    }

    async fn search(&self, query: &str, kind: EntityKind) -> Result<Option<String>> {
        let url = format!("{}/search", self.api_url);
        debug!("🔍 Searching {} for {:?}", kind, query);
        let response = self
            .request(Method::GET, &url)
            .query(&[("q", query), ("type", kind.as_str()), ("limit", "1")])
            .send()
            .await?;
        let found: Value = checked(response).await?.json().await?;
        Ok(first_hit(&found, kind))
    }

    async fn fetch_blob(&self, url: &str) -> Result<Bytes> {
        let response = self.client.get(url).send().await?;
        Ok(checked(response).await?.bytes().await?)
    }

    async fn follow(&self, artist_id: &str) -> Result<()> {
        self.send(self.request(Method::PUT, &self.following(artist_id)))
            .await
    }

    async fn unfollow(&self, artist_id: &str) -> Result<()> {
        self.send(self.request(Method::DELETE, &self.following(artist_id)))
            .await
    }

    async fn playlist_add(&self, playlist_id: &str, track_id: &str) -> Result<()> {
        let body = json!({ "uris": [track_uri(track_id)] });
        self.send(
            self.request(Method::POST, &self.playlist_tracks(playlist_id))
                .json(&body),
        )
        .await
    }

    async fn playlist_remove(
        &self,
        playlist_id: &str,
        track_id: &str,
        position: usize,
        snapshot_id: &str,
    ) -> Result<()> {
        let body = json!({
            "tracks": [{ "uri": track_uri(track_id), "positions": [position] }],
            "snapshot_id": snapshot_id,
        });
        self.send(
            self.request(Method::DELETE, &self.playlist_tracks(playlist_id))
                .json(&body),
        )
        .await
    }

    async fn playlist_reorder(
        &self,
        playlist_id: &str,
        from_pos: usize,
        to_pos: usize,
        snapshot_id: &str,
    ) -> Result<()> {
        let body = json!({
            "range_start": from_pos,
            "insert_before": insert_before(from_pos, to_pos),
            "snapshot_id": snapshot_id,
        });
        self.send(
            self.request(Method::PUT, &self.playlist_tracks(playlist_id))
                .json(&body),
        )
        .await
    }
}
