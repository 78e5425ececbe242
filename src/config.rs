use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Catalog
    pub access_token: String,
    pub api_url: String,
    pub page_limit: u32,
    pub request_timeout_secs: u64,

    // Cache
    pub cache_ttl_secs: u64,
    pub cache_capacity: usize,

    // Streaming
    pub target_bitrate_kbps: u32,
    pub id3_header_size: usize,
    pub pcm_queue_depth: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Catalog
            access_token: std::env::var("SPOTIFY_ACCESS_TOKEN").unwrap_or_default(),
            api_url: std::env::var("SPOTIFY_API_URL")
                .unwrap_or_else(|_| "https://api.spotify.com/v1".to_string()),
            page_limit: std::env::var("PAGE_LIMIT")
                .unwrap_or_else(|_| "50".to_string())
                .parse()?,
            request_timeout_secs: std::env::var("REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,

            // Cache
            cache_ttl_secs: std::env::var("CACHE_TTL_SECS")
                .unwrap_or_else(|_| "3600".to_string()) // 1 hora
                .parse()?,
            cache_capacity: std::env::var("CACHE_CAPACITY")
                .unwrap_or_else(|_| "65536".to_string())
                .parse()?,

            // Streaming
            target_bitrate_kbps: std::env::var("TARGET_BITRATE_KBPS")
                .unwrap_or_else(|_| "320".to_string())
                .parse()?,
            id3_header_size: std::env::var("ID3_HEADER_SIZE")
                .unwrap_or_else(|_| "262144".to_string()) // 256 KiB
                .parse()?,
            pcm_queue_depth: std::env::var("PCM_QUEUE_DEPTH")
                .unwrap_or_else(|_| "64".to_string())
                .parse()?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - API URL must parse as an absolute http(s) URL
    /// - Page limit must be within 1..=50 (Web API maximum)
    /// - Target bitrate must be within 32..=320 kbps (MPEG-1 Layer III)
    /// - ID3 header must leave room for the text frames (>= 4 KiB) and fit
    ///   the 28-bit syncsafe size field
    /// - Cache capacity, TTL and queue depth must be > 0
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.api_url)
            .map_err(|e| anyhow::anyhow!("Invalid SPOTIFY_API_URL {:?}: {}", self.api_url, e))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            anyhow::bail!("SPOTIFY_API_URL must be http(s), got: {}", url.scheme());
        }

        if self.page_limit == 0 || self.page_limit > 50 {
            anyhow::bail!("Page limit must be between 1 and 50, got: {}", self.page_limit);
        }

        if !(32..=320).contains(&self.target_bitrate_kbps) {
            anyhow::bail!(
                "Target bitrate must be between 32 and 320 kbps, got: {}",
                self.target_bitrate_kbps
            );
        }

        if self.id3_header_size < 4096 {
            anyhow::bail!("ID3 header size too small, minimum 4096, got: {}", self.id3_header_size);
        }

        if self.id3_header_size > (1 << 28) {
            anyhow::bail!("ID3 header size cannot exceed 256 MiB, got: {}", self.id3_header_size);
        }

        if self.cache_capacity == 0 {
            anyhow::bail!("Cache capacity must be greater than 0");
        }

        if self.cache_ttl_secs == 0 {
            anyhow::bail!("Cache TTL must be greater than 0");
        }

        if self.pcm_queue_depth == 0 {
            anyhow::bail!("PCM queue depth must be greater than 0");
        }

        if self.request_timeout_secs == 0 {
            anyhow::bail!("Request timeout must be greater than 0");
        }

        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// The access token is never included.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Catalog: {} (page limit {}, timeout {}s, token {})\n  \
            Cache: {} entries, TTL {}s\n  \
            Streaming: {}kbps, {} byte ID3 header, PCM queue {}",
            self.api_url,
            self.page_limit,
            self.request_timeout_secs,
            if self.access_token.is_empty() { "missing" } else { "set" },
            self.cache_capacity,
            self.cache_ttl_secs,
            self.target_bitrate_kbps,
            self.id3_header_size,
            self.pcm_queue_depth,
        )
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Catalog (no token default - must be provided)
            access_token: String::new(),
            api_url: "https://api.spotify.com/v1".to_string(),
            page_limit: 50,
            request_timeout_secs: 30,

            // Cache defaults
            cache_ttl_secs: 3600, // 1 hour
            cache_capacity: 64 * 1024,

            // Streaming defaults
            target_bitrate_kbps: 320,
            id3_header_size: 256 * 1024,
            pcm_queue_depth: 64,
        }
    }
}
