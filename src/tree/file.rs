use bytes::Bytes;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::catalog::CatalogFetcher;

/// 1×1 transparent PNG served when an entity has no usable cover.
pub const DEFAULT_COVER: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f, 0x15, 0xc4,
    0x89, 0x00, 0x00, 0x00, 0x0a, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9c, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0d, 0x0a, 0x2d, 0xb4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4e, 0x44, 0xae,
    0x42, 0x60, 0x82,
];

/// A small file whose bytes live in memory.
///
/// Either known up front, or downloaded on first access with a fallback
/// when there is no URL or the download fails. Failures are not retried for
/// the life of the node; the owning directory index is rebuilt on expiry.
#[derive(Debug)]
pub struct StaticFile {
    url: Option<String>,
    fallback: Bytes,
    data: OnceCell<Bytes>,
}

impl StaticFile {
    pub fn inline(bytes: impl Into<Bytes>) -> Self {
        Self {
            url: None,
            fallback: Bytes::new(),
            data: OnceCell::new_with(Some(bytes.into())),
        }
    }

    pub fn remote(url: Option<String>, fallback: Bytes) -> Self {
        Self {
            url,
            fallback,
            data: OnceCell::new(),
        }
    }

    pub fn cover(url: Option<String>) -> Self {
        Self::remote(url, Bytes::from_static(DEFAULT_COVER))
    }

    pub fn known_size(&self) -> Option<u64> {
        self.data.get().map(|data| data.len() as u64)
    }

    pub async fn contents(&self, fetcher: &dyn CatalogFetcher) -> Bytes {
        self.data
            .get_or_init(|| async {
                let Some(url) = &self.url else {
                    return self.fallback.clone();
                };
                match fetcher.fetch_blob(url).await {
                    Ok(bytes) => {
                        debug!("Fetched {} ({} bytes)", url, bytes.len());
                        bytes
                    }
                    Err(e) => {
                        warn!("⚠️ Using fallback for {}: {}", url, e);
                        self.fallback.clone()
                    }
                }
            })
            .await
            .clone()
    }

    pub async fn size(&self, fetcher: &dyn CatalogFetcher) -> u64 {
        self.contents(fetcher).await.len() as u64
    }

    pub async fn read(&self, fetcher: &dyn CatalogFetcher, offset: u64, len: usize) -> Bytes {
        let data = self.contents(fetcher).await;
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(data.len());
        let end = start.saturating_add(len).min(data.len());
        data.slice(start..end)
    }
}

/// `.directory` desktop-entry link for a directory.
pub fn desktop_entry(name: &str, url: &str) -> String {
    format!(
        "[Desktop Entry]\nEncoding=UTF-8\nName={}\nType=Link\nURL={}\nIcon=text-html\n",
        name, url
    )
}
