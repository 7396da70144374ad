use async_trait::async_trait;
use keeper_http::{HttpClient, HttpError};
use thiserror::Error;

/// Referer sent with image requests; the image host rejects hotlinks without it.
pub const IMAGE_REFERER: &str = "https://mp.weixin.qq.com/";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Http(#[from] HttpError),
    #[error("{0}")]
    Other(String),
}

/// Source of article page markup.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, url: &str) -> Result<String, FetchError>;
}

/// Source of raw image bytes.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    async fn fetch_asset(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Both fetchers backed by one pooled [`HttpClient`].
#[derive(Clone)]
pub struct HttpFetcher {
    client: HttpClient,
}

impl HttpFetcher {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
        tracing::debug!(%url, "archive.fetch.page");
        Ok(self.client.get_text(url).await?)
    }
}

#[async_trait]
impl AssetFetcher for HttpFetcher {
    async fn fetch_asset(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        Ok(self.client.get_bytes(url, Some(IMAGE_REFERER)).await?)
    }
}
