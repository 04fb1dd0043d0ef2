use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;

use crate::types::{FetchedPage, SnapError};

/// The network half of a capture: one GET, no retries.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, SnapError>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(HttpFetcher { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, SnapError> {
        let res = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SnapError::Fetch(e.to_string()))?;

        let status = res.status().as_u16();
        let content_type = res
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let body = match res.bytes().await {
            Ok(b) => Some(b.to_vec()),
            Err(e) => {
                warn!("could not read body of {}: {}", url, e);
                None
            }
        };

        debug!("fetched {} with status {}", url, status);
        Ok(FetchedPage {
            status,
            content_type,
            body,
        })
    }
}
