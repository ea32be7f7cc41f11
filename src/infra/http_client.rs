use crate::app::ports::{FetchedPayload, RemoteFetcher};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;

/// `RemoteFetcher` over a shared reqwest client with default timeouts.
#[derive(Clone, Default)]
pub struct ReqwestHttp {
    client: reqwest::Client,
}

impl ReqwestHttp {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RemoteFetcher for ReqwestHttp {
    async fn fetch(&self, url: &str) -> Result<FetchedPayload, String> {
        let resp = self.client.get(url).send().await.map_err(|e| e.to_string())?;
        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = resp.bytes().await.map_err(|e| e.to_string())?.to_vec();
        Ok(FetchedPayload { status, bytes, content_type })
    }
}
