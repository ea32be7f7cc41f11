use async_trait::async_trait;

/// Fetches a remote source table. Implemented over reqwest in production and
/// by canned fetchers in tests.
#[async_trait]
pub trait RemoteFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPayload, String>;
}

#[derive(Clone, Debug)]
pub struct FetchedPayload {
    pub status: u16,
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl FetchedPayload {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
