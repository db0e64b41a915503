//! Hashing every chosen download so the config can verify what it
//! fetches later.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::errors::BinfetchResult;

/// Something that can turn a URL into the hex digest of its content
#[async_trait]
pub trait UrlHasher {
    /// Fetch `url` and hash what comes back
    async fn url_checksum(&self, url: &str) -> BinfetchResult<String>;
}

/// The real thing: streams the download through SHA-256
pub struct HttpHasher {
    client: reqwest::Client,
}

impl HttpHasher {
    /// Hash over this client
    pub fn new(client: reqwest::Client) -> Self {
        HttpHasher { client }
    }
}

#[async_trait]
impl UrlHasher for HttpHasher {
    async fn url_checksum(&self, url: &str) -> BinfetchResult<String> {
        let mut response = self.client.get(url).send().await?.error_for_status()?;
        let mut hasher = Sha256::new();
        while let Some(chunk) = response.chunk().await? {
            hasher.update(&chunk);
        }
        Ok(hex::encode(hasher.finalize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{create_client, ClientSettings};
    use httpmock::prelude::*;

    #[tokio::test]
    async fn hashes_what_the_server_sends() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("GET").path("/tool.tar.gz");
                then.status(200).body("hello world");
            })
            .await;

        let hasher = HttpHasher::new(create_client(&ClientSettings::new()).unwrap());
        let digest = hasher
            .url_checksum(&format!("{}/tool.tar.gz", server.base_url()))
            .await
            .unwrap();
        assert_eq!(
            digest,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[tokio::test]
    async fn http_failures_abort_verbatim() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("GET").path("/gone.tar.gz");
                then.status(404);
            })
            .await;

        let hasher = HttpHasher::new(create_client(&ClientSettings::new()).unwrap());
        let err = hasher
            .url_checksum(&format!("{}/gone.tar.gz", server.base_url()))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::errors::BinfetchError::Http(_)));
    }
}
