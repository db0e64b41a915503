//! Centralized logic for initializing http clients to
//! ensure uniform configuration.

use camino::Utf8Path;
use std::io::Write;

use crate::errors::BinfetchResult;

/// Settings for http clients
///
/// Any settings that should apply to all http requests should
/// be stored here, to avoid different configurations.
#[derive(Debug, Clone, Default)]
pub struct ClientSettings {}

impl ClientSettings {
    /// Create new ClientSettings using all necessary values
    pub fn new() -> Self {
        Self::default()
    }
}

/// Create the one reqwest client everything shares
///
/// Ideally this should be called only once and the client reused!
pub fn create_client(ClientSettings {}: &ClientSettings) -> BinfetchResult<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("binfetch/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Stream a URL to a local file
pub async fn download_to(
    client: &reqwest::Client,
    url: &str,
    dest: &Utf8Path,
) -> BinfetchResult<()> {
    let mut response = client.get(url).send().await?.error_for_status()?;
    let mut file = std::fs::File::create(dest)?;
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk)?;
    }
    Ok(())
}
