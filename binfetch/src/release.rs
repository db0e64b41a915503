//! Fetching release metadata from GitHub Releases.

use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::{BinfetchError, BinfetchResult};

const DEFAULT_API_BASE: &str = "https://api.github.com";

/// What a release page gave us: every asset URL plus the metadata the
/// config wants to carry.
#[derive(Debug, Clone)]
pub struct ReleaseQuery {
    /// Download URL of every asset on the release
    pub urls: Vec<String>,
    /// The canonical version (tag with any `v` prefix normalized away)
    pub version: String,
    /// The project homepage, falling back to the repo page
    pub homepage: Option<String>,
    /// The repo description
    pub description: Option<String>,
}

/// A struct representing a GitHub repository
#[derive(Clone, Debug, Deserialize, Serialize)]
struct GithubRepo {
    description: Option<String>,
    homepage: Option<String>,
    html_url: String,
}

/// A struct representing a specific GitHub Release
#[derive(Clone, Debug, Deserialize, Serialize)]
struct GithubRelease {
    tag_name: String,
    assets: Vec<GithubAsset>,
}

/// Represents a specific asset inside a GitHub Release.
#[derive(Clone, Debug, Deserialize, Serialize)]
struct GithubAsset {
    browser_download_url: String,
    name: String,
}

/// A client for the GitHub REST API
pub struct GithubClient {
    client: reqwest::Client,
    api_base: String,
    token: Option<String>,
}

impl GithubClient {
    /// A client against api.github.com
    pub fn new(client: reqwest::Client, token: Option<String>) -> Self {
        Self::with_api_base(client, token, DEFAULT_API_BASE)
    }

    /// A client against some other API base (GHE, tests)
    pub fn with_api_base(
        client: reqwest::Client,
        token: Option<String>,
        api_base: impl Into<String>,
    ) -> Self {
        GithubClient {
            client,
            api_base: api_base.into(),
            token,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: String) -> BinfetchResult<T> {
        let url = url::Url::parse(&url)?;
        let mut request = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .header("X-GitHub-Api-Version", "2022-11-28");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        Ok(request
            .send()
            .await?
            .error_for_status()?
            .json::<T>()
            .await?)
    }

    /// Look up `org/name`'s release (`latest` when `tag` is unset) and
    /// collect its asset URLs plus the repo metadata.
    pub async fn query_release(
        &self,
        repo: &str,
        tag: Option<&str>,
    ) -> BinfetchResult<ReleaseQuery> {
        let (org, name) = repo
            .split_once('/')
            .filter(|(org, name)| !org.is_empty() && !name.is_empty() && !name.contains('/'))
            .ok_or_else(|| BinfetchError::MalformedRepo {
                repo: repo.to_owned(),
            })?;

        let repo_info: GithubRepo = self
            .get_json(format!("{}/repos/{org}/{name}", self.api_base))
            .await?;

        let release: GithubRelease = match tag {
            Some(tag) if !tag.is_empty() => {
                self.get_json(format!(
                    "{}/repos/{org}/{name}/releases/tags/{tag}",
                    self.api_base
                ))
                .await?
            }
            _ => {
                self.get_json(format!(
                    "{}/repos/{org}/{name}/releases/latest",
                    self.api_base
                ))
                .await?
            }
        };

        let urls: Vec<String> = release
            .assets
            .iter()
            .map(|asset| asset.browser_download_url.clone())
            .collect();
        if urls.is_empty() {
            return Err(BinfetchError::ReleaseHasNoAssets {
                repo: repo.to_owned(),
                tag: tag.unwrap_or("latest").to_owned(),
            });
        }
        let version = normalize_version(&release.tag_name);
        info!(
            "release {} of {repo} has {} assets",
            release.tag_name,
            urls.len()
        );

        let homepage = match repo_info.homepage {
            Some(h) if !h.is_empty() => Some(h),
            _ => Some(repo_info.html_url),
        };
        Ok(ReleaseQuery {
            urls,
            version,
            homepage,
            description: repo_info.description,
        })
    }
}

/// Strip a leading `v` from the tag when what's left parses as a
/// semantic version; tags like `version2` keep their spelling.
fn normalize_version(tag: &str) -> String {
    if let Some(rest) = tag.strip_prefix('v') {
        if semver::Version::parse(rest).is_ok() {
            return rest.to_owned();
        }
    }
    tag.to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{create_client, ClientSettings};
    use httpmock::prelude::*;
    use serde_json::json;

    #[test]
    fn version_normalization_needs_a_real_semver() {
        assert_eq!(normalize_version("v1.2.3"), "1.2.3");
        assert_eq!(normalize_version("1.2.3"), "1.2.3");
        assert_eq!(normalize_version("v1.2"), "v1.2");
        assert_eq!(normalize_version("version2"), "version2");
        assert_eq!(normalize_version("v2.0.0-rc.1"), "2.0.0-rc.1");
    }

    fn repo_body() -> serde_json::Value {
        json!({
            "description": "a tool",
            "homepage": "",
            "html_url": "https://github.com/org/tool",
        })
    }

    fn release_body() -> serde_json::Value {
        json!({
            "tag_name": "v1.2.3",
            "assets": [
                {"browser_download_url": "https://dl.example/tool_linux_amd64.tar.gz", "name": "tool_linux_amd64.tar.gz"},
                {"browser_download_url": "https://dl.example/tool_darwin_amd64.tar.gz", "name": "tool_darwin_amd64.tar.gz"},
            ],
        })
    }

    #[tokio::test]
    async fn queries_the_latest_release() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("GET").path("/repos/org/tool");
                then.status(200).json_body(repo_body());
            })
            .await;
        let release_call = server
            .mock_async(|when, then| {
                when.method("GET").path("/repos/org/tool/releases/latest");
                then.status(200).json_body(release_body());
            })
            .await;

        let client = GithubClient::with_api_base(
            create_client(&ClientSettings::new()).unwrap(),
            None,
            server.base_url(),
        );
        let query = client.query_release("org/tool", None).await.unwrap();
        assert_eq!(query.version, "1.2.3");
        assert_eq!(query.urls.len(), 2);
        assert_eq!(query.homepage.as_deref(), Some("https://github.com/org/tool"));
        assert_eq!(query.description.as_deref(), Some("a tool"));
        release_call.assert_async().await;
    }

    #[tokio::test]
    async fn queries_a_specific_tag() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("GET").path("/repos/org/tool");
                then.status(200).json_body(repo_body());
            })
            .await;
        let release_call = server
            .mock_async(|when, then| {
                when.method("GET")
                    .path("/repos/org/tool/releases/tags/v1.2.3");
                then.status(200).json_body(release_body());
            })
            .await;

        let client = GithubClient::with_api_base(
            create_client(&ClientSettings::new()).unwrap(),
            None,
            server.base_url(),
        );
        let query = client.query_release("org/tool", Some("v1.2.3")).await.unwrap();
        assert_eq!(query.version, "1.2.3");
        release_call.assert_async().await;
    }

    #[tokio::test]
    async fn assetless_releases_are_an_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("GET").path("/repos/org/tool");
                then.status(200).json_body(repo_body());
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method("GET").path("/repos/org/tool/releases/latest");
                then.status(200)
                    .json_body(json!({"tag_name": "v1.2.3", "assets": []}));
            })
            .await;

        let client = GithubClient::with_api_base(
            create_client(&ClientSettings::new()).unwrap(),
            None,
            server.base_url(),
        );
        let err = client.query_release("org/tool", None).await.unwrap_err();
        assert!(matches!(err, BinfetchError::ReleaseHasNoAssets { .. }));
    }

    #[tokio::test]
    async fn malformed_repos_never_hit_the_network() {
        let client = GithubClient::new(create_client(&ClientSettings::new()).unwrap(), None);
        let err = client.query_release("not-a-repo", None).await.unwrap_err();
        assert!(matches!(err, BinfetchError::MalformedRepo { .. }));
    }
}
