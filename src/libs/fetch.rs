//! Release discovery and asset download.
//!
//! [`ReleaseSource`] hides where a release comes from. [`GithubSource`]
//! talks to the GitHub releases API; [`LocalSource`] reads a release folder
//! produced by the release builder (offline installs and tests).
//!
//! Downloads stream to disk and report progress through a
//! [`ProgressTracker`]. Nothing here retries: transport failures go back to
//! the caller unchanged.

use crate::libs::error::{Result, UpdateError};
use crate::libs::manifest::Manifest;
use crate::libs::progress::{ProgressFn, ProgressTracker};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Read size used when copying local assets.
pub const DOWNLOAD_CHUNK_SIZE: usize = 256 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub name: String,
    pub url: String,
}

/// The latest published release as seen by a source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseInfo {
    pub tag: String,
    pub body: String,
    pub assets: Vec<Asset>,
}

impl ReleaseInfo {
    pub fn find_asset(&self, name: &str) -> Option<&Asset> {
        self.assets.iter().find(|asset| asset.name == name)
    }

    pub fn asset_names(&self) -> Vec<&str> {
        self.assets.iter().map(|asset| asset.name.as_str()).collect()
    }
}

#[derive(Deserialize)]
struct RawRelease {
    #[serde(default)]
    tag_name: Option<String>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    assets: Vec<RawAsset>,
}

#[derive(Deserialize)]
struct RawAsset {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    browser_download_url: Option<String>,
}

impl From<RawRelease> for ReleaseInfo {
    fn from(raw: RawRelease) -> Self {
        ReleaseInfo {
            tag: raw.tag_name.unwrap_or_default().trim().to_string(),
            body: raw.body.unwrap_or_default(),
            assets: raw
                .assets
                .into_iter()
                .filter_map(|asset| match (asset.name, asset.browser_download_url) {
                    (Some(name), Some(url)) => Some(Asset { name, url }),
                    _ => None,
                })
                .collect(),
        }
    }
}

/// Parses a GitHub "latest release" document.
pub fn parse_release_index(text: &str) -> Result<ReleaseInfo> {
    let raw: RawRelease = serde_json::from_str(text)?;
    Ok(raw.into())
}

#[async_trait]
pub trait ReleaseSource: Send + Sync {
    async fn latest_release(&self) -> Result<ReleaseInfo>;

    /// Streams `url` into `dest`, reporting progress under `label`.
    async fn download(&self, url: &str, dest: &Path, label: &str, progress: ProgressFn<'_>) -> Result<()>;
}

pub struct GithubSource {
    client: Client,
    index_url: String,
    request_timeout: Duration,
    download_timeout: Duration,
}

impl GithubSource {
    pub fn new(owner: &str, repo: &str, user_agent: &str) -> Result<Self> {
        let index_url = format!("https://api.github.com/repos/{}/{}/releases/latest", owner, repo);
        Self::with_index_url(&index_url, user_agent)
    }

    pub fn with_index_url(index_url: &str, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| UpdateError::transport(index_url, e))?;

        Ok(Self {
            client,
            index_url: index_url.to_string(),
            request_timeout: Duration::from_secs(10),
            download_timeout: Duration::from_secs(60),
        })
    }

    pub fn timeouts(mut self, request: Duration, download: Duration) -> Self {
        self.request_timeout = request;
        self.download_timeout = download;
        self
    }

    pub fn index_url(&self) -> &str {
        &self.index_url
    }

    async fn get(&self, url: &str, timeout: Duration) -> Result<reqwest::Response> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| UpdateError::transport(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpdateError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl ReleaseSource for GithubSource {
    async fn latest_release(&self) -> Result<ReleaseInfo> {
        let response = self.get(&self.index_url, self.request_timeout).await?;
        let text = response.text().await.map_err(|e| UpdateError::transport(&self.index_url, e))?;
        let release = parse_release_index(&text)?;
        tracing::debug!(tag = %release.tag, assets = ?release.asset_names(), "fetched release index");
        Ok(release)
    }

    async fn download(&self, url: &str, dest: &Path, label: &str, progress: ProgressFn<'_>) -> Result<()> {
        let mut response = self.get(url, self.download_timeout).await?;
        let mut tracker = ProgressTracker::new(label, response.content_length(), progress);
        let mut file = create_dest(dest).await?;
        tracker.start();

        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await.map_err(|e| UpdateError::transport(url, e))? {
            file.write_all(&chunk).await.map_err(|e| UpdateError::io(dest, e))?;
            written += chunk.len() as u64;
            tracker.advance(chunk.len() as u64);
        }
        file.flush().await.map_err(|e| UpdateError::io(dest, e))?;
        tracker.finish();

        tracing::debug!(url, bytes = written, dest = %dest.display(), "download complete");
        Ok(())
    }
}

/// A release folder on disk: `manifest.json`, the package archive and
/// anything else published alongside. The manifest's `version` is the tag.
pub struct LocalSource {
    dir: PathBuf,
    manifest_name: String,
}

impl LocalSource {
    pub fn new(dir: impl Into<PathBuf>, manifest_name: &str) -> Self {
        Self {
            dir: dir.into(),
            manifest_name: manifest_name.to_string(),
        }
    }
}

#[async_trait]
impl ReleaseSource for LocalSource {
    async fn latest_release(&self) -> Result<ReleaseInfo> {
        let manifest_path = self.dir.join(&self.manifest_name);
        if !manifest_path.is_file() {
            return Ok(ReleaseInfo::default());
        }
        let manifest = Manifest::load(&manifest_path)?;

        let mut assets = Vec::new();
        let entries = std::fs::read_dir(&self.dir).map_err(|e| UpdateError::io(&self.dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| UpdateError::io(&self.dir, e))?;
            if entry.path().is_file() {
                assets.push(Asset {
                    name: entry.file_name().to_string_lossy().into_owned(),
                    url: entry.path().to_string_lossy().into_owned(),
                });
            }
        }
        assets.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(ReleaseInfo {
            tag: manifest.version,
            body: String::new(),
            assets,
        })
    }

    async fn download(&self, url: &str, dest: &Path, label: &str, progress: ProgressFn<'_>) -> Result<()> {
        let src = Path::new(url);
        let mut input = tokio::fs::File::open(src).await.map_err(|e| UpdateError::io(src, e))?;
        let total = input.metadata().await.ok().map(|m| m.len());
        let mut tracker = ProgressTracker::new(label, total, progress);
        let mut output = create_dest(dest).await?;
        tracker.start();

        let mut buffer = vec![0u8; DOWNLOAD_CHUNK_SIZE];
        loop {
            let read = input.read(&mut buffer).await.map_err(|e| UpdateError::io(src, e))?;
            if read == 0 {
                break;
            }
            output.write_all(&buffer[..read]).await.map_err(|e| UpdateError::io(dest, e))?;
            tracker.advance(read as u64);
        }
        output.flush().await.map_err(|e| UpdateError::io(dest, e))?;
        tracker.finish();
        Ok(())
    }
}

async fn create_dest(dest: &Path) -> Result<tokio::fs::File> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| UpdateError::io(parent, e))?;
    }
    tokio::fs::File::create(dest).await.map_err(|e| UpdateError::io(dest, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_github_release_index() {
        let release = parse_release_index(
            r#"{
                "tag_name": " v1.5 ",
                "body": "fixes",
                "assets": [
                    {"name": "manifest.json", "browser_download_url": "https://x/manifest.json"},
                    {"name": "update.zip", "browser_download_url": "https://x/update.zip"},
                    {"name": "broken"}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(release.tag, "v1.5");
        assert_eq!(release.body, "fixes");
        assert_eq!(release.asset_names(), vec!["manifest.json", "update.zip"]);
        assert_eq!(release.find_asset("update.zip").unwrap().url, "https://x/update.zip");
        assert!(release.find_asset("other").is_none());
    }

    #[test]
    fn missing_fields_default() {
        let release = parse_release_index("{}").unwrap();
        assert!(release.tag.is_empty());
        assert!(release.assets.is_empty());
    }
}
