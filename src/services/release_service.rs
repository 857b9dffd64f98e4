//! Release Service
//!
//! Looks up the latest published release and compares it against the
//! running version. Only notifies; nothing is downloaded or replaced.

use crate::error::{AppError, Result};
use crate::system;
use async_trait::async_trait;
use reqwest::Client;
use semver::{BuildMetadata, Version};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

const GITHUB_API: &str = "https://api.github.com/";
pub const RELEASE_REPO: &str = "devusSs/steamquery-v2";
const RELEASE_TIMEOUT: Duration = Duration::from_secs(10);

/// Version of the running binary
pub const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseInfo {
    pub tag_name: String,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub body: String,
}

/// Semantic version with an optional leading `v`; build metadata does not order
fn parse_version(raw: &str) -> Result<Version> {
    let mut version = Version::parse(raw.trim().trim_start_matches(['v', 'V']))
        .map_err(|e| AppError::Parse(format!("Invalid version '{}': {}", raw, e)))?;
    version.build = BuildMetadata::EMPTY;
    Ok(version)
}

/// Whether `candidate` is strictly newer than `current`; pre-releases sort below their release
pub fn is_newer(current: &str, candidate: &str) -> Result<bool> {
    Ok(parse_version(candidate)? > parse_version(current)?)
}

/// Source of release information for the periodic update check
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    /// The latest release when it is newer than the running binary
    async fn newer_release(&self) -> Result<Option<ReleaseInfo>>;
}

/// Release service for business logic
pub struct ReleaseService {
    client: Client,
    endpoint: Url,
}

impl ReleaseService {
    pub fn new() -> Result<Self> {
        Self::for_repo(RELEASE_REPO)
    }

    pub fn for_repo(repo: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(RELEASE_TIMEOUT)
            .user_agent(system::user_agent())
            .build()?;

        Ok(Self {
            client,
            endpoint: Self::latest_release_url(repo)?,
        })
    }

    pub fn latest_release_url(repo: &str) -> Result<Url> {
        let base = Url::parse(GITHUB_API)
            .map_err(|e| AppError::Config(format!("Invalid release endpoint: {}", e)))?;
        base.join(&format!("repos/{}/releases/latest", repo.trim_matches('/')))
            .map_err(|e| AppError::Config(format!("Invalid release repository '{}': {}", repo, e)))
    }

    pub async fn latest(&self) -> Result<ReleaseInfo> {
        debug!("ReleaseService::latest - {}", self.endpoint);

        let response = self
            .client
            .get(self.endpoint.clone())
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::UnexpectedStatus {
                status: status.as_u16(),
                context: "release lookup".to_string(),
            });
        }

        Ok(response.json::<ReleaseInfo>().await?)
    }

    /// The latest release when it is newer than the running binary
    pub async fn check(&self) -> Result<Option<ReleaseInfo>> {
        let release = self.latest().await?;
        if is_newer(CURRENT_VERSION, &release.tag_name)? {
            info!(
                "ReleaseService::check - new version {} available (running {})",
                release.tag_name, CURRENT_VERSION
            );
            Ok(Some(release))
        } else {
            debug!("ReleaseService::check - up to date ({})", CURRENT_VERSION);
            Ok(None)
        }
    }
}

#[async_trait]
impl ReleaseSource for ReleaseService {
    async fn newer_release(&self) -> Result<Option<ReleaseInfo>> {
        self.check().await
    }
}
