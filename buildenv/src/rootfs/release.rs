//! Published rootfs releases.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::time::Duration;

use buildenv_shared::errors::{BuildEnvError, BuildEnvResult};
use serde::Deserialize;

const GITHUB_API: &str = "https://api.github.com";
const API_TIMEOUT: Duration = Duration::from_secs(10);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);
const MIB: u64 = 1024 * 1024;

/// Progress lines such as `> Downloaded 3MB...`.
pub type Progress<'a> = &'a (dyn Fn(&str) + Send + Sync);

/// Where rootfs archives are published.
pub trait ReleaseSource: Send + Sync {
    /// Tag of the latest release.
    fn latest_tag(&self, repo: &str) -> BuildEnvResult<String>;

    /// Download `filename` from the latest release into `dest` and return
    /// the release tag.
    fn download_latest_asset(
        &self,
        repo: &str,
        filename: &str,
        dest: &Path,
        progress: Progress<'_>,
    ) -> BuildEnvResult<String>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    #[serde(default)]
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    #[serde(default)]
    pub browser_download_url: String,
}

impl Release {
    pub fn parse(json: &[u8]) -> BuildEnvResult<Self> {
        let release: Release = serde_json::from_slice(json)
            .map_err(|e| BuildEnvError::Download(format!("Malformed release info: {}", e)))?;
        if release.tag_name.is_empty() {
            return Err(BuildEnvError::Download(
                "Could not parse release tag from latest release".into(),
            ));
        }
        Ok(release)
    }

    pub fn asset_url(&self, filename: &str) -> Option<&str> {
        self.assets
            .iter()
            .find(|a| a.name == filename)
            .map(|a| a.browser_download_url.as_str())
            .filter(|url| !url.is_empty())
    }
}

/// GitHub "latest release" API.
pub struct GithubReleases {
    api_base: String,
    api: ureq::Agent,
    download: ureq::Agent,
}

impl GithubReleases {
    pub fn new() -> Self {
        Self::with_api_base(GITHUB_API)
    }

    pub fn with_api_base(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            api: agent(API_TIMEOUT),
            download: agent(DOWNLOAD_TIMEOUT),
        }
    }

    fn latest_release(&self, repo: &str) -> BuildEnvResult<Release> {
        let url = format!("{}/repos/{}/releases/latest", self.api_base, repo);
        tracing::debug!(%url, "Fetching latest release");

        let resp = self
            .api
            .get(&url)
            .header("Accept", "application/vnd.github+json")
            .call()
            .map_err(|e| BuildEnvError::Download(format!("GET {}: {}", url, e)))?;
        let mut body = Vec::new();
        resp.into_body()
            .into_reader()
            .read_to_end(&mut body)
            .map_err(|e| BuildEnvError::Download(format!("GET {}: {}", url, e)))?;
        Release::parse(&body)
    }
}

impl Default for GithubReleases {
    fn default() -> Self {
        Self::new()
    }
}

fn agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}

impl ReleaseSource for GithubReleases {
    fn latest_tag(&self, repo: &str) -> BuildEnvResult<String> {
        Ok(self.latest_release(repo)?.tag_name)
    }

    fn download_latest_asset(
        &self,
        repo: &str,
        filename: &str,
        dest: &Path,
        progress: Progress<'_>,
    ) -> BuildEnvResult<String> {
        progress("> Fetching latest release info from GitHub...");
        let release = self.latest_release(repo)?;
        let url = release.asset_url(filename).ok_or_else(|| {
            BuildEnvError::Download(format!("Asset '{}' not found in latest release", filename))
        })?;

        progress(&format!("> Downloading {}...", filename));
        tracing::info!(tag = %release.tag_name, %url, "Downloading rootfs asset");

        let resp = self
            .download
            .get(url)
            .call()
            .map_err(|e| BuildEnvError::Download(format!("GET {}: {}", url, e)))?;
        let mut reader = resp.into_body().into_reader();

        let file = File::create(dest).map_err(|e| {
            BuildEnvError::Storage(format!("Failed to create {}: {}", dest.display(), e))
        })?;
        let mut writer = BufWriter::new(file);
        let total = copy_with_progress(&mut reader, &mut writer, progress)
            .map_err(|e| BuildEnvError::Download(format!("Download of {} failed: {}", url, e)))?;
        writer
            .into_inner()
            .map_err(|e| BuildEnvError::Storage(e.to_string()))?
            .sync_all()?;

        progress(&format!("> Download complete: {}MB", total / MIB));
        Ok(release.tag_name)
    }
}

/// Copy `reader` into `writer`, reporting each completed MiB.
fn copy_with_progress(
    reader: &mut impl Read,
    writer: &mut impl Write,
    progress: Progress<'_>,
) -> std::io::Result<u64> {
    let mut buf = [0u8; 64 * 1024];
    let mut total = 0u64;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        writer.write_all(&buf[..n])?;

        let before = total / MIB;
        total += n as u64;
        let after = total / MIB;
        if after > before {
            progress(&format!("> Downloaded {}MB...", after));
        }
    }
    writer.flush()?;
    Ok(total)
}
