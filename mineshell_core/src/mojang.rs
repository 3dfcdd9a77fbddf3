use std::{
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use log::{info, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{download::Fetcher, Error, Result};

pub const VERSION_MANIFEST_URL: &str =
    "https://launchermeta.mojang.com/mc/game/version_manifest_v2.json";
const CACHE_EXPIRATION: Duration = Duration::from_secs(24 * 60 * 60);
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VersionManifest {
    pub versions: Vec<ManifestVersion>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManifestVersion {
    pub id: String,
    #[serde(rename = "type")]
    pub version_type: String,
    /// Points at the per-version json, which in turn names the server jar.
    pub url: String,
    #[serde(default)]
    pub release_time: Option<String>,
}

#[derive(Deserialize)]
struct VersionJson {
    downloads: VersionDownloads,
}

#[derive(Deserialize)]
struct VersionDownloads {
    server: DownloadInfo,
}

#[derive(Deserialize)]
struct DownloadInfo {
    url: String,
}

impl VersionManifest {
    /// Loads the manifest, preferring a cache younger than a day. If the fetch
    /// fails, a stale cache is used instead. Returns `None` when neither is
    /// available.
    pub async fn load(client: &Client, cache_file: &Path) -> Option<Self> {
        if cache_is_fresh(cache_file) {
            if let Some(manifest) = read_cache(cache_file) {
                return Some(manifest);
            }
        }

        match fetch_manifest(client).await {
            Ok(manifest) => {
                match serde_json::to_string(&manifest) {
                    Ok(text) => {
                        if let Err(err) = std::fs::write(cache_file, text) {
                            warn!("Failed to cache version manifest: {}", err);
                        }
                    }
                    Err(err) => warn!("Failed to serialize version manifest: {}", err),
                }
                Some(manifest)
            }
            Err(err) => {
                warn!("Failed to fetch version manifest: {}", err);
                read_cache(cache_file)
            }
        }
    }

    pub fn releases(&self) -> Vec<&ManifestVersion> {
        self.versions
            .iter()
            .filter(|x| x.version_type == "release")
            .collect()
    }

    /// Version-json URL of a release.
    pub fn release_url(&self, minecraft_version: &str) -> Option<&str> {
        self.releases()
            .into_iter()
            .find(|x| x.id == minecraft_version)
            .map(|x| x.url.as_str())
    }
}

fn cache_is_fresh(cache_file: &Path) -> bool {
    std::fs::metadata(cache_file)
        .and_then(|x| x.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age < CACHE_EXPIRATION)
}

fn read_cache(cache_file: &Path) -> Option<VersionManifest> {
    let text = std::fs::read_to_string(cache_file).ok()?;
    serde_json::from_str(&text).ok()
}

async fn fetch_manifest(client: &Client) -> Result<VersionManifest> {
    Ok(client
        .get(VERSION_MANIFEST_URL)
        .timeout(FETCH_TIMEOUT)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?)
}

/// Resolves the version-json URL for `minecraft_version`, failing when the
/// manifest is unavailable or lacks that release.
pub async fn version_url(
    client: &Client,
    cache_file: &Path,
    minecraft_version: &str,
) -> Result<String> {
    VersionManifest::load(client, cache_file)
        .await
        .and_then(|x| x.release_url(minecraft_version).map(String::from))
        .ok_or_else(|| Error::UnknownMinecraftVersion(minecraft_version.to_string()))
}

/// Downloads the vanilla `server.jar` described by a version json into
/// `dest_dir`.
pub async fn download_minecraft_server(
    client: &Client,
    fetcher: &dyn Fetcher,
    version_json_url: &str,
    dest_dir: &Path,
) -> Result<PathBuf> {
    let version: VersionJson = client
        .get(version_json_url)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let dest = dest_dir.join("server.jar");
    info!("Downloading vanilla server jar to {}", dest.display());
    fetcher
        .download(&version.downloads.server.url, &dest, None, None)
        .await?;
    Ok(dest)
}
