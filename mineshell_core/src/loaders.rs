//! Server-side modloader installers. Each loader ships a Java installer that
//! is downloaded once, cached under a version-bearing file name, and run
//! against the instance directory.

use std::{
    path::{Path, PathBuf},
    process::Stdio,
    sync::Arc,
};

use async_trait::async_trait;
use log::{debug, error, info};
use reqwest::Client;
use serde::Deserialize;
use tokio::process::Command;

use crate::{download::Fetcher, mojang, Error, Modloader, Result};

const FABRIC_INSTALLERS: &str = "https://meta.fabricmc.net/v2/versions/installer";
const QUILT_INSTALLERS: &str = "https://meta.quiltmc.org/v3/versions/installer";
const FORGE_MAVEN: &str = "https://maven.minecraftforge.net/net/minecraftforge/forge";
const NEOFORGE_MAVEN: &str = "https://maven.neoforged.net/releases/net/neoforged/neoforge";

/// What to install and where the loader-specific inputs come from.
#[derive(Debug, Clone)]
pub struct LoaderRequest {
    pub modloader: Modloader,
    pub minecraft_version: String,
    pub loader_version: Option<String>,
    /// Version-json URL used by Forge-style loaders to fetch the vanilla jar.
    pub version_url: Option<String>,
}

#[async_trait]
pub trait ModloaderInstaller: Send + Sync {
    /// Local path of the installer artifact, downloading it if not cached.
    async fn ensure_installer(&self, request: &LoaderRequest) -> Result<PathBuf>;

    /// Runs the installer into `target_dir` and returns its exit code.
    async fn run_installer(
        &self,
        request: &LoaderRequest,
        installer: &Path,
        target_dir: &Path,
    ) -> Result<i32>;
}

#[derive(Deserialize, Debug)]
struct InstallerRelease {
    version: String,
    url: String,
    #[serde(default)]
    stable: bool,
}

/// Installers that shell out to `java -jar`.
pub struct JavaInstallers {
    java: PathBuf,
    installers_dir: PathBuf,
    client: Client,
    fetcher: Arc<dyn Fetcher>,
}

impl JavaInstallers {
    pub fn new(java: PathBuf, installers_dir: PathBuf, client: Client, fetcher: Arc<dyn Fetcher>) -> Self {
        JavaInstallers {
            java,
            installers_dir,
            client,
            fetcher,
        }
    }

    async fn latest_stable(&self, url: &str) -> Result<InstallerRelease> {
        let releases: Vec<InstallerRelease> = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        newest_stable(releases).ok_or_else(|| Error::NoInstaller(url.to_string()))
    }

    async fn cached_or_download(&self, filename: &str, url: &str) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.installers_dir).await?;
        let dest = self.installers_dir.join(filename);
        if dest.exists() {
            debug!("Using cached installer {}", dest.display());
            return Ok(dest);
        }
        info!("Downloading installer {}", filename);
        self.fetcher.download(url, &dest, None, None).await?;
        Ok(dest)
    }

    async fn run_java(&self, installer: &Path, args: &[String], target_dir: &Path) -> Result<i32> {
        tokio::fs::create_dir_all(target_dir).await?;
        let output = Command::new(&self.java)
            .arg("-jar")
            .arg(installer)
            .args(args)
            .current_dir(target_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        let code = output.status.code().unwrap_or(-1);
        if !output.status.success() {
            error!(
                "{} exited with {}: {}",
                installer.display(),
                code,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(code)
    }
}

fn required_loader_version(request: &LoaderRequest) -> Result<&str> {
    request.loader_version.as_deref().ok_or_else(|| Error::MissingMetadata {
        name: request.modloader.display_name().to_string(),
        field: "loader version",
    })
}

/// Newest stable release by numeric version, falling back to the newest of
/// any kind when nothing is marked stable.
fn newest_stable(releases: Vec<InstallerRelease>) -> Option<InstallerRelease> {
    let key = |x: &InstallerRelease| -> Vec<u64> {
        x.version
            .split('.')
            .map(|part| part.parse().unwrap_or(0))
            .collect()
    };
    let has_stable = releases.iter().any(|x| x.stable);
    releases
        .into_iter()
        .filter(|x| x.stable || !has_stable)
        .max_by_key(key)
}

/// Installer artifact name; the version in it makes the cache per-version.
pub fn installer_filename(modloader: Modloader, minecraft_version: &str, version: &str) -> String {
    match modloader {
        Modloader::Fabric => format!("fabric-installer-{}.jar", version),
        Modloader::Quilt => format!("quilt-installer-{}.jar", version),
        Modloader::Forge => format!("forge-{}-{}-installer.jar", minecraft_version, version),
        Modloader::NeoForge => format!("neoforge-{}-installer.jar", version),
    }
}

/// Arguments passed after `java -jar <installer>`.
pub fn installer_args(request: &LoaderRequest, target_dir: &Path) -> Vec<String> {
    let dir = target_dir.display().to_string();
    match request.modloader {
        Modloader::Fabric => {
            let mut args = vec![
                "server".to_string(),
                "-mcversion".to_string(),
                request.minecraft_version.clone(),
                "-downloadMinecraft".to_string(),
                "-dir".to_string(),
                dir,
            ];
            if let Some(loader) = &request.loader_version {
                args.push("-loader".to_string());
                args.push(loader.clone());
            }
            args
        }
        Modloader::Quilt => {
            let mut args = vec![
                "install".to_string(),
                "server".to_string(),
                request.minecraft_version.clone(),
            ];
            // the installer picks the newest loader when none is given
            if let Some(loader) = &request.loader_version {
                args.push(loader.clone());
            }
            args.push(format!("--install-dir={}", dir));
            args.push("--download-server".to_string());
            args.push("--create-scripts".to_string());
            args
        }
        Modloader::Forge | Modloader::NeoForge => vec!["--installServer".to_string(), dir],
    }
}

#[async_trait]
impl ModloaderInstaller for JavaInstallers {
    async fn ensure_installer(&self, request: &LoaderRequest) -> Result<PathBuf> {
        let mc = &request.minecraft_version;
        match request.modloader {
            Modloader::Fabric | Modloader::Quilt => {
                let index = if request.modloader == Modloader::Fabric {
                    FABRIC_INSTALLERS
                } else {
                    QUILT_INSTALLERS
                };
                let latest = self.latest_stable(index).await?;
                let filename = installer_filename(request.modloader, mc, &latest.version);
                self.cached_or_download(&filename, &latest.url).await
            }
            Modloader::Forge => {
                let version = required_loader_version(request)?;
                let filename = installer_filename(Modloader::Forge, mc, version);
                let url = format!("{}/{}-{}/{}", FORGE_MAVEN, mc, version, filename);
                self.cached_or_download(&filename, &url).await
            }
            Modloader::NeoForge => {
                let version = required_loader_version(request)?;
                let filename = installer_filename(Modloader::NeoForge, mc, version);
                let url = format!("{}/{}/{}", NEOFORGE_MAVEN, version, filename);
                self.cached_or_download(&filename, &url).await
            }
        }
    }

    async fn run_installer(
        &self,
        request: &LoaderRequest,
        installer: &Path,
        target_dir: &Path,
    ) -> Result<i32> {
        info!(
            "Running {} installer for Minecraft {} into {}",
            request.modloader.display_name(),
            request.minecraft_version,
            target_dir.display()
        );
        let installer = std::path::absolute(installer)?;
        let target_dir = std::path::absolute(target_dir)?;
        let code = self
            .run_java(&installer, &installer_args(request, &target_dir), &target_dir)
            .await?;
        if code != 0 || !request.modloader.needs_version_manifest() {
            return Ok(code);
        }

        let Some(version_url) = request.version_url.as_deref() else {
            return Ok(-1);
        };
        mojang::download_minecraft_server(
            &self.client,
            self.fetcher.as_ref(),
            version_url,
            &target_dir,
        )
        .await?;

        // Forge-style installers drop a log named after themselves
        if let Some(name) = installer.file_name() {
            let mut log_name = name.to_os_string();
            log_name.push(".log");
            let _ = tokio::fs::remove_file(target_dir.join(log_name)).await;
        }

        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(modloader: Modloader, loader_version: Option<&str>) -> LoaderRequest {
        LoaderRequest {
            modloader,
            minecraft_version: "1.20.1".to_string(),
            loader_version: loader_version.map(String::from),
            version_url: None,
        }
    }

    #[test]
    fn installer_names_carry_the_version() {
        assert_eq!(
            installer_filename(Modloader::Forge, "1.20.1", "47.2.0"),
            "forge-1.20.1-47.2.0-installer.jar"
        );
        assert_eq!(
            installer_filename(Modloader::NeoForge, "1.21.1", "21.1.77"),
            "neoforge-21.1.77-installer.jar"
        );
        assert_eq!(
            installer_filename(Modloader::Fabric, "1.20.1", "1.0.1"),
            "fabric-installer-1.0.1.jar"
        );
    }

    #[test]
    fn fabric_args_include_loader_when_known() {
        let args = installer_args(
            &request(Modloader::Fabric, Some("0.15.11")),
            Path::new("/srv/pack"),
        );
        assert_eq!(
            args,
            vec![
                "server",
                "-mcversion",
                "1.20.1",
                "-downloadMinecraft",
                "-dir",
                "/srv/pack",
                "-loader",
                "0.15.11"
            ]
        );
    }

    #[test]
    fn quilt_args_skip_missing_loader_version() {
        let args = installer_args(&request(Modloader::Quilt, None), Path::new("/srv/pack"));
        assert_eq!(
            args,
            vec![
                "install",
                "server",
                "1.20.1",
                "--install-dir=/srv/pack",
                "--download-server",
                "--create-scripts"
            ]
        );
        assert!(args.iter().all(|x| !x.is_empty()));

        let args = installer_args(
            &request(Modloader::Quilt, Some("0.26.0")),
            Path::new("/srv/pack"),
        );
        assert_eq!(args[3], "0.26.0");
    }

    #[test]
    fn newest_stable_sorts_numerically() {
        let releases = vec![
            InstallerRelease { version: "0.9.2".into(), url: "a".into(), stable: true },
            InstallerRelease { version: "0.11.0".into(), url: "b".into(), stable: true },
            InstallerRelease { version: "0.12.0".into(), url: "c".into(), stable: false },
        ];
        assert_eq!(newest_stable(releases).unwrap().url, "b");
    }

    #[test]
    fn forge_needs_a_loader_version() {
        assert!(required_loader_version(&request(Modloader::Forge, None)).is_err());
        assert_eq!(
            required_loader_version(&request(Modloader::Forge, Some("47.2.0"))).unwrap(),
            "47.2.0"
        );
    }
}
