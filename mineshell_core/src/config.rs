use std::{env::var, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::Result;

pub const DEFAULT_CONFIG_FILE: &str = "mineshell.toml";
pub const MODRINTH_API: &str = "https://api.modrinth.com/v2";

/// On-disk shape of `mineshell.toml`; every key is optional.
#[derive(Serialize, Deserialize, Default)]
pub struct SettingsFile {
    pub instances_dir: Option<String>,
    pub downloads_dir: Option<String>,
    pub installers_dir: Option<String>,
    pub java: Option<String>,
    pub manifest_cache: Option<String>,
    pub user_agent: Option<String>,
    pub modrinth_url: Option<String>,
    pub date_format: Option<String>,
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub instances_dir: PathBuf,
    /// Scratch area for modpack archives, wiped at the start of every install.
    pub downloads_dir: PathBuf,
    pub installers_dir: PathBuf,
    pub java: PathBuf,
    pub manifest_cache: PathBuf,
    pub user_agent: String,
    pub modrinth_url: String,
    pub date_format: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings::resolve(None, |_| None)
    }
}

impl Settings {
    /// Reads `mineshell.toml` (or `$MINESHELL_CONFIG_PATH`) if present, then
    /// lets `MINESHELL_*` environment variables override individual keys.
    pub fn load() -> Result<Self> {
        let config_text = std::fs::read_to_string(
            var("MINESHELL_CONFIG_PATH").unwrap_or(DEFAULT_CONFIG_FILE.to_string()),
        );
        let file = if let Ok(text) = config_text {
            Some(toml::from_str::<SettingsFile>(&text)?)
        } else {
            None
        };

        Ok(Settings::resolve(file, |key| var(key).ok()))
    }

    fn resolve<F>(file: Option<SettingsFile>, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = file.unwrap_or_default();
        let pick = |key: &str, from_file: Option<String>, default: &str| -> String {
            env(key).or(from_file).unwrap_or(default.to_string())
        };

        Settings {
            instances_dir: pick("MINESHELL_INSTANCES_DIR", file.instances_dir, "instances").into(),
            downloads_dir: pick("MINESHELL_DOWNLOADS_DIR", file.downloads_dir, "downloads").into(),
            installers_dir: pick("MINESHELL_INSTALLERS_DIR", file.installers_dir, "installers")
                .into(),
            java: pick("MINESHELL_JAVA", file.java, "java").into(),
            manifest_cache: pick(
                "MINESHELL_MANIFEST_CACHE",
                file.manifest_cache,
                "version_manifest_v2.json",
            )
            .into(),
            user_agent: pick(
                "MINESHELL_USER_AGENT",
                file.user_agent,
                &format!("mineshell/{}", env!("CARGO_PKG_VERSION")),
            ),
            modrinth_url: pick("MINESHELL_MODRINTH_URL", file.modrinth_url, MODRINTH_API),
            date_format: pick("MINESHELL_DATE_FORMAT", file.date_format, "%Y-%m-%d"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_overrides_file_which_overrides_defaults() {
        let file: SettingsFile = toml::from_str(
            r#"
            instances_dir = "servers"
            java = "/opt/java/bin/java"
            "#,
        )
        .unwrap();

        let settings = Settings::resolve(Some(file), |key| match key {
            "MINESHELL_JAVA" => Some("/usr/bin/java".to_string()),
            _ => None,
        });

        assert_eq!(settings.instances_dir, PathBuf::from("servers"));
        assert_eq!(settings.java, PathBuf::from("/usr/bin/java"));
        assert_eq!(settings.downloads_dir, PathBuf::from("downloads"));
        assert_eq!(settings.modrinth_url, MODRINTH_API);
    }
}
