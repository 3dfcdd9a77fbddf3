use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{api::ResolvedMod, Error, ModSource, ModType, Result, StrConversion};

pub const DISABLED_SUFFIX: &str = ".disabled";
pub const MODS_FILE: &str = "mods.json";

/// One installed mod or datapack.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ModEntry {
    /// Provider project id; override files use their file name.
    #[serde(default)]
    pub mod_id: String,
    #[serde(default)]
    pub slug: Option<String>,
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub version_id: Option<String>,
    #[serde(default)]
    pub release_date: Option<DateTime<Utc>>,
    pub source: ModSource,
    #[serde(rename = "type")]
    pub mod_type: ModType,
    /// Current on-disk name, carrying the `.disabled` suffix while disabled.
    pub filename: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub install_date: DateTime<Utc>,
    #[serde(default)]
    pub from_modpack: bool,
    #[serde(default)]
    pub is_override: bool,
}

fn default_enabled() -> bool {
    true
}

impl ModEntry {
    /// Entry for a file shipped inside a modpack's override bundle. Overrides
    /// carry no version metadata.
    pub fn from_override(filename: &str, mod_type: ModType, source: ModSource) -> Self {
        ModEntry {
            mod_id: filename.to_string(),
            slug: None,
            name: filename.to_string(),
            version: None,
            version_id: None,
            release_date: None,
            source,
            mod_type,
            filename: filename.to_string(),
            enabled: true,
            install_date: Utc::now(),
            from_modpack: true,
            is_override: true,
        }
    }

    /// Entry for a dependency resolved through a catalog.
    pub fn from_resolved(resolved: &ResolvedMod, source: ModSource, from_modpack: bool) -> Self {
        ModEntry {
            mod_id: resolved.project_id.clone(),
            slug: resolved.slug.clone(),
            name: resolved
                .name
                .clone()
                .unwrap_or_else(|| resolved.project_id.clone()),
            version: resolved.version_number.clone(),
            version_id: Some(resolved.version_id.clone()),
            release_date: resolved
                .date_published
                .as_deref()
                .and_then(|x| x.parse::<DateTime<Utc>>().ok()),
            source,
            mod_type: resolved.mod_type,
            filename: resolved.file_name.clone().unwrap_or_default(),
            enabled: true,
            install_date: Utc::now(),
            from_modpack,
            is_override: false,
        }
    }

    /// Path of the backing file for an instance rooted at `instance_path`.
    pub fn file_path(&self, instance_path: &Path) -> PathBuf {
        instance_path.join(self.mod_type.install_dir()).join(&self.filename)
    }

    pub fn formatted_date(&self, format: &str) -> String {
        self.install_date.format(format).to_string()
    }

    pub fn formatted_release_date(&self, format: &str) -> String {
        self.release_date
            .map(|x| x.format(format).to_string())
            .unwrap_or_default()
    }
}

/// All mods and datapacks of one instance, persisted as `mods/mods.json`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ModList {
    #[serde(default)]
    pub mods: Vec<ModEntry>,
}

impl ModList {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|source| Error::InvalidData {
            file: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn get(&self, mod_id: &str) -> Option<&ModEntry> {
        self.mods.iter().find(|x| x.mod_id == mod_id)
    }

    fn get_mut(&mut self, mod_id: &str) -> Option<&mut ModEntry> {
        self.mods.iter_mut().find(|x| x.mod_id == mod_id)
    }

    pub fn contains(&self, mod_id: &str) -> bool {
        self.mods.iter().any(|x| x.mod_id == mod_id)
    }

    /// Appends `entry` unless its id is already present.
    pub fn add(&mut self, entry: ModEntry) -> bool {
        if self.contains(&entry.mod_id) {
            return false;
        }
        self.mods.push(entry);
        true
    }

    /// Deletes the backing file, then drops the entry. A file that is already
    /// gone does not block removal; any other delete failure leaves the list
    /// untouched.
    pub fn remove(&mut self, mod_id: &str, instance_path: &Path) -> bool {
        let Some(entry) = self.get(mod_id) else {
            return false;
        };
        let path = entry.file_path(instance_path);
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("{} was already missing", path.display());
            }
            Err(err) => {
                warn!("Failed to delete {}: {}", path.display(), err);
                return false;
            }
        }
        self.mods.retain(|x| x.mod_id != mod_id);
        true
    }

    pub fn enable(&mut self, mod_id: &str, instance_path: &Path) -> bool {
        self.set_enabled(mod_id, instance_path, true)
    }

    pub fn disable(&mut self, mod_id: &str, instance_path: &Path) -> bool {
        self.set_enabled(mod_id, instance_path, false)
    }

    pub fn toggle(&mut self, mod_id: &str, instance_path: &Path) -> bool {
        match self.get(mod_id) {
            Some(entry) => {
                let enabled = !entry.enabled;
                self.set_enabled(mod_id, instance_path, enabled)
            }
            None => false,
        }
    }

    /// Renames the backing file to match `enabled` and only then updates the
    /// entry, so the flag and the `.disabled` suffix never disagree.
    fn set_enabled(&mut self, mod_id: &str, instance_path: &Path, enabled: bool) -> bool {
        let Some(entry) = self.get_mut(mod_id) else {
            return false;
        };
        if entry.enabled == enabled {
            return true;
        }

        let new_name = if enabled {
            entry
                .filename
                .strip_suffix(DISABLED_SUFFIX)
                .unwrap_or(&entry.filename)
                .to_string()
        } else {
            format!("{}{}", entry.filename, DISABLED_SUFFIX)
        };

        let dir = instance_path.join(entry.mod_type.install_dir());
        if let Err(err) = std::fs::rename(dir.join(&entry.filename), dir.join(&new_name)) {
            warn!("Failed to rename {}: {}", entry.filename, err);
            return false;
        }

        entry.filename = new_name;
        entry.enabled = enabled;
        true
    }

    /// Flattens the list into string rows for filtering and sorting views.
    pub fn to_rows(&self, date_format: &str) -> Vec<BTreeMap<&'static str, String>> {
        self.mods
            .iter()
            .map(|x| {
                let source = if x.is_override {
                    "Override".to_string()
                } else {
                    capitalize(x.source.as_str())
                };
                BTreeMap::from([
                    ("mod_id", x.mod_id.clone()),
                    ("slug", x.slug.clone().unwrap_or_default()),
                    ("name", x.name.clone()),
                    ("version", x.version.clone().unwrap_or_default()),
                    ("version_id", x.version_id.clone().unwrap_or_default()),
                    (
                        "release_date",
                        x.release_date.map(|d| d.to_rfc3339()).unwrap_or_default(),
                    ),
                    ("formatted_release_date", x.formatted_release_date(date_format)),
                    ("source", source),
                    ("type", capitalize(x.mod_type.as_str())),
                    ("filename", x.filename.clone()),
                    ("enabled", x.enabled.to_string()),
                    ("install_date", x.install_date.to_rfc3339()),
                    ("formatted_date", x.formatted_date(date_format)),
                    ("from_modpack", x.from_modpack.to_string()),
                    ("is_override", x.is_override.to_string()),
                ])
            })
            .collect()
    }
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
