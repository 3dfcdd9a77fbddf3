use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    fs::sanitize_filename,
    models::mods::{ModList, MODS_FILE},
    DowngradeBehavior, Error, InstanceStatus, ModType, Modloader, ModpackSource, Result,
    SourceKind, UpdateDisabledMods,
};

pub const INSTANCE_FILE: &str = "instance.json";
pub const REGISTRY_FILE: &str = "registry.json";

/// Full configuration of one server instance.
///
/// Everything except `mods` and `path` lives in `<path>/instance.json`; the
/// mod list is persisted separately in `<path>/mods/mods.json`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct InstanceConfig {
    pub instance_id: String,
    pub name: String,
    pub install_date: DateTime<Utc>,
    pub minecraft_version: String,
    pub modloader: Modloader,
    #[serde(default)]
    pub modloader_version: Option<String>,
    #[serde(default)]
    pub modpack_name: Option<String>,
    /// Slug for Modrinth, project id for CurseForge and FTB.
    #[serde(default)]
    pub modpack_id: Option<String>,
    /// Download URL of the modpack archive.
    #[serde(default)]
    pub modpack_url: Option<String>,
    #[serde(default)]
    pub modpack_version: Option<String>,
    #[serde(default)]
    pub modpack_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub modpack_source: ModpackSource,
    #[serde(default)]
    pub source_api: SourceKind,
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub stopping: bool,
    #[serde(default)]
    pub jvm_args: Vec<String>,
    #[serde(default)]
    pub java_version: Option<String>,
    #[serde(default)]
    pub memory_min: Option<u32>,
    #[serde(default)]
    pub memory_max: Option<u32>,
    #[serde(default)]
    pub overwrite_global_settings: bool,
    #[serde(default)]
    pub update_disabled_mods: UpdateDisabledMods,
    #[serde(default)]
    pub downgrade_behavior: DowngradeBehavior,
    #[serde(default)]
    pub backup_marker: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(skip)]
    pub mods: ModList,
    #[serde(skip)]
    pub path: PathBuf,
}

impl InstanceConfig {
    /// Fresh, unsaved instance under `instances_dir`, its id derived from
    /// `name`.
    pub fn new(
        name: &str,
        minecraft_version: &str,
        modloader: Modloader,
        instances_dir: &Path,
    ) -> Self {
        let instance_id = sanitize_filename(name);
        InstanceConfig {
            path: instances_dir.join(&instance_id),
            instance_id,
            name: name.to_string(),
            install_date: Utc::now(),
            minecraft_version: minecraft_version.to_string(),
            modloader,
            modloader_version: None,
            modpack_name: None,
            modpack_id: None,
            modpack_url: None,
            modpack_version: None,
            modpack_date: None,
            modpack_source: ModpackSource::Modloader,
            source_api: SourceKind::Modrinth,
            running: false,
            stopping: false,
            jvm_args: Vec::new(),
            java_version: None,
            memory_min: None,
            memory_max: None,
            overwrite_global_settings: false,
            update_disabled_mods: UpdateDisabledMods::default(),
            downgrade_behavior: DowngradeBehavior::default(),
            backup_marker: None,
            notes: None,
            mods: ModList::default(),
        }
    }

    pub fn formatted_modloader(&self) -> &'static str {
        self.modloader.display_name()
    }

    pub fn instance_file(&self) -> PathBuf {
        self.path.join(INSTANCE_FILE)
    }

    pub fn mods_file(&self) -> PathBuf {
        self.path.join("mods").join(MODS_FILE)
    }

    pub fn dir_for(&self, mod_type: ModType) -> PathBuf {
        self.path.join(mod_type.install_dir())
    }

    /// Whether an instance has already been saved at this instance's path.
    pub fn exists(&self) -> bool {
        self.instance_file().exists()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let instance_json = path.join(INSTANCE_FILE);
        let mods_json = path.join("mods").join(MODS_FILE);

        if !instance_json.exists() {
            return Err(Error::MissingInstance(path.to_path_buf()));
        }

        let text = std::fs::read_to_string(&instance_json)?;
        let mut instance: InstanceConfig =
            serde_json::from_str(&text).map_err(|source| Error::InvalidData {
                file: instance_json.clone(),
                source,
            })?;

        if mods_json.exists() {
            instance.mods = ModList::load(&mods_json)?;
        } else {
            warn!("No mods.json in {}, starting an empty one", path.display());
            instance.mods = ModList::default();
            instance.mods.save(&mods_json)?;
        }

        instance.path = path.to_path_buf();
        Ok(instance)
    }

    /// Creates the instance directory tree and writes both JSON files.
    pub fn save(&self) -> Result<()> {
        std::fs::create_dir_all(&self.path)?;
        std::fs::write(self.instance_file(), serde_json::to_string_pretty(self)?)?;
        self.save_mods()
    }

    /// Persists only the mod list, after toggles and removals.
    pub fn save_mods(&self) -> Result<()> {
        self.mods.save(&self.mods_file())
    }
}

/// Registry row: the subset of an instance needed to list it without loading
/// the full config.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct InstanceSummary {
    pub instance_id: String,
    pub name: String,
    #[serde(default)]
    pub status: InstanceStatus,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pack_version: Option<String>,
    #[serde(default)]
    pub modloader: Option<Modloader>,
    #[serde(default)]
    pub minecraft_version: Option<String>,
    #[serde(default = "default_datapacks_folder")]
    pub datapacks_folder: PathBuf,
    #[serde(default)]
    pub path: Option<PathBuf>,
}

fn default_datapacks_folder() -> PathBuf {
    ModType::Datapack.install_dir()
}

impl InstanceSummary {
    pub fn formatted_modloader(&self) -> &'static str {
        self.modloader.map(|x| x.display_name()).unwrap_or("")
    }

    pub fn formatted_date(&self, format: &str) -> String {
        self.created
            .map(|x| x.format(format).to_string())
            .unwrap_or_default()
    }
}

impl From<&InstanceConfig> for InstanceSummary {
    fn from(instance: &InstanceConfig) -> Self {
        InstanceSummary {
            instance_id: instance.instance_id.clone(),
            name: instance.name.clone(),
            status: InstanceStatus::Stopped,
            created: Some(instance.install_date),
            pack_version: instance.modpack_version.clone(),
            modloader: Some(instance.modloader),
            minecraft_version: Some(instance.minecraft_version.clone()),
            datapacks_folder: default_datapacks_folder(),
            path: Some(instance.path.clone()),
        }
    }
}

/// Index of every instance, persisted as `<instances_dir>/registry.json`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct InstanceRegistry {
    #[serde(default)]
    pub instances: Vec<InstanceSummary>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub default_instance: Option<String>,
}

impl InstanceRegistry {
    /// Loads the registry, or an empty one when none has been saved yet.
    pub fn load(folder: &Path) -> Result<Self> {
        let registry_json = folder.join(REGISTRY_FILE);
        if !registry_json.exists() {
            return Ok(InstanceRegistry::default());
        }
        let text = std::fs::read_to_string(&registry_json)?;
        serde_json::from_str(&text).map_err(|source| Error::InvalidData {
            file: registry_json,
            source,
        })
    }

    pub fn save(&mut self, folder: &Path) -> Result<()> {
        self.last_updated = Some(Utc::now());
        std::fs::create_dir_all(folder)?;
        std::fs::write(
            folder.join(REGISTRY_FILE),
            serde_json::to_string_pretty(self)?,
        )?;
        Ok(())
    }

    pub fn contains(&self, instance_id: &str) -> bool {
        self.instances.iter().any(|x| x.instance_id == instance_id)
    }

    /// Adds a row unless one with the same id exists. Does not save.
    pub fn add_instance(&mut self, summary: InstanceSummary) -> bool {
        if self.contains(&summary.instance_id) {
            return false;
        }
        self.instances.push(summary);
        self.last_updated = Some(Utc::now());
        true
    }

    /// Drops a row, clearing the default pointer if it named it. Does not save.
    pub fn remove_instance(&mut self, instance_id: &str) -> bool {
        let before = self.instances.len();
        self.instances.retain(|x| x.instance_id != instance_id);
        if self.default_instance.as_deref() == Some(instance_id) {
            self.default_instance = None;
        }
        self.last_updated = Some(Utc::now());
        self.instances.len() < before
    }

    pub fn summary(&self, instance_id: &str) -> Option<&InstanceSummary> {
        self.instances.iter().find(|x| x.instance_id == instance_id)
    }

    /// Resolves a registry row to its full config by loading it from disk.
    pub fn get_instance(&self, instance_id: &str) -> Result<Option<InstanceConfig>> {
        match self.summary(instance_id).and_then(|x| x.path.as_ref()) {
            Some(path) => InstanceConfig::load(path).map(Some),
            None => Ok(None),
        }
    }

    pub fn get_default_instance(&self) -> Result<Option<InstanceConfig>> {
        match &self.default_instance {
            Some(id) => self.get_instance(id),
            None => Ok(None),
        }
    }

    /// Points the default at `instance_id` and saves the registry.
    pub fn set_default_instance(&mut self, instance_id: &str, folder: &Path) -> Result<()> {
        self.default_instance = Some(instance_id.to_string());
        info!("Default instance set to {}", instance_id);
        self.save(folder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_instance_derives_id_and_path_from_name() {
        let instance = InstanceConfig::new(
            "My Server!",
            "1.20.1",
            Modloader::Fabric,
            Path::new("instances"),
        );
        assert_eq!(instance.instance_id, "My_Server");
        assert_eq!(instance.path, PathBuf::from("instances/My_Server"));
        assert_eq!(instance.modpack_source, ModpackSource::Modloader);
        assert!(instance.mods.mods.is_empty());
    }

    #[test]
    fn instance_json_omits_mods_and_path() {
        let instance =
            InstanceConfig::new("srv", "1.21.1", Modloader::NeoForge, Path::new("instances"));
        let value = serde_json::to_value(&instance).unwrap();
        assert!(value.get("mods").is_none());
        assert!(value.get("path").is_none());
        assert_eq!(value["modloader"], "neoforge");
        assert_eq!(value["modpack_source"], "modloader");
    }

    #[test]
    fn removing_the_default_instance_clears_the_pointer() {
        let instance =
            InstanceConfig::new("srv", "1.21.1", Modloader::Quilt, Path::new("instances"));
        let mut registry = InstanceRegistry::default();
        assert!(registry.add_instance(InstanceSummary::from(&instance)));
        assert!(!registry.add_instance(InstanceSummary::from(&instance)));
        registry.default_instance = Some("srv".to_string());

        assert!(registry.remove_instance("srv"));
        assert!(registry.default_instance.is_none());
        assert!(!registry.remove_instance("srv"));
    }
}
