use serde::{Deserialize, Serialize};

pub mod api;
pub mod config;
pub mod download;
pub mod error;
pub mod fs;
pub mod installer;
pub mod loaders;
pub mod models;
pub mod mojang;
pub mod progress;

pub use error::{Error, Result};

/// Stable string form of an enum, matching its serde name.
pub trait StrConversion {
    fn as_str(&self) -> &'static str;
}

macro_rules! display_via_str {
    ($($ty:ty),* $(,)?) => {
        $(
            impl std::fmt::Display for $ty {
                fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
                    write!(fmt, "{}", self.as_str())
                }
            }
        )*
    };
}

display_via_str!(
    Modloader,
    ModSource,
    ModType,
    ModpackSource,
    SourceKind,
    InstanceStatus,
    UpdateDisabledMods,
    DowngradeBehavior,
);

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum Modloader {
    Fabric,
    Forge,
    NeoForge,
    Quilt,
}

impl Modloader {
    pub const ALL: [Modloader; 4] = [Self::Fabric, Self::Forge, Self::NeoForge, Self::Quilt];

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Fabric => "Fabric",
            Self::Forge => "Forge",
            Self::NeoForge => "NeoForge",
            Self::Quilt => "Quilt",
        }
    }

    /// Forge-style installers only lay down the loader; the vanilla server jar
    /// has to be fetched through the version manifest afterwards.
    pub fn needs_version_manifest(&self) -> bool {
        matches!(self, Self::Forge | Self::NeoForge)
    }
}

impl StrConversion for Modloader {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Fabric => "fabric",
            Self::Forge => "forge",
            Self::NeoForge => "neoforge",
            Self::Quilt => "quilt",
        }
    }
}

impl std::str::FromStr for Modloader {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        Modloader::ALL
            .into_iter()
            .find(|loader| loader.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| Error::UnsupportedModloader(value.to_string()))
    }
}

/// Where an installed file came from.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum ModSource {
    Modrinth,
    CurseForge,
    Ftb,
    Local,
}

impl StrConversion for ModSource {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Modrinth => "modrinth",
            Self::CurseForge => "curseforge",
            Self::Ftb => "ftb",
            Self::Local => "local",
        }
    }
}

impl From<ModpackSource> for ModSource {
    fn from(source: ModpackSource) -> Self {
        match source {
            ModpackSource::Modrinth => Self::Modrinth,
            ModpackSource::CurseForge => Self::CurseForge,
            ModpackSource::Ftb => Self::Ftb,
            ModpackSource::Modloader => Self::Local,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum ModType {
    Mod,
    Datapack,
}

impl ModType {
    /// Directory, relative to the instance root, holding files of this type.
    pub fn install_dir(&self) -> std::path::PathBuf {
        match self {
            Self::Mod => std::path::PathBuf::from("mods"),
            Self::Datapack => std::path::Path::new("world").join("datapacks"),
        }
    }
}

impl StrConversion for ModType {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Mod => "mod",
            Self::Datapack => "datapack",
        }
    }
}

/// Provenance of an instance: the catalog its modpack came from, or
/// `Modloader` for a bare loader install.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModpackSource {
    Modrinth,
    CurseForge,
    Ftb,
    #[default]
    Modloader,
}

impl StrConversion for ModpackSource {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Modrinth => "modrinth",
            Self::CurseForge => "curseforge",
            Self::Ftb => "ftb",
            Self::Modloader => "modloader",
        }
    }
}

/// Catalog used to browse for additional mods.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Modrinth,
    CurseForge,
}

impl StrConversion for SourceKind {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Modrinth => "modrinth",
            Self::CurseForge => "curseforge",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    #[default]
    Stopped,
    Running,
    Starting,
}

impl StrConversion for InstanceStatus {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Running => "running",
            Self::Starting => "starting",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "snake_case")]
pub enum UpdateDisabledMods {
    #[default]
    UpdateKeepDisabled,
    SkipUpdate,
    UpdateEnable,
}

impl StrConversion for UpdateDisabledMods {
    fn as_str(&self) -> &'static str {
        match self {
            Self::UpdateKeepDisabled => "update_keep_disabled",
            Self::SkipUpdate => "skip_update",
            Self::UpdateEnable => "update_enable",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum DowngradeBehavior {
    #[default]
    Ask,
    Keep,
    Downgrade,
}

impl StrConversion for DowngradeBehavior {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Ask => "ask",
            Self::Keep => "keep",
            Self::Downgrade => "downgrade",
        }
    }
}
