use std::{collections::BTreeMap, path::Path};

use serde::Deserialize;

use crate::{Modloader, ModpackSource, Result};

pub const MODRINTH_INDEX: &str = "modrinth.index.json";
pub const CURSEFORGE_MANIFEST: &str = "manifest.json";

#[derive(Deserialize)]
struct ModrinthIndex {
    #[serde(default)]
    dependencies: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct CurseForgeManifest {
    minecraft: CurseForgeMinecraft,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurseForgeMinecraft {
    #[serde(default)]
    mod_loaders: Vec<CurseForgeLoader>,
}

#[derive(Deserialize)]
struct CurseForgeLoader {
    id: String,
    #[serde(default)]
    primary: bool,
}

/// Dependency key a Modrinth index uses for `modloader`.
fn modrinth_index_key(modloader: Modloader) -> &'static str {
    match modloader {
        Modloader::Fabric => "fabric-loader",
        Modloader::Quilt => "quilt-loader",
        Modloader::Forge => "forge",
        Modloader::NeoForge => "neoforge",
    }
}

/// Reads the modloader version an extracted modpack declares for itself.
///
/// Modrinth packs list it in `modrinth.index.json` next to `minecraft`, keyed
/// by loader; an index without the instance's loader falls back to any other
/// non-minecraft entry. CurseForge packs name their primary loader
/// `<loader>-<version>` in `manifest.json`. Other sources carry no manifest
/// and yield `None`.
pub fn modloader_version(
    source: ModpackSource,
    modloader: Modloader,
    extract_path: &Path,
) -> Result<Option<String>> {
    match source {
        ModpackSource::Modrinth => {
            let text = std::fs::read_to_string(extract_path.join(MODRINTH_INDEX))?;
            let mut index: ModrinthIndex = serde_json::from_str(&text)?;
            if let Some(version) = index.dependencies.remove(modrinth_index_key(modloader)) {
                return Ok(Some(version));
            }
            Ok(index
                .dependencies
                .into_iter()
                .find(|(key, _)| !key.eq_ignore_ascii_case("minecraft"))
                .map(|(_, version)| version))
        }
        ModpackSource::CurseForge => {
            let text = std::fs::read_to_string(extract_path.join(CURSEFORGE_MANIFEST))?;
            let manifest: CurseForgeManifest = serde_json::from_str(&text)?;
            Ok(manifest
                .minecraft
                .mod_loaders
                .into_iter()
                .find(|x| x.primary)
                .map(|x| match x.id.split_once('-') {
                    Some((_, version)) => version.to_string(),
                    None => x.id,
                }))
        }
        ModpackSource::Ftb | ModpackSource::Modloader => Ok(None),
    }
}
