use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{config::Settings, Error, ModType, Result, SourceKind};

pub mod modrinth;

pub use modrinth::ModrinthApi;

/// `{project_id, version_id}` pair from a modpack's dependency list.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub version_id: Option<String>,
}

impl Dependency {
    pub fn new(project_id: &str, version_id: &str) -> Self {
        Dependency {
            project_id: Some(project_id.to_string()),
            version_id: Some(version_id.to_string()),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProjectRecord {
    pub id: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub loaders: Vec<String>,
    #[serde(default)]
    pub server_side: Option<String>,
}

impl ProjectRecord {
    /// Modrinth marks server support as `required`, `optional`, `unsupported`
    /// or `unknown`; only `unsupported` is excluded.
    pub fn is_server_compatible(&self) -> bool {
        matches!(
            self.server_side.as_deref(),
            Some("required" | "optional" | "unknown")
        )
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VersionFile {
    pub filename: String,
    pub url: String,
    #[serde(default)]
    pub hashes: HashMap<String, String>,
    #[serde(default)]
    pub primary: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VersionRecord {
    pub id: String,
    pub project_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version_number: Option<String>,
    #[serde(default)]
    pub date_published: Option<String>,
    #[serde(default)]
    pub files: Vec<VersionFile>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    #[serde(default)]
    pub game_versions: Vec<String>,
    #[serde(default)]
    pub loaders: Vec<String>,
}

/// A dependency joined with its project and version metadata.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ResolvedMod {
    pub project_id: String,
    pub version_id: String,
    pub slug: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub version_number: Option<String>,
    pub date_published: Option<String>,
    pub file_name: Option<String>,
    pub download_url: Option<String>,
    #[serde(default)]
    pub sha512: Option<String>,
    pub loaders: Vec<String>,
    #[serde(rename = "type")]
    pub mod_type: ModType,
}

impl ResolvedMod {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.project_id)
    }
}

/// Catalog capability the installer resolves dependencies through.
#[async_trait]
pub trait SourceApi: Send + Sync {
    /// Project records keyed by id. With `filter_server_side`, projects that
    /// cannot run on a server are left out.
    async fn fetch_projects(
        &self,
        project_ids: &[String],
        filter_server_side: bool,
    ) -> Result<HashMap<String, ProjectRecord>>;

    async fn fetch_versions(&self, version_ids: &[String]) -> Result<Vec<VersionRecord>>;

    /// Resolves a dependency list straight to downloadable records.
    async fn get_modlist(&self, dependencies: &[Dependency]) -> Result<Vec<ResolvedMod>> {
        let projects = self
            .fetch_projects(&project_ids(dependencies), true)
            .await?;
        if projects.is_empty() {
            return Ok(Vec::new());
        }
        let versions = self
            .fetch_versions(&resolvable_version_ids(dependencies, &projects))
            .await?;
        Ok(combine_project_and_version_info(&projects, &versions))
    }
}

/// Catalog client for a source kind. Only Modrinth has one.
pub fn source_api(kind: SourceKind, settings: &Settings) -> Result<Arc<dyn SourceApi>> {
    match kind {
        SourceKind::Modrinth => Ok(Arc::new(ModrinthApi::new(settings)?)),
        SourceKind::CurseForge => Err(Error::UnsupportedSource(kind.to_string())),
    }
}

pub fn project_ids(dependencies: &[Dependency]) -> Vec<String> {
    dependencies
        .iter()
        .filter_map(|x| x.project_id.clone())
        .filter(|x| !x.is_empty())
        .collect()
}

/// Version ids of the dependencies whose project survived the fetch.
pub fn resolvable_version_ids(
    dependencies: &[Dependency],
    projects: &HashMap<String, ProjectRecord>,
) -> Vec<String> {
    dependencies
        .iter()
        .filter(|x| {
            x.project_id
                .as_ref()
                .is_some_and(|id| projects.contains_key(id))
        })
        .filter_map(|x| x.version_id.clone())
        .collect()
}

/// Joins each version with its owning project, in version order. Versions
/// whose project is missing (filtered out or never fetched) are dropped.
pub fn combine_project_and_version_info(
    projects: &HashMap<String, ProjectRecord>,
    versions: &[VersionRecord],
) -> Vec<ResolvedMod> {
    versions
        .iter()
        .filter_map(|version| {
            let project = projects.get(&version.project_id)?;
            let file = version.files.first();
            let is_datapack = project.loaders.iter().any(|x| x == "datapack");
            Some(ResolvedMod {
                project_id: version.project_id.clone(),
                version_id: version.id.clone(),
                slug: project.slug.clone(),
                name: project.title.clone(),
                description: project.description.clone(),
                version_number: version.version_number.clone(),
                date_published: version.date_published.clone(),
                file_name: file.map(|x| x.filename.clone()),
                download_url: file.map(|x| x.url.clone()),
                sha512: file.and_then(|x| x.hashes.get("sha512").cloned()),
                loaders: project.loaders.clone(),
                mod_type: if is_datapack {
                    ModType::Datapack
                } else {
                    ModType::Mod
                },
            })
        })
        .collect()
}

/// Dependencies that did not make it into `modlist`.
pub fn skipped_dependencies<'a>(
    dependencies: &'a [Dependency],
    modlist: &[ResolvedMod],
) -> Vec<&'a Dependency> {
    let resolved: HashSet<&str> = modlist.iter().map(|x| x.version_id.as_str()).collect();
    dependencies
        .iter()
        .filter(|x| {
            x.version_id
                .as_deref()
                .map_or(true, |id| !resolved.contains(id))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(id: &str, loaders: &[&str], server_side: &str) -> ProjectRecord {
        ProjectRecord {
            id: id.to_string(),
            slug: Some(id.to_lowercase()),
            title: Some(format!("Project {}", id)),
            description: None,
            loaders: loaders.iter().map(|x| x.to_string()).collect(),
            server_side: Some(server_side.to_string()),
        }
    }

    fn version(id: &str, project_id: &str) -> VersionRecord {
        VersionRecord {
            id: id.to_string(),
            project_id: project_id.to_string(),
            name: None,
            version_number: Some(format!("{}-1.0", id)),
            date_published: Some("2024-01-01T00:00:00Z".to_string()),
            files: vec![VersionFile {
                filename: format!("{}.jar", id),
                url: format!("https://cdn.example/{}.jar", id),
                hashes: HashMap::new(),
                primary: false,
            }],
            dependencies: Vec::new(),
            game_versions: Vec::new(),
            loaders: Vec::new(),
        }
    }

    #[test]
    fn only_modrinth_has_a_catalog_client() {
        let settings = Settings::default();
        assert!(source_api(SourceKind::Modrinth, &settings).is_ok());
        assert!(matches!(
            source_api(SourceKind::CurseForge, &settings),
            Err(Error::UnsupportedSource(_))
        ));
    }

    #[test]
    fn join_drops_versions_without_a_project() {
        let projects = HashMap::from([("A".to_string(), project("A", &["fabric"], "required"))]);
        let versions = vec![version("v1", "A"), version("v2", "B")];

        let modlist = combine_project_and_version_info(&projects, &versions);

        assert_eq!(modlist.len(), 1);
        assert_eq!(modlist[0].project_id, "A");
        assert_eq!(modlist[0].file_name.as_deref(), Some("v1.jar"));
        assert_eq!(modlist[0].mod_type, ModType::Mod);
    }

    #[test]
    fn join_types_datapack_loaders_as_datapacks() {
        let projects = HashMap::from([(
            "D".to_string(),
            project("D", &["datapack", "fabric"], "optional"),
        )]);
        let modlist = combine_project_and_version_info(&projects, &[version("v9", "D")]);
        assert_eq!(modlist[0].mod_type, ModType::Datapack);
    }

    #[test]
    fn version_ids_only_for_fetched_projects() {
        let deps = vec![Dependency::new("A", "v1"), Dependency::new("B", "v2")];
        let projects = HashMap::from([("A".to_string(), project("A", &[], "required"))]);
        assert_eq!(resolvable_version_ids(&deps, &projects), vec!["v1".to_string()]);
    }

    #[test]
    fn skipped_dependencies_lists_what_the_join_dropped() {
        let deps = vec![Dependency::new("A", "v1"), Dependency::new("B", "v2")];
        let projects = HashMap::from([("A".to_string(), project("A", &[], "required"))]);
        let modlist =
            combine_project_and_version_info(&projects, &[version("v1", "A"), version("v2", "B")]);

        let skipped = skipped_dependencies(&deps, &modlist);
        assert_eq!(skipped, vec![&deps[1]]);
    }

    #[test]
    fn unsupported_projects_are_not_server_compatible() {
        assert!(project("A", &[], "unknown").is_server_compatible());
        assert!(!project("A", &[], "unsupported").is_server_compatible());
    }
}
