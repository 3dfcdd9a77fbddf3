use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize};

use crate::{
    api::{ProjectRecord, SourceApi, VersionRecord},
    config::Settings,
    Result,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

pub struct ModrinthApi {
    client: Client,
    base_url: String,
}

/// Project fields needed to pick a modpack to install.
#[derive(Deserialize, Debug, Clone)]
pub struct ModpackProject {
    pub id: String,
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub project_type: Option<String>,
}

impl ModrinthApi {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .user_agent(settings.user_agent.clone())
            .build()?;
        Ok(ModrinthApi::with_client(client, &settings.modrinth_url))
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        ModrinthApi {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// GETs `endpoint`. A timed-out request yields `None` rather than an error.
    async fn request<T>(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        debug!("Modrinth request {} {:?}", endpoint, params);
        let response = self
            .client
            .get(format!("{}/{}", self.base_url, endpoint))
            .query(params)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await;

        let response = match response {
            Ok(response) => response.error_for_status()?,
            Err(err) if err.is_timeout() => {
                warn!("Modrinth request {} timed out", endpoint);
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        match response.json::<T>().await {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_timeout() => {
                warn!("Modrinth response for {} timed out", endpoint);
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn get_project(&self, id_or_slug: &str) -> Result<Option<ModpackProject>> {
        self.request(&format!("project/{}", id_or_slug), &[]).await
    }

    /// Every version of a modpack, newest first.
    pub async fn get_modpack_versions(&self, id_or_slug: &str) -> Result<Vec<VersionRecord>> {
        let mut versions: Vec<VersionRecord> = self
            .request(&format!("project/{}/version", id_or_slug), &[])
            .await?
            .unwrap_or_default();
        // RFC 3339 timestamps sort lexically
        versions.sort_by(|a, b| b.date_published.cmp(&a.date_published));
        Ok(versions)
    }
}

#[async_trait]
impl SourceApi for ModrinthApi {
    async fn fetch_projects(
        &self,
        project_ids: &[String],
        filter_server_side: bool,
    ) -> Result<HashMap<String, ProjectRecord>> {
        if project_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let projects: Vec<ProjectRecord> = self
            .request("projects", &[("ids", serde_json::to_string(project_ids)?)])
            .await?
            .unwrap_or_default();

        Ok(projects
            .into_iter()
            .filter(|x| !filter_server_side || x.is_server_compatible())
            .map(|x| (x.id.clone(), x))
            .collect())
    }

    async fn fetch_versions(&self, version_ids: &[String]) -> Result<Vec<VersionRecord>> {
        if version_ids.is_empty() {
            return Ok(Vec::new());
        }

        Ok(self
            .request("versions", &[("ids", serde_json::to_string(version_ids)?)])
            .await?
            .unwrap_or_default())
    }
}
