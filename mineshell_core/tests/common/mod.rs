#![allow(dead_code)]

use std::{
    collections::HashMap,
    io::Write,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use mineshell_core::{
    api::{Dependency, ProjectRecord, SourceApi, VersionFile, VersionRecord},
    download::{DownloadProgress, Fetcher},
    installer::Installer,
    loaders::{LoaderRequest, ModloaderInstaller},
    progress::{BarTarget, CancellationToken, LabelTarget, ProgressReporter},
    Error, Result,
};
use sha2::{Digest, Sha512};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

pub const PACK_URL: &str = "https://cdn.example/pack.mrpack";

/// Scratch layout shared by the pipeline tests.
pub struct Workspace {
    pub tmp: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Workspace {
            tmp: tempfile::tempdir().unwrap(),
        }
    }

    pub fn instances_dir(&self) -> PathBuf {
        self.tmp.path().join("instances")
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.tmp.path().join("downloads")
    }

    pub fn installer(
        &self,
        source: FakeSource,
        loaders: FakeLoaders,
        fetcher: FakeFetcher,
    ) -> Installer {
        Installer::new(
            Arc::new(source),
            Arc::new(loaders),
            Arc::new(fetcher),
            self.downloads_dir(),
        )
    }
}

/// Builds an in-memory zip archive from `(name, contents)` pairs. Names
/// ending in `/` become directories.
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, contents) in entries {
        if name.ends_with('/') {
            writer.add_directory(*name, options).unwrap();
        } else {
            writer.start_file(*name, options).unwrap();
            writer.write_all(contents).unwrap();
        }
    }
    writer.finish().unwrap().into_inner()
}

pub fn sha512_hex(data: &[u8]) -> String {
    Sha512::digest(data)
        .iter()
        .map(|x| format!("{:02x}", x))
        .collect()
}

/// Serves fixed bytes per URL. Unknown URLs fail like a 404.
#[derive(Default)]
pub struct FakeFetcher {
    files: HashMap<String, Vec<u8>>,
    cancel_on: Option<(String, CancellationToken)>,
    pub requested: Arc<Mutex<Vec<String>>>,
}

impl FakeFetcher {
    pub fn with(mut self, url: &str, data: impl Into<Vec<u8>>) -> Self {
        self.files.insert(url.to_string(), data.into());
        self
    }

    /// Triggers `token` as soon as `url` is requested, as if the user hit
    /// Ctrl-C mid-download.
    pub fn cancel_on(mut self, url: &str, token: CancellationToken) -> Self {
        self.cancel_on = Some((url.to_string(), token));
        self
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn download(
        &self,
        url: &str,
        dest: &Path,
        progress: Option<DownloadProgress<'_>>,
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        self.requested.lock().unwrap().push(url.to_string());
        if let Some((trigger, token)) = &self.cancel_on {
            if trigger == url {
                token.cancel();
            }
        }
        if cancel.is_some_and(|x| x.is_cancelled()) {
            return Ok(());
        }

        let data = self.files.get(url).ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("404 for {}", url),
            ))
        })?;
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(dest, data)?;
        if let Some(progress) = progress {
            let len = data.len() as u64;
            progress.reporter.step_progress(len, len, progress.step);
        }
        Ok(())
    }
}

/// Catalog backed by fixed project and version records.
#[derive(Default)]
pub struct FakeSource {
    projects: Vec<ProjectRecord>,
    versions: Vec<VersionRecord>,
    pub calls: Arc<Mutex<usize>>,
}

impl FakeSource {
    /// Adds a project with a single version whose file is served at
    /// `https://cdn.example/<filename>`.
    pub fn with_project(
        mut self,
        project_id: &str,
        version_id: &str,
        filename: &str,
        server_side: &str,
        loaders: &[&str],
        sha512: Option<String>,
    ) -> Self {
        self.projects.push(ProjectRecord {
            id: project_id.to_string(),
            slug: Some(project_id.to_lowercase()),
            title: Some(format!("Project {}", project_id)),
            description: None,
            loaders: loaders.iter().map(|x| x.to_string()).collect(),
            server_side: Some(server_side.to_string()),
        });
        self.versions.push(VersionRecord {
            id: version_id.to_string(),
            project_id: project_id.to_string(),
            name: None,
            version_number: Some(format!("{}-1.0.0", project_id.to_lowercase())),
            date_published: Some("2024-03-01T10:00:00Z".to_string()),
            files: vec![VersionFile {
                filename: filename.to_string(),
                url: file_url(filename),
                hashes: sha512
                    .into_iter()
                    .map(|x| ("sha512".to_string(), x))
                    .collect(),
                primary: true,
            }],
            dependencies: Vec::new(),
            game_versions: vec!["1.20.1".to_string()],
            loaders: loaders.iter().map(|x| x.to_string()).collect(),
        });
        self
    }
}

pub fn file_url(filename: &str) -> String {
    format!("https://cdn.example/{}", filename)
}

#[async_trait]
impl SourceApi for FakeSource {
    async fn fetch_projects(
        &self,
        project_ids: &[String],
        filter_server_side: bool,
    ) -> Result<HashMap<String, ProjectRecord>> {
        *self.calls.lock().unwrap() += 1;
        Ok(self
            .projects
            .iter()
            .filter(|x| project_ids.contains(&x.id))
            .filter(|x| !filter_server_side || x.is_server_compatible())
            .map(|x| (x.id.clone(), x.clone()))
            .collect())
    }

    async fn fetch_versions(&self, version_ids: &[String]) -> Result<Vec<VersionRecord>> {
        *self.calls.lock().unwrap() += 1;
        Ok(self
            .versions
            .iter()
            .filter(|x| version_ids.contains(&x.id))
            .cloned()
            .collect())
    }
}

pub fn dependencies(pairs: &[(&str, &str)]) -> Vec<Dependency> {
    pairs.iter().map(|(p, v)| Dependency::new(p, v)).collect()
}

/// Installer that writes a placeholder server jar and exits with a fixed code.
pub struct FakeLoaders {
    installer: PathBuf,
    exit_code: i32,
    pub requests: Arc<Mutex<Vec<LoaderRequest>>>,
}

impl FakeLoaders {
    pub fn exiting_with(installer: PathBuf, exit_code: i32) -> Self {
        FakeLoaders {
            installer,
            exit_code,
            requests: Arc::default(),
        }
    }
}

#[async_trait]
impl ModloaderInstaller for FakeLoaders {
    async fn ensure_installer(&self, request: &LoaderRequest) -> Result<PathBuf> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(self.installer.clone())
    }

    async fn run_installer(
        &self,
        _request: &LoaderRequest,
        _installer: &Path,
        target_dir: &Path,
    ) -> Result<i32> {
        std::fs::create_dir_all(target_dir)?;
        std::fs::write(target_dir.join("server.jar"), b"jar")?;
        Ok(self.exit_code)
    }
}

/// Keeps every label update and the last bar value per target.
#[derive(Default)]
pub struct RecordingReporter {
    pub steps: Mutex<Vec<String>>,
    pub details: Mutex<Vec<String>>,
    pub last_step_bar: Mutex<Option<(u64, u64, usize)>>,
}

impl RecordingReporter {
    pub fn steps(&self) -> Vec<String> {
        self.steps.lock().unwrap().clone()
    }
}

impl ProgressReporter for RecordingReporter {
    fn step(&self, text: &str, target: LabelTarget) {
        match target {
            LabelTarget::Step => self.steps.lock().unwrap().push(text.to_string()),
            LabelTarget::Detail => self.details.lock().unwrap().push(text.to_string()),
        }
    }

    fn progress(&self, total: u64, progress: u64, target: BarTarget, step: usize) {
        if target == BarTarget::Step {
            *self.last_step_bar.lock().unwrap() = Some((total, progress, step));
        }
    }
}
