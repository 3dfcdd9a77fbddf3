//! The installation pipeline: turns an unsaved [`InstanceConfig`] into a
//! populated instance directory.
//!
//! A run is linear. Each step announces itself on the step label, reports
//! step-relative progress, and polls the cancellation token between units of
//! work. Nothing is rolled back: on any outcome other than
//! [`InstallOutcome::Success`] the caller is expected to [`discard_instance`]
//! and, if it wants a retry, start over from step 1.

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use log::{debug, info, warn};
use walkdir::WalkDir;

use crate::{
    api::{
        combine_project_and_version_info, project_ids, resolvable_version_ids,
        skipped_dependencies, Dependency, ResolvedMod, SourceApi,
    },
    download::{verify_sha512, DownloadProgress, Fetcher},
    fs::{copy_tree_with_progress, extract_zip, move_dir_merge, remove_dir_if_exists, sanitize_filename},
    loaders::{LoaderRequest, ModloaderInstaller},
    models::{InstanceConfig, ModEntry},
    progress::{BarTarget, CancellationToken, LabelTarget, ProgressReporter},
    Error, ModSource, ModType, Modloader, Result,
};

pub mod pack;

pub const MODPACK_STEPS: usize = 7;
pub const MODLOADER_STEPS: usize = 3;

/// Override folders that only matter to clients.
const CLIENT_ONLY_OVERRIDES: [&str; 2] = ["resourcepacks", "shaderpacks"];

/// How a pipeline run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    Success,
    Cancelled,
    /// `step` is the 1-based step that failed.
    Failed { step: usize, message: String },
    /// Refused before any step ran.
    Rejected { message: String },
}

impl InstallOutcome {
    /// `0` success, `-1` cancelled, `-2` rejected, otherwise the failed step.
    pub fn code(&self) -> i32 {
        match self {
            Self::Success => 0,
            Self::Cancelled => -1,
            Self::Rejected { .. } => -2,
            Self::Failed { step, .. } => *step as i32,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Success => "success",
            Self::Cancelled => "cancelled",
            Self::Failed { message, .. } | Self::Rejected { message } => message,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for InstallOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed { step, message } => write!(f, "failed on step {}: {}", step, message),
            other => write!(f, "{}", other.message()),
        }
    }
}

/// Early exit from a run.
enum Halt {
    Cancelled,
    Failed { step: usize, message: String },
}

impl From<Halt> for InstallOutcome {
    fn from(halt: Halt) -> Self {
        match halt {
            Halt::Cancelled => InstallOutcome::Cancelled,
            Halt::Failed { step, message } => InstallOutcome::Failed { step, message },
        }
    }
}

type Flow<T = ()> = std::result::Result<T, Halt>;

trait AtStep<T> {
    fn at_step(self, step: usize) -> Flow<T>;
}

impl<T> AtStep<T> for Result<T> {
    fn at_step(self, step: usize) -> Flow<T> {
        self.map_err(|err| Halt::Failed {
            step,
            message: err.to_string(),
        })
    }
}

fn fail<T>(step: usize, message: impl ToString) -> Flow<T> {
    Err(Halt::Failed {
        step,
        message: message.to_string(),
    })
}

fn checkpoint(cancel: &CancellationToken) -> Flow {
    if cancel.is_cancelled() {
        debug!("Cancellation observed");
        return Err(Halt::Cancelled);
    }
    Ok(())
}

/// Default headings for the seven modpack steps.
pub fn modpack_steps(modloader: Modloader) -> [String; MODPACK_STEPS] {
    [
        "1. Downloading Modpack".to_string(),
        "2. Extracting Modpack".to_string(),
        format!("3. Installing {} Modloader", modloader.display_name()),
        "4. Copying Overrides".to_string(),
        "5. Getting Modlist".to_string(),
        "6. Downloading Mods".to_string(),
        "7. Finalizing Installation".to_string(),
    ]
}

/// Default headings for the three modloader-only steps.
pub fn modloader_steps() -> [String; MODLOADER_STEPS] {
    [
        "1. Getting Modloader installer".to_string(),
        "2. Installing Modloader".to_string(),
        "3. Finalizing Installation".to_string(),
    ]
}

/// Inputs of a modpack install besides the instance itself.
#[derive(Debug, Clone)]
pub struct ModpackJob {
    pub steps: [String; MODPACK_STEPS],
    pub dependencies: Vec<Dependency>,
    /// Already-resolved mod records; when set, step 5 skips the catalog.
    pub modlist: Option<Vec<ResolvedMod>>,
    /// Minecraft version-json URL, required by Forge and NeoForge.
    pub version_url: Option<String>,
}

/// Removes a partially created instance directory.
pub async fn discard_instance(path: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(err.into()),
        _ => Ok(()),
    }
}

pub struct Installer {
    source: Arc<dyn SourceApi>,
    loaders: Arc<dyn ModloaderInstaller>,
    fetcher: Arc<dyn Fetcher>,
    downloads_dir: PathBuf,
}

impl Installer {
    pub fn new(
        source: Arc<dyn SourceApi>,
        loaders: Arc<dyn ModloaderInstaller>,
        fetcher: Arc<dyn Fetcher>,
        downloads_dir: PathBuf,
    ) -> Self {
        Installer {
            source,
            loaders,
            fetcher,
            downloads_dir,
        }
    }

    /// Installs a modpack into `instance.path` and saves the instance.
    pub async fn install_modpack(
        &self,
        instance: &mut InstanceConfig,
        job: &ModpackJob,
        reporter: Arc<dyn ProgressReporter>,
        cancel: &CancellationToken,
    ) -> InstallOutcome {
        if instance.exists() {
            return InstallOutcome::Rejected {
                message: Error::InstanceExists(instance.instance_id.clone()).to_string(),
            };
        }

        info!("Installing modpack into {}", instance.path.display());
        match self.run_modpack(instance, job, reporter, cancel).await {
            Ok(()) => {
                info!("Instance {} created", instance.instance_id);
                InstallOutcome::Success
            }
            Err(halt) => halt.into(),
        }
    }

    /// Installs only the modloader into `instance.path` and saves the
    /// instance.
    pub async fn install_modloader(
        &self,
        instance: &mut InstanceConfig,
        steps: &[String; MODLOADER_STEPS],
        version_url: Option<&str>,
        reporter: Arc<dyn ProgressReporter>,
        cancel: &CancellationToken,
    ) -> InstallOutcome {
        if instance.exists() {
            return InstallOutcome::Rejected {
                message: Error::InstanceExists(instance.instance_id.clone()).to_string(),
            };
        }

        info!(
            "Installing {} into {}",
            instance.formatted_modloader(),
            instance.path.display()
        );
        match self
            .run_modloader(instance, steps, version_url, reporter.as_ref(), cancel)
            .await
        {
            Ok(()) => InstallOutcome::Success,
            Err(halt) => halt.into(),
        }
    }

    async fn run_modpack(
        &self,
        instance: &mut InstanceConfig,
        job: &ModpackJob,
        reporter: Arc<dyn ProgressReporter>,
        cancel: &CancellationToken,
    ) -> Flow {
        if let Err(err) = remove_dir_if_exists(&self.downloads_dir) {
            warn!("Failed to clear {}: {}", self.downloads_dir.display(), err);
        }

        let filename = sanitize_filename(&format!(
            "{}-{}",
            instance.modpack_name.as_deref().unwrap_or_default(),
            instance.modpack_version.as_deref().unwrap_or_default()
        ));
        let archive_path = self.downloads_dir.join(format!("{}.zip", filename));
        let extract_path = self.downloads_dir.join(format!("{}_temp", filename));

        // 1. Download modpack
        reporter.step(&job.steps[0], LabelTarget::Step);
        reporter.progress(100, 0, BarTarget::Overall, 0);
        reporter.progress(100, 0, BarTarget::Step, 0);
        self.download_modpack(instance, &archive_path, reporter.as_ref(), cancel)
            .await
            .at_step(1)?;
        checkpoint(cancel)?;

        // 2. Extract modpack
        reporter.step(&job.steps[1], LabelTarget::Step);
        {
            let reporter = reporter.clone();
            let cancel = cancel.clone();
            let archive_path = archive_path.clone();
            let extract_path = extract_path.clone();
            tokio::task::spawn_blocking(move || {
                extract_zip(&archive_path, &extract_path, reporter.as_ref(), 2, &cancel)
            })
            .await
            .map_err(Error::from)
            .and_then(|x| x)
            .at_step(2)?;
        }
        checkpoint(cancel)?;

        // 3. Install modloader
        reporter.step(&job.steps[2], LabelTarget::Step);
        self.install_pack_modloader(instance, job, &extract_path, reporter.as_ref(), cancel)
            .await?;
        checkpoint(cancel)?;

        // 4. Copy overrides
        reporter.step(&job.steps[3], LabelTarget::Step);
        self.copy_overrides(instance, &extract_path, reporter.clone(), cancel)
            .await
            .at_step(4)?;
        checkpoint(cancel)?;

        // 5. Resolve the mod list
        reporter.step(&job.steps[4], LabelTarget::Step);
        let modlist = self.resolve_modlist(job, reporter.as_ref(), cancel).await?;
        checkpoint(cancel)?;

        // 6. Download mods and datapacks
        reporter.step(&job.steps[5], LabelTarget::Step);
        self.download_mods(instance, &modlist, reporter.as_ref(), cancel)
            .await?;
        checkpoint(cancel)?;

        // 7. Record metadata and save
        reporter.step(&job.steps[6], LabelTarget::Step);
        self.finalize(instance, &extract_path, &modlist, reporter.as_ref(), cancel)
            .await
    }

    async fn download_modpack(
        &self,
        instance: &InstanceConfig,
        archive_path: &Path,
        reporter: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let name = instance.modpack_name.as_deref().unwrap_or(&instance.name);
        let url = instance
            .modpack_url
            .as_deref()
            .ok_or_else(|| Error::MissingMetadata {
                name: name.to_string(),
                field: "modpack url",
            })?;

        reporter.detail(&format!("Downloading {}", name));
        self.fetcher
            .download(
                url,
                archive_path,
                Some(DownloadProgress { reporter, step: 1 }),
                Some(cancel),
            )
            .await
    }

    async fn install_pack_modloader(
        &self,
        instance: &mut InstanceConfig,
        job: &ModpackJob,
        extract_path: &Path,
        reporter: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> Flow {
        const STEP: usize = 3;
        let loader_name = instance.formatted_modloader();

        reporter.step_progress(100, 0, STEP);
        reporter.detail("Getting version info");
        if let Some(version) =
            pack::modloader_version(instance.modpack_source, instance.modloader, extract_path)
                .at_step(STEP)?
        {
            instance.modloader_version = Some(version);
        }
        tokio::fs::create_dir_all(&instance.path)
            .await
            .map_err(Error::from)
            .at_step(STEP)?;
        reporter.step_progress(100, 25, STEP);

        reporter.detail(&format!("Checking for {} installer", loader_name));
        let request = LoaderRequest {
            modloader: instance.modloader,
            minecraft_version: instance.minecraft_version.clone(),
            loader_version: instance.modloader_version.clone(),
            version_url: job.version_url.clone(),
        };
        let installer = self.loaders.ensure_installer(&request).await.at_step(STEP)?;
        reporter.step_progress(100, 50, STEP);
        checkpoint(cancel)?;

        reporter.detail(&format!("Running {} installer", loader_name));
        self.run_loader(&request, &installer, &instance.path, STEP)
            .await?;
        reporter.step_progress(100, 100, STEP);

        Ok(())
    }

    /// Runs the installer, mapping a missing version manifest URL or a
    /// non-zero exit code to a failure of `step`.
    async fn run_loader(
        &self,
        request: &LoaderRequest,
        installer: &Path,
        target_dir: &Path,
        step: usize,
    ) -> Flow {
        if request.modloader.needs_version_manifest() && request.version_url.is_none() {
            warn!(
                "{} needs a Minecraft version manifest URL",
                request.modloader.display_name()
            );
            return fail(step, -1);
        }
        let code = self
            .loaders
            .run_installer(request, installer, target_dir)
            .await
            .at_step(step)?;
        if code != 0 {
            return fail(step, code);
        }
        Ok(())
    }

    async fn copy_overrides(
        &self,
        instance: &InstanceConfig,
        extract_path: &Path,
        reporter: Arc<dyn ProgressReporter>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        const STEP: usize = 4;

        reporter.detail("Removing client only overrides");
        // server-overrides is layered on top of overrides
        for layer in ["overrides", "server-overrides"] {
            let layer_path = extract_path.join(layer);
            if !layer_path.exists() {
                continue;
            }
            for folder in CLIENT_ONLY_OVERRIDES {
                remove_dir_if_exists(layer_path.join(folder))?;
            }

            let worker_reporter = reporter.clone();
            let worker_cancel = cancel.clone();
            let instance_path = instance.path.clone();
            let copied = tokio::task::spawn_blocking(move || {
                copy_tree_with_progress(
                    &layer_path,
                    &instance_path,
                    worker_reporter.as_ref(),
                    STEP,
                    &worker_cancel,
                )
            })
            .await??;
            debug!("Copied {} files from {}", copied, layer);

            if cancel.is_cancelled() {
                return Ok(());
            }
        }

        let datapacks = instance.path.join("datapacks");
        if datapacks.exists() {
            reporter.detail("Moving Datapacks into 'world' Folder");
            move_dir_merge(&datapacks, &instance.dir_for(ModType::Datapack))?;
        }

        Ok(())
    }

    async fn resolve_modlist(
        &self,
        job: &ModpackJob,
        reporter: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> Flow<Vec<ResolvedMod>> {
        const STEP: usize = 5;
        reporter.step_progress(100, 0, STEP);

        let modlist = match &job.modlist {
            Some(modlist) => {
                reporter.detail("Getting Modlist");
                modlist.clone()
            }
            None => {
                reporter.detail("Getting Project Ids");
                let projects = self
                    .source
                    .fetch_projects(&project_ids(&job.dependencies), true)
                    .await
                    .at_step(STEP)?;
                reporter.step_progress(100, 33, STEP);
                checkpoint(cancel)?;

                reporter.detail("Getting Version Ids");
                let versions = self
                    .source
                    .fetch_versions(&resolvable_version_ids(&job.dependencies, &projects))
                    .await
                    .at_step(STEP)?;
                reporter.step_progress(100, 66, STEP);
                checkpoint(cancel)?;

                reporter.detail("Getting Mod Info");
                let modlist = combine_project_and_version_info(&projects, &versions);
                for skipped in skipped_dependencies(&job.dependencies, &modlist) {
                    warn!(
                        "Skipping dependency {} ({}): not available for servers",
                        skipped.project_id.as_deref().unwrap_or("?"),
                        skipped.version_id.as_deref().unwrap_or("?")
                    );
                }
                modlist
            }
        };

        reporter.step_progress(100, 100, STEP);
        Ok(modlist)
    }

    async fn download_mods(
        &self,
        instance: &InstanceConfig,
        modlist: &[ResolvedMod],
        reporter: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> Flow {
        const STEP: usize = 6;
        let total = modlist.len() as u64;
        reporter.step_progress(total, 0, STEP);

        let mods = modlist.iter().filter(|x| x.mod_type == ModType::Mod);
        let datapacks = modlist.iter().filter(|x| x.mod_type == ModType::Datapack);

        for (done, resolved) in mods.chain(datapacks).enumerate() {
            reporter.detail(&format!("Downloading {}", resolved.display_name()));
            self.download_mod(instance, resolved, cancel)
                .await
                .at_step(STEP)?;
            checkpoint(cancel)?;
            reporter.step_progress(total, done as u64 + 1, STEP);
        }

        Ok(())
    }

    async fn download_mod(
        &self,
        instance: &InstanceConfig,
        resolved: &ResolvedMod,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let missing = |field| Error::MissingMetadata {
            name: resolved.display_name().to_string(),
            field,
        };
        let url = resolved
            .download_url
            .as_deref()
            .ok_or_else(|| missing("download url"))?;
        let file_name = resolved
            .file_name
            .as_deref()
            .ok_or_else(|| missing("file name"))?;

        let dest = instance.dir_for(resolved.mod_type).join(file_name);
        self.fetcher.download(url, &dest, None, Some(cancel)).await?;
        if cancel.is_cancelled() {
            return Ok(());
        }
        if let Some(hash) = &resolved.sha512 {
            verify_sha512(&dest, hash).await?;
        }
        Ok(())
    }

    async fn finalize(
        &self,
        instance: &mut InstanceConfig,
        extract_path: &Path,
        modlist: &[ResolvedMod],
        reporter: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> Flow {
        const STEP: usize = 7;
        let total = modlist.len() as u64 + 30;
        let source = ModSource::from(instance.modpack_source);
        reporter.step_progress(total, 0, STEP);

        reporter.detail("Adding Overrides to Metadata");
        for layer in ["overrides", "server-overrides"] {
            let overrides = extract_path.join(layer);
            for jar in files_with_extension(&overrides.join("mods"), "jar") {
                instance
                    .mods
                    .add(ModEntry::from_override(&jar, ModType::Mod, source));
            }
            checkpoint(cancel)?;

            for folder in WalkDir::new(&overrides)
                .into_iter()
                .filter_map(|x| x.ok())
                .filter(|x| x.file_type().is_dir() && x.file_name() == "datapacks")
            {
                for zip in files_with_extension(folder.path(), "zip") {
                    instance
                        .mods
                        .add(ModEntry::from_override(&zip, ModType::Datapack, source));
                }
            }
        }
        reporter.step_progress(total, 10, STEP);
        checkpoint(cancel)?;

        reporter.detail("Removing Downloads");
        remove_dir_if_exists(&self.downloads_dir)
            .map_err(Error::from)
            .at_step(STEP)?;
        reporter.step_progress(total, 20, STEP);

        reporter.detail("Adding Mods to Metadata");
        for (done, resolved) in modlist.iter().enumerate() {
            instance
                .mods
                .add(ModEntry::from_resolved(resolved, source, true));
            reporter.step_progress(total, 20 + done as u64 + 1, STEP);
        }

        reporter.detail("Saving Metadata");
        instance.save().at_step(STEP)?;
        reporter.step_progress(total, total, STEP);

        Ok(())
    }

    async fn run_modloader(
        &self,
        instance: &mut InstanceConfig,
        steps: &[String; MODLOADER_STEPS],
        version_url: Option<&str>,
        reporter: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> Flow {
        let loader_name = instance.formatted_modloader();

        // 1. Get the installer
        reporter.step(&steps[0], LabelTarget::Step);
        reporter.progress(100, 0, BarTarget::Step, 0);
        reporter.progress(100, 0, BarTarget::Overall, 0);
        reporter.detail("Getting Modloader info");
        tokio::fs::create_dir_all(&instance.path)
            .await
            .map_err(Error::from)
            .at_step(1)?;
        reporter.progress(100, 50, BarTarget::Step, 1);

        reporter.detail(&format!("Checking for {} installer", loader_name));
        let request = LoaderRequest {
            modloader: instance.modloader,
            minecraft_version: instance.minecraft_version.clone(),
            loader_version: instance.modloader_version.clone(),
            version_url: version_url.map(String::from),
        };
        let installer = self.loaders.ensure_installer(&request).await.at_step(1)?;
        reporter.progress(100, 100, BarTarget::Step, 1);
        reporter.progress(100, 33, BarTarget::Overall, 0);
        checkpoint(cancel)?;

        // 2. Run it
        reporter.step(&steps[1], LabelTarget::Step);
        reporter.detail(&format!("Running {} installer", loader_name));
        self.run_loader(&request, &installer, &instance.path, 2)
            .await?;
        reporter.progress(100, 100, BarTarget::Step, 2);
        reporter.progress(100, 66, BarTarget::Overall, 0);
        checkpoint(cancel)?;

        // 3. Save
        reporter.step(&steps[2], LabelTarget::Step);
        instance.save().at_step(3)?;
        reporter.progress(100, 100, BarTarget::Overall, 0);

        Ok(())
    }
}

/// Names of the files directly inside `dir` with the given extension, sorted.
fn files_with_extension(dir: &Path, extension: &str) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|x| x.ok())
        .map(|x| x.path())
        .filter(|x| x.is_file() && x.extension().is_some_and(|ext| ext == extension))
        .filter_map(|x| x.file_name().map(|name| name.to_string_lossy().to_string()))
        .collect();
    names.sort();
    names
}
