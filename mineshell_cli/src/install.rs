use std::sync::Arc;

use anyhow::anyhow;
use clap::{Args, Subcommand};
use colored::Colorize;
use log::{error, info, warn};
use mineshell_core::{
    api::{source_api, Dependency, ModrinthApi, VersionRecord},
    config::Settings,
    download::HttpFetcher,
    installer::{discard_instance, modloader_steps, modpack_steps, InstallOutcome, Installer, ModpackJob},
    loaders::JavaInstallers,
    models::{InstanceConfig, InstanceRegistry, InstanceSummary},
    mojang,
    progress::CancellationToken,
    ModpackSource, Modloader,
};
use reqwest::Client;

use crate::progress::BarReporter;

/// Install a new server instance
#[derive(Args, Debug)]
pub struct InstallCommand {
    #[command(subcommand)]
    target: InstallTarget,
}

#[derive(Subcommand, Debug)]
enum InstallTarget {
    /// Install a Modrinth modpack
    Modpack(ModpackArgs),
    /// Install a bare modloader server
    Loader(LoaderArgs),
}

#[derive(Args, Debug)]
struct ModpackArgs {
    /// Modrinth project id or slug
    project: String,

    /// Version number or id, defaults to the newest version
    #[arg(short = 'v', long)]
    version: Option<String>,

    /// Instance name, defaults to the modpack title
    #[arg(short = 'n', long)]
    name: Option<String>,

    /// How many times to start over after a failed install
    #[arg(short = 'r', long, default_value_t = 0)]
    retries: u32,
}

#[derive(Args, Debug)]
struct LoaderArgs {
    /// fabric, forge, neoforge or quilt
    loader: String,

    /// Minecraft version
    #[arg(long)]
    mc: String,

    /// Modloader version, required for forge and neoforge
    #[arg(short = 'l', long)]
    loader_version: Option<String>,

    /// Instance name
    #[arg(short = 'n', long)]
    name: String,

    /// How many times to start over after a failed install
    #[arg(short = 'r', long, default_value_t = 0)]
    retries: u32,
}

/// What a single attempt is asked to install.
enum Plan {
    Modpack(ModpackJob),
    Modloader { version_url: Option<String> },
}

impl InstallCommand {
    pub async fn run(&self, settings: &Settings) -> anyhow::Result<()> {
        let client = Client::builder()
            .user_agent(settings.user_agent.clone())
            .build()?;

        let (template, plan, retries) = match &self.target {
            InstallTarget::Modpack(args) => {
                let (instance, job) = prepare_modpack(settings, &client, args).await?;
                (instance, Plan::Modpack(job), args.retries)
            }
            InstallTarget::Loader(args) => {
                let (instance, version_url) = prepare_modloader(settings, &client, args).await?;
                (instance, Plan::Modloader { version_url }, args.retries)
            }
        };

        let mut registry = InstanceRegistry::load(&settings.instances_dir)?;
        if template.exists() || registry.contains(&template.instance_id) {
            return Err(anyhow!(
                "Instance '{}' already exists",
                template.instance_id
            ));
        }
        // leftovers of an unfinished install
        discard_instance(&template.path).await?;

        let fetcher = Arc::new(HttpFetcher::new(client.clone()));
        let installer = Installer::new(
            source_api(template.source_api, settings)?,
            Arc::new(JavaInstallers::new(
                settings.java.clone(),
                settings.installers_dir.clone(),
                client.clone(),
                fetcher.clone(),
            )),
            fetcher,
            settings.downloads_dir.clone(),
        );

        let cancel = CancellationToken::new();
        tokio::spawn({
            let cancel = cancel.clone();
            async move {
                while tokio::signal::ctrl_c().await.is_ok() {
                    if interrupt(&cancel) {
                        warn!("Forcing exit");
                        std::process::exit(130);
                    }
                    warn!("Cancelling installation... press Ctrl-C again to force quit");
                }
            }
        });

        let mut attempt = 0;
        loop {
            let mut instance = template.clone();
            let outcome = run_attempt(&installer, &mut instance, &plan, &cancel).await?;

            match outcome {
                InstallOutcome::Success => {
                    registry.add_instance(InstanceSummary::from(&instance));
                    registry.save(&settings.instances_dir)?;
                    info!(
                        "Instance {} successfully created in {}",
                        instance.name.bold(),
                        instance.path.display()
                    );
                    return Ok(());
                }
                InstallOutcome::Rejected { message } => return Err(anyhow!(message)),
                InstallOutcome::Cancelled => {
                    discard_instance(&instance.path).await?;
                    info!("{}", "Installation cancelled".yellow());
                    return Ok(());
                }
                InstallOutcome::Failed { step, message } => {
                    discard_instance(&instance.path).await?;
                    error!(
                        "{} on step {}: {}",
                        "Installation failed".bright_red(),
                        step,
                        message
                    );
                    if attempt >= retries {
                        return Err(anyhow!("Installation failed on step {}", step));
                    }
                    attempt += 1;
                    info!("Retrying ({}/{})", attempt, retries);
                }
            }
        }
    }
}

async fn run_attempt(
    installer: &Installer,
    instance: &mut InstanceConfig,
    plan: &Plan,
    cancel: &CancellationToken,
) -> anyhow::Result<InstallOutcome> {
    let outcome = match plan {
        Plan::Modpack(job) => {
            let reporter = Arc::new(BarReporter::for_modpack()?);
            let outcome = installer
                .install_modpack(instance, job, reporter.clone(), cancel)
                .await;
            finish_bars(&reporter, &outcome);
            outcome
        }
        Plan::Modloader { version_url } => {
            let reporter = Arc::new(BarReporter::for_modloader()?);
            let outcome = installer
                .install_modloader(
                    instance,
                    &modloader_steps(),
                    version_url.as_deref(),
                    reporter.clone(),
                    cancel,
                )
                .await;
            finish_bars(&reporter, &outcome);
            outcome
        }
    };
    Ok(outcome)
}

/// Cancels on the first interrupt; returns true once a second one arrives,
/// meaning the user wants out immediately.
fn interrupt(cancel: &CancellationToken) -> bool {
    if cancel.is_cancelled() {
        return true;
    }
    cancel.cancel();
    false
}

fn finish_bars(reporter: &BarReporter, outcome: &InstallOutcome) {
    if outcome.is_success() {
        reporter.finish();
    } else {
        reporter.abandon();
    }
}

fn pick_version(versions: Vec<VersionRecord>, wanted: Option<&str>) -> Option<VersionRecord> {
    match wanted {
        Some(wanted) => versions
            .into_iter()
            .find(|x| x.id == wanted || x.version_number.as_deref() == Some(wanted)),
        None => versions.into_iter().next(),
    }
}

async fn prepare_modpack(
    settings: &Settings,
    client: &Client,
    args: &ModpackArgs,
) -> anyhow::Result<(InstanceConfig, ModpackJob)> {
    let api = ModrinthApi::with_client(client.clone(), &settings.modrinth_url);
    let project = api
        .get_project(&args.project)
        .await?
        .ok_or_else(|| anyhow!("Modpack '{}' not found", args.project))?;
    let versions = api.get_modpack_versions(&project.id).await?;
    let version = pick_version(versions, args.version.as_deref())
        .ok_or_else(|| anyhow!("No matching version of {}", project.title))?;

    let modloader: Modloader = version
        .loaders
        .first()
        .ok_or_else(|| anyhow!("{} lists no modloader", project.title))?
        .parse()?;
    let minecraft_version = version
        .game_versions
        .first()
        .ok_or_else(|| anyhow!("{} lists no Minecraft version", project.title))?;
    let modpack_url = version
        .files
        .iter()
        .find(|x| x.primary)
        .or(version.files.first())
        .map(|x| x.url.clone())
        .ok_or_else(|| anyhow!("{} has no downloadable file", project.title))?;

    let name = args.name.clone().unwrap_or_else(|| project.title.clone());
    let mut instance = InstanceConfig::new(
        &name,
        minecraft_version,
        modloader,
        &settings.instances_dir,
    );
    instance.modpack_name = Some(project.title.clone());
    instance.modpack_id = Some(project.slug.clone());
    instance.modpack_url = Some(modpack_url);
    instance.modpack_version = version.version_number.clone();
    instance.modpack_date = version
        .date_published
        .as_deref()
        .and_then(|x| x.parse().ok());
    instance.modpack_source = ModpackSource::Modrinth;

    let version_url = if modloader.needs_version_manifest() {
        Some(mojang::version_url(client, &settings.manifest_cache, minecraft_version).await?)
    } else {
        None
    };

    let dependencies: Vec<Dependency> = version
        .dependencies
        .into_iter()
        .filter(|x| x.project_id.is_some() && x.version_id.is_some())
        .collect();
    info!(
        "Installing {} {} ({} {}, Minecraft {}) with {} dependencies",
        project.title.bold(),
        instance.modpack_version.as_deref().unwrap_or_default(),
        modloader.display_name(),
        instance.modloader_version.as_deref().unwrap_or("latest"),
        minecraft_version,
        dependencies.len()
    );

    let job = ModpackJob {
        steps: modpack_steps(modloader),
        dependencies,
        modlist: None,
        version_url,
    };
    Ok((instance, job))
}

async fn prepare_modloader(
    settings: &Settings,
    client: &Client,
    args: &LoaderArgs,
) -> anyhow::Result<(InstanceConfig, Option<String>)> {
    let modloader: Modloader = args.loader.parse()?;
    if modloader.needs_version_manifest() && args.loader_version.is_none() {
        return Err(anyhow!(
            "{} needs --loader-version",
            modloader.display_name()
        ));
    }

    let version_url = mojang::version_url(client, &settings.manifest_cache, &args.mc).await?;
    let mut instance =
        InstanceConfig::new(&args.name, &args.mc, modloader, &settings.instances_dir);
    instance.modloader_version = args.loader_version.clone();

    Ok((instance, Some(version_url)))
}
