use clap::{Parser, Subcommand};
use colored::Colorize;
use install::InstallCommand;
use instances::{DefaultCommand, InstancesCommand, RemoveCommand};
use log::error;
use mineshell_core::config::Settings;
use mods::ModsCommand;
use versions::VersionsCommand;

mod install;
mod instances;
mod mods;
mod progress;
mod versions;

/// Install and manage modded Minecraft server instances
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Install(InstallCommand),
    Instances(InstancesCommand),
    Remove(RemoveCommand),
    Default(DefaultCommand),
    Mods(ModsCommand),
    Versions(VersionsCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    pretty_env_logger::init();

    if let Err(err) = run().await {
        error!("{} {:#}", "Error:".bright_red(), err);
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    let settings = Settings::load()?;

    match args.commands {
        Commands::Install(install) => install.run(&settings).await,
        Commands::Instances(instances) => instances.run(&settings),
        Commands::Remove(remove) => remove.run(&settings).await,
        Commands::Default(default) => default.run(&settings),
        Commands::Mods(mods) => mods.run(&settings),
        Commands::Versions(versions) => versions.run(&settings).await,
    }
}
