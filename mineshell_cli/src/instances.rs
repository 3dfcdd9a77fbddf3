use anyhow::anyhow;
use clap::Args;
use colored::Colorize;
use log::{info, warn};
use mineshell_core::{config::Settings, installer::discard_instance, models::InstanceRegistry};

/// List installed instances
#[derive(Args, Debug)]
pub struct InstancesCommand {}

impl InstancesCommand {
    pub fn run(&self, settings: &Settings) -> anyhow::Result<()> {
        let registry = InstanceRegistry::load(&settings.instances_dir)?;
        if registry.instances.is_empty() {
            println!("No instances installed yet");
            return Ok(());
        }

        for summary in registry.instances.iter() {
            let marker = if registry.default_instance.as_deref() == Some(summary.instance_id.as_str()) {
                "*".green().to_string()
            } else {
                " ".to_string()
            };
            println!(
                "{} {:<24} {:<28} {:<9} {:<8} {:<12} {}",
                marker,
                summary.instance_id.bold(),
                summary.name,
                summary.formatted_modloader(),
                summary.minecraft_version.as_deref().unwrap_or_default(),
                summary.pack_version.as_deref().unwrap_or("-"),
                summary.formatted_date(&settings.date_format).dimmed()
            );
        }
        Ok(())
    }
}

/// Delete an instance and its files
#[derive(Args, Debug)]
pub struct RemoveCommand {
    /// Instance id
    instance: String,
}

impl RemoveCommand {
    pub async fn run(&self, settings: &Settings) -> anyhow::Result<()> {
        let mut registry = InstanceRegistry::load(&settings.instances_dir)?;
        let path = registry
            .summary(&self.instance)
            .and_then(|x| x.path.clone())
            .unwrap_or_else(|| settings.instances_dir.join(&self.instance));

        if !registry.remove_instance(&self.instance) {
            warn!("{} is not in the registry", self.instance);
        }
        registry.save(&settings.instances_dir)?;
        discard_instance(&path).await?;
        info!("Removed {}", self.instance.bold());
        Ok(())
    }
}

/// Set the default instance
#[derive(Args, Debug)]
pub struct DefaultCommand {
    /// Instance id
    instance: String,
}

impl DefaultCommand {
    pub fn run(&self, settings: &Settings) -> anyhow::Result<()> {
        let mut registry = InstanceRegistry::load(&settings.instances_dir)?;
        if !registry.contains(&self.instance) {
            return Err(anyhow!("Unknown instance '{}'", self.instance));
        }
        registry.set_default_instance(&self.instance, &settings.instances_dir)?;
        Ok(())
    }
}
