use anyhow::anyhow;
use clap::{Args, Subcommand};
use colored::Colorize;
use log::info;
use mineshell_core::{
    config::Settings,
    models::{InstanceConfig, InstanceRegistry},
};

/// Manage the mods and datapacks of an instance
#[derive(Args, Debug)]
pub struct ModsCommand {
    /// Instance id
    instance: String,

    #[command(subcommand)]
    action: ModsAction,
}

#[derive(Subcommand, Debug)]
enum ModsAction {
    /// List mods and datapacks
    List,
    /// Enable a disabled mod
    Enable { mod_id: String },
    /// Disable a mod
    Disable { mod_id: String },
    /// Flip a mod between enabled and disabled
    Toggle { mod_id: String },
    /// Delete a mod and its file
    Remove { mod_id: String },
}

impl ModsCommand {
    pub fn run(&self, settings: &Settings) -> anyhow::Result<()> {
        let registry = InstanceRegistry::load(&settings.instances_dir)?;
        let mut instance = match registry.get_instance(&self.instance)? {
            Some(instance) => instance,
            None => InstanceConfig::load(&settings.instances_dir.join(&self.instance))?,
        };

        let (mod_id, changed, verb) = match &self.action {
            ModsAction::List => {
                for row in instance.mods.to_rows(&settings.date_format) {
                    let enabled = if row["enabled"] == "true" {
                        "on ".green()
                    } else {
                        "off".red()
                    };
                    println!(
                        "{} {:<8} {:<40} {:<24} {:<10} {}",
                        enabled,
                        row["type"],
                        row["name"].bold(),
                        row["version"],
                        row["source"],
                        row["filename"].dimmed()
                    );
                }
                return Ok(());
            }
            ModsAction::Enable { mod_id } => {
                (mod_id, instance.mods.enable(mod_id, &instance.path), "enable")
            }
            ModsAction::Disable { mod_id } => {
                (mod_id, instance.mods.disable(mod_id, &instance.path), "disable")
            }
            ModsAction::Toggle { mod_id } => {
                (mod_id, instance.mods.toggle(mod_id, &instance.path), "toggle")
            }
            ModsAction::Remove { mod_id } => {
                (mod_id, instance.mods.remove(mod_id, &instance.path), "remove")
            }
        };

        if !changed {
            return Err(anyhow!("Could not {} {}", verb, mod_id));
        }
        instance.save_mods()?;
        info!("{} {}d", mod_id.bold(), verb);
        Ok(())
    }
}
