use anyhow::anyhow;
use clap::Args;
use mineshell_core::{config::Settings, mojang::VersionManifest};
use reqwest::Client;

/// List Minecraft releases
#[derive(Args, Debug)]
pub struct VersionsCommand {
    /// Only show the newest N releases
    #[arg(short = 'l', long, default_value_t = 20)]
    limit: usize,
}

impl VersionsCommand {
    pub async fn run(&self, settings: &Settings) -> anyhow::Result<()> {
        let client = Client::builder()
            .user_agent(settings.user_agent.clone())
            .build()?;
        let manifest = VersionManifest::load(&client, &settings.manifest_cache)
            .await
            .ok_or_else(|| anyhow!("Minecraft version manifest is unavailable"))?;

        for version in manifest.releases().into_iter().take(self.limit) {
            println!(
                "{:<10} {}",
                version.id,
                version.release_time.as_deref().unwrap_or_default()
            );
        }
        Ok(())
    }
}
