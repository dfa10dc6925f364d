use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod clients;
mod config;
mod jobs;
#[cfg(test)]
mod test_support;

use crate::cli::{Cli, Commands};
use crate::clients::{PocketClient, YouTubeClient, http_client};
use crate::config::Settings;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let http = http_client(&settings.http).context("Failed to build HTTP client")?;

    match cli.command {
        Commands::Takeout => {
            let report = jobs::takeout::run(&settings).await?;
            info!(fetched = report.fetched, written = report.normalized, "Takeout import done");
        },
        Commands::PocketExport => {
            let client = PocketClient::new(http, &settings.pocket);
            let report = jobs::pocket_export::run(&settings, client).await?;
            info!(fetched = report.fetched, written = report.normalized, "Pocket export done");
        },
        Commands::PocketTag => {
            let client = PocketClient::new(http.clone(), &settings.pocket);
            jobs::pocket_tagger::run(&settings, client, http).await?;
        },
        Commands::PocketUntag => {
            let client = PocketClient::new(http, &settings.pocket);
            jobs::pocket_untag::run(&settings, client).await?;
        },
        Commands::YoutubeMetadata => {
            let client = YouTubeClient::new(http, &settings.youtube);
            let report = jobs::youtube_metadata::run(&settings, client).await?;
            info!(fetched = report.fetched, written = report.normalized, "Metadata update done");
        },
        Commands::Auth => jobs::auth::run(&settings, http).await?,
    }

    Ok(())
}
