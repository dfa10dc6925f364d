use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "harvest",
    version,
    about = "Incremental exports of Pocket and YouTube data to CSV"
)]
pub struct Cli {
    /// Extra configuration file layered over config/{RUN_MODE} and config/local.
    #[arg(long, global = true, env = "HARVEST_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Import watch history from the newest unprocessed Google Takeout archive.
    Takeout,

    /// Export new and changed Pocket bookmarks to CSV.
    PocketExport,

    /// Tag unread Pocket articles whose text mentions a vocabulary word.
    PocketTag,

    /// Remove automatically added tags and unfavorite the tagged items.
    PocketUntag,

    /// Fetch metadata for every video in the watch history.
    YoutubeMetadata,

    /// Obtain a Pocket access token interactively.
    Auth,
}
