//! One module per subcommand

pub mod auth;
pub mod pocket_export;
pub mod pocket_tagger;
pub mod pocket_untag;
pub mod takeout;
pub mod youtube_metadata;

use crate::config::Settings;
use anyhow::{Context, Result, ensure};
use std::fs;

/// Fail early when the Pocket jobs have nothing to authenticate with
pub(crate) fn require_pocket_credentials(settings: &Settings) -> Result<()> {
    ensure!(
        settings.pocket.has_credentials(),
        "Pocket credentials are not configured; run `harvest auth` and set \
         POCKET_CONSUMER_KEY and POCKET_ACCESS_TOKEN"
    );
    Ok(())
}

pub(crate) fn ensure_data_folder(settings: &Settings) -> Result<()> {
    fs::create_dir_all(&settings.paths.data_folder).with_context(|| {
        format!(
            "Failed to create data folder {}",
            settings.paths.data_folder.display()
        )
    })
}
