//! Undo the tagger: drop sentinel tags and unfavorite

use super::require_pocket_credentials;
use crate::clients::pocket::GetQuery;
use crate::clients::{PocketAction, PocketClient};
use crate::config::Settings;
use anyhow::{Result, bail};
use harvest_core::tagging::strip_automated;
use harvest_core::text::field_or;
use serde_json::Value;
use std::collections::BTreeSet;
use tokio::time::sleep;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UntagReport {
    pub rounds: usize,
    pub items: usize,
}

fn cleanup_actions(item: &Value) -> Vec<PocketAction> {
    let item_id = field_or(item, "item_id", "");
    if item_id.is_empty() {
        warn!("Skipping favorited item without an id");
        return Vec::new();
    }
    let kept = match item.get("tags") {
        Some(Value::Object(tags)) => strip_automated(tags.keys()),
        _ => Vec::new(),
    };
    vec![
        PocketAction::TagsReplace {
            item_id: item_id.clone(),
            tags: kept.join(","),
        },
        PocketAction::Unfavorite { item_id },
    ]
}

pub async fn run(settings: &Settings, client: PocketClient) -> Result<UntagReport> {
    require_pocket_credentials(settings)?;
    let pause = settings.pocket.pause();
    let mut report = UntagReport::default();
    let mut previous: BTreeSet<String> = BTreeSet::new();

    loop {
        let items = client.get(&GetQuery::unread(true)).await?;
        if items.is_empty() {
            break;
        }

        let ids: BTreeSet<String> = items.iter().map(|i| field_or(i, "item_id", "")).collect();
        if ids == previous {
            bail!(
                "Pocket still reports the same {} favorited items after unfavoriting them",
                ids.len()
            );
        }

        let actions: Vec<PocketAction> = items.iter().flat_map(cleanup_actions).collect();
        if actions.is_empty() {
            break;
        }
        client.send(&actions).await?;
        info!("Processed {} items: Updated tags and unfavorited.", items.len());

        report.rounds += 1;
        report.items += items.len();
        previous = ids;
        if !pause.is_zero() {
            sleep(pause).await;
        }
    }

    info!(rounds = report.rounds, items = report.items, "Cleanup finished");
    Ok(report)
}
