//! Auto-tagging of unread bookmarks
//!
//! Each round pulls a batch of unread, unfavorited items, marks every item with a
//! usable URL as favorite (the "already seen" flag), downloads its article text and
//! adds sentinel tags for every vocabulary word it contains. Items without a usable
//! URL stay in the listing, so later pages are requested past them. Rounds repeat
//! until a page comes back empty.

use super::require_pocket_credentials;
use crate::clients::pocket::GetQuery;
use crate::clients::{ArticleFetcher, HttpArticleFetcher, PocketAction, PocketClient};
use crate::config::Settings;
use anyhow::{Context, Result};
use harvest_core::tagging::load_vocabulary;
use harvest_core::text::field_or;
use harvest_core::{RetryConfig, RetryPolicy, TagMatcher};
use reqwest::Url;
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagReport {
    pub rounds: usize,
    pub items: usize,
    pub tagged: usize,
}

/// Absolute http(s)-style URL with a host, or `None`
fn usable_url(item: &Value) -> Option<String> {
    let raw = item.get("resolved_url")?.as_str()?.trim();
    let url = Url::parse(raw).ok()?;
    let has_host = url.host_str().is_some_and(|h| !h.is_empty());
    (!url.scheme().is_empty() && has_host).then(|| raw.to_string())
}

#[derive(Default)]
struct Round {
    actions: Vec<PocketAction>,
    skipped: usize,
}

pub struct Tagger<A> {
    client: PocketClient,
    articles: A,
    matcher: TagMatcher,
    retry: RetryPolicy,
    batch_size: usize,
    pause: Duration,
}

impl<A: ArticleFetcher> Tagger<A> {
    pub fn new(
        client: PocketClient,
        articles: A,
        matcher: TagMatcher,
        settings: &Settings,
    ) -> Self {
        Self {
            client,
            articles,
            matcher,
            retry: RetryPolicy::new(RetryConfig {
                max_attempts: settings.articles.max_attempts,
                delay: settings.articles.retry_delay(),
            }),
            batch_size: settings.pocket.tagger_batch_size,
            pause: settings.pocket.pause(),
        }
    }

    /// Article text, or empty text once the retries are exhausted
    async fn article_text(&self, url: &str) -> String {
        match self
            .retry
            .execute("Article extraction", || self.articles.fetch_text(url))
            .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!(url, "Failed to extract text: {}", e);
                String::new()
            },
        }
    }

    /// Actions for one item: favorite it, plus `tags_add` when anything matched
    async fn plan(&self, item: &Value) -> Vec<PocketAction> {
        let item_id = field_or(item, "item_id", "");
        let Some(url) = usable_url(item) else {
            return Vec::new();
        };
        if item_id.is_empty() {
            return Vec::new();
        }
        info!("Processing {}", url);

        let mut actions = vec![PocketAction::Favorite {
            item_id: item_id.clone(),
        }];
        let matched = self.matcher.matching_tags(&self.article_text(&url).await);
        if !matched.is_empty() {
            let tags = matched.into_iter().collect::<Vec<_>>().join(",");
            info!(item_id = %item_id, "Found tags: {}", tags);
            actions.push(PocketAction::TagsAdd { item_id, tags });
        }
        actions
    }

    /// One page of the listing starting at `offset`, or `None` once the listing is
    /// exhausted. Items that produced no action stay in the listing and are counted
    /// in `skipped` so the next page starts after them.
    async fn round(&self, offset: usize) -> harvest_core::Result<Option<Round>> {
        let query = GetQuery {
            offset: Some(offset),
            ..GetQuery::unread(false).with_count(self.batch_size)
        };
        let items = self.client.get(&query).await?;
        info!("Fetched {} items", items.len());
        if items.is_empty() {
            info!("No more items to process");
            return Ok(None);
        }

        let mut round = Round::default();
        for item in &items {
            let planned = self.plan(item).await;
            if planned.is_empty() {
                round.skipped += 1;
            }
            round.actions.extend(planned);
        }
        if round.actions.is_empty() {
            info!(
                "No taggable items in this batch, moving past {} items",
                round.skipped
            );
        } else {
            self.client.send(&round.actions).await?;
        }
        Ok(Some(round))
    }

    /// Run rounds until done. A failing round is logged and ends the run.
    pub async fn run(&self) -> TagReport {
        let mut report = TagReport::default();
        let mut offset = 0;
        loop {
            match self.round(offset).await {
                Ok(Some(round)) => {
                    offset += round.skipped;
                    if round.actions.is_empty() {
                        continue;
                    }
                    report.rounds += 1;
                    for action in &round.actions {
                        match action {
                            PocketAction::Favorite { .. } => report.items += 1,
                            PocketAction::TagsAdd { .. } => report.tagged += 1,
                            _ => {},
                        }
                    }
                    if !self.pause.is_zero() {
                        sleep(self.pause).await;
                    }
                },
                Ok(None) => break,
                Err(e) => {
                    error!("Error processing batch: {}", e);
                    break;
                },
            }
        }
        report
    }
}

pub async fn run(
    settings: &Settings,
    client: PocketClient,
    http: reqwest::Client,
) -> Result<TagReport> {
    require_pocket_credentials(settings)?;

    let tags_path = settings.tags_csv();
    let vocabulary = load_vocabulary(&tags_path)
        .with_context(|| format!("Failed to load tags from {}", tags_path.display()))?;
    info!("Loaded {} tags", vocabulary.len());

    let matcher = TagMatcher::new(&vocabulary)?;
    let articles = HttpArticleFetcher::new(http, settings.articles.timeout())?;
    let tagger = Tagger::new(client, articles, matcher, settings);
    let report = tagger.run().await;
    info!(
        rounds = report.rounds,
        items = report.items,
        tagged = report.tagged,
        "Tagging finished"
    );
    Ok(report)
}
