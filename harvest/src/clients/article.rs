//! Article download and plain-text extraction for the tagger

use super::{ensure_success, transport_error};
use async_trait::async_trait;
use harvest_core::Result;
use harvest_core::text::clean_text;
use regex::{Regex, RegexBuilder};
use std::time::Duration;

const SERVICE: &str = "article";

const HIDDEN_BLOCKS: &str = r"<(script|style|noscript)\b[^>]*>.*?</(script|style|noscript)\s*>";

/// Source of lowercase article text for a URL
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArticleFetcher: Send + Sync {
    async fn fetch_text(&self, url: &str) -> Result<String>;
}

/// Strips markup from an HTML page
#[derive(Debug, Clone)]
pub struct HtmlText {
    hidden_blocks: Regex,
    comments: Regex,
    tags: Regex,
}

impl HtmlText {
    pub fn new() -> Result<Self> {
        Ok(Self {
            hidden_blocks: RegexBuilder::new(HIDDEN_BLOCKS)
                .case_insensitive(true)
                .dot_matches_new_line(true)
                .build()?,
            comments: RegexBuilder::new(r"<!--.*?-->")
                .dot_matches_new_line(true)
                .build()?,
            tags: Regex::new(r"<[^>]*>")?,
        })
    }

    /// Visible text, entities decoded, whitespace collapsed, lowercased
    pub fn extract(&self, html: &str) -> String {
        let text = self.hidden_blocks.replace_all(html, " ");
        let text = self.comments.replace_all(&text, " ");
        let text = self.tags.replace_all(&text, " ");
        clean_text(&decode_entities(&text)).to_lowercase()
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        // last, so "&amp;lt;" stays "&lt;"
        .replace("&amp;", "&")
}

/// Plain GET of the article page
pub struct HttpArticleFetcher {
    http: reqwest::Client,
    timeout: Duration,
    html: HtmlText,
}

impl HttpArticleFetcher {
    pub fn new(http: reqwest::Client, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http,
            timeout,
            html: HtmlText::new()?,
        })
    }
}

#[async_trait]
impl ArticleFetcher for HttpArticleFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self
            .http
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(transport_error(SERVICE))?;
        let body = ensure_success(SERVICE, response)
            .await?
            .text()
            .await
            .map_err(transport_error(SERVICE))?;
        Ok(self.html.extract(&body))
    }
}
