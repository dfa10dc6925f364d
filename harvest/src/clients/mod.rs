//! HTTP clients for the remote services
//!
//! Clients speak `harvest_core::SyncError` so the sources and jobs built on them can
//! tell remote failures apart from local ones.

pub mod article;
pub mod pocket;
pub mod youtube;

pub use article::{ArticleFetcher, HttpArticleFetcher};
pub use pocket::{PocketAction, PocketAuth, PocketClient, PocketPager};
pub use youtube::YouTubeClient;

use crate::config::HttpConfig;
use harvest_core::SyncError;
use std::time::Duration;

const MAX_ERROR_BODY: usize = 512;

/// Shared client for every job in a run
pub fn http_client(config: &HttpConfig) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .user_agent(concat!("harvest/", env!("CARGO_PKG_VERSION")))
        .build()
}

pub(crate) fn transport_error(service: &'static str) -> impl Fn(reqwest::Error) -> SyncError {
    move |e| SyncError::Transport {
        service,
        message: e.to_string(),
    }
}

/// Pass successful responses through; turn anything else into `SyncError::Api`.
///
/// Pocket reports the reason in `X-Error` rather than the body, so that header wins
/// when present.
pub(crate) async fn ensure_success(
    service: &'static str,
    response: reqwest::Response,
) -> harvest_core::Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let header = response
        .headers()
        .get("X-Error")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let mut body = match header {
        Some(reason) => reason,
        None => response.text().await.unwrap_or_default(),
    };
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }

    Err(SyncError::Api {
        service,
        status: status.as_u16(),
        body,
    })
}
