//! Interactive helper that obtains a Pocket access token

use crate::clients::PocketAuth;
use crate::clients::pocket::authorization_url;
use crate::config::Settings;
use anyhow::{Context, Result, ensure};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

const OPENERS: [&str; 2] = ["xdg-open", "open"];

const INSTRUCTIONS: &str = "Pocket Authentication Helper
--------------------------------------------------

First, you need a consumer key. If you don't have one:
1. Go to https://getpocket.com/developer/
2. Click 'Create New App'
3. Fill out the form (Platform: 'Desktop'; Permissions: 'Retrieve')
4. Submit the form and copy the consumer key
";

/// Platform command that opens a URL in the default browser, if installed
fn browser_opener() -> Option<PathBuf> {
    OPENERS.iter().find_map(|cmd| which::which(cmd).ok())
}

fn open_in_browser(url: &str) {
    let Some(opener) = browser_opener() else {
        debug!("No browser opener found on PATH");
        return;
    };
    match std::process::Command::new(&opener)
        .arg(url)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(_) => debug!(opener = %opener.display(), "Opened authorization page"),
        Err(e) => warn!("Failed to launch {}: {}", opener.display(), e),
    }
}

async fn prompt<R, W>(input: &mut R, output: &mut W, message: &str) -> Result<String>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    output.write_all(message.as_bytes()).await?;
    output.flush().await?;
    let mut line = String::new();
    input.read_line(&mut line).await?;
    Ok(line.trim().to_string())
}

/// The export lines printed once the exchange succeeded
pub fn export_lines(consumer_key: &str, access_token: &str) -> String {
    format!(
        "export POCKET_CONSUMER_KEY='{consumer_key}'\nexport POCKET_ACCESS_TOKEN='{access_token}'\n"
    )
}

/// Run the handshake over arbitrary input/output streams
pub async fn authenticate<R, W>(
    settings: &Settings,
    http: reqwest::Client,
    input: &mut R,
    output: &mut W,
    launch_browser: bool,
) -> Result<(String, String)>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    output.write_all(INSTRUCTIONS.as_bytes()).await?;
    let mut consumer_key = prompt(input, output, "\nEnter your consumer key: ").await?;
    if consumer_key.is_empty() {
        consumer_key = settings.pocket.consumer_key.trim().to_string();
    }
    ensure!(!consumer_key.is_empty(), "A consumer key is required");

    let auth = PocketAuth::new(http, &settings.pocket.api_base, consumer_key.clone());
    info!("Getting request token...");
    let request_token = auth
        .request_token()
        .await
        .context("Failed to obtain a request token")?;

    let url = authorization_url(&settings.pocket.authorize_url, &request_token);
    output
        .write_all(
            format!(
                "\nOpen this page, log in to Pocket and authorize the application:\n{url}\n"
            )
            .as_bytes(),
        )
        .await?;
    if launch_browser {
        open_in_browser(&url);
    }
    prompt(
        input,
        output,
        "\nPress Enter after you've authorized the application: ",
    )
    .await?;

    info!("Getting access token...");
    let access_token = auth
        .access_token(&request_token)
        .await
        .context("Failed to exchange the request token")?;

    output
        .write_all(
            format!(
                "\nSuccess! To use these credentials, set:\n\n{}",
                export_lines(&consumer_key, &access_token)
            )
            .as_bytes(),
        )
        .await?;
    output.flush().await?;
    Ok((consumer_key, access_token))
}

pub async fn run(settings: &Settings, http: reqwest::Client) -> Result<()> {
    let mut stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    authenticate(settings, http, &mut stdin, &mut stdout, true).await?;
    Ok(())
}
