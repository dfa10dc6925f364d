use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    pub paths: PathsConfig,
    pub pocket: PocketConfig,
    pub youtube: YouTubeConfig,
    #[serde(default)]
    pub articles: ArticleConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PathsConfig {
    pub data_folder: PathBuf,
    pub takeout_dir: PathBuf,
    pub metadata_cache: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PocketConfig {
    #[serde(default)]
    pub consumer_key: String,
    #[serde(default)]
    pub access_token: String,
    pub api_base: String,
    pub authorize_url: String,
    pub page_size: usize,
    pub tagger_batch_size: usize,
    pub pause_ms: u64,
    pub bookmarks_file: String,
    pub tags_file: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct YouTubeConfig {
    #[serde(default)]
    pub api_key: String,
    pub api_base: String,
    pub batch_size: usize,
    pub pause_ms: u64,
    pub history_file: String,
    pub metadata_file: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ArticleConfig {
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    pub timeout_seconds: u64,
}

impl Default for ArticleConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_ms: 1000,
            timeout_seconds: 20,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HttpConfig {
    pub timeout_seconds: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_seconds: 30 }
    }
}

fn home_path(relative: &str) -> String {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(relative)
        .to_string_lossy()
        .into_owned()
}

impl Settings {
    /// Layered settings: defaults, `config/{RUN_MODE}`, `config/local`, an optional
    /// explicit file, `HARVEST__*` variables, then the conventional credential variables.
    pub fn load(extra_file: Option<&Path>) -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let mut builder = Config::builder()
            .set_default("paths.data_folder", home_path("harvest-data"))?
            .set_default(
                "paths.takeout_dir",
                home_path("Dropbox/Apps/Google Download Your Data"),
            )?
            .set_default("paths.metadata_cache", home_path("youtube_metadata_cache.json"))?
            .set_default("pocket.api_base", "https://getpocket.com/v3")?
            .set_default("pocket.authorize_url", "https://getpocket.com/auth/authorize")?
            .set_default("pocket.page_size", 30)?
            .set_default("pocket.tagger_batch_size", 30)?
            .set_default("pocket.pause_ms", 1000)?
            .set_default("pocket.bookmarks_file", "pocket_items.csv")?
            .set_default("pocket.tags_file", "pocket_tags.csv")?
            .set_default("youtube.api_base", "https://www.googleapis.com/youtube/v3")?
            .set_default("youtube.batch_size", 50)?
            .set_default("youtube.pause_ms", 100)?
            .set_default("youtube.history_file", "youtube_history.csv")?
            .set_default("youtube.metadata_file", "youtube_metadata.csv")?
            .set_default("articles.max_attempts", 3)?
            .set_default("articles.retry_delay_ms", 1000)?
            .set_default("articles.timeout_seconds", 20)?
            .set_default("http.timeout_seconds", 30)?
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(File::with_name("config/local").required(false));

        if let Some(path) = extra_file {
            builder = builder.add_source(File::from(path));
        }

        let s = builder
            .add_source(
                Environment::with_prefix("HARVEST")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("pocket.consumer_key", env::var("POCKET_CONSUMER_KEY").ok())?
            .set_override_option("pocket.access_token", env::var("POCKET_ACCESS_TOKEN").ok())?
            .set_override_option("youtube.api_key", env::var("GOOGLE_API_KEY").ok())?
            .set_override_option("paths.data_folder", env::var("HARVEST_DATA_FOLDER").ok())?
            .build()?;

        s.try_deserialize()
    }

    pub fn data_file(&self, name: &str) -> PathBuf {
        self.paths.data_folder.join(name)
    }

    pub fn bookmarks_csv(&self) -> PathBuf {
        self.data_file(&self.pocket.bookmarks_file)
    }

    pub fn tags_csv(&self) -> PathBuf {
        self.data_file(&self.pocket.tags_file)
    }

    pub fn history_csv(&self) -> PathBuf {
        self.data_file(&self.youtube.history_file)
    }

    pub fn metadata_csv(&self) -> PathBuf {
        self.data_file(&self.youtube.metadata_file)
    }

    pub fn processed_takeouts(&self) -> PathBuf {
        self.paths.takeout_dir.join("processed_takeouts.json")
    }
}

impl PocketConfig {
    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }

    pub fn has_credentials(&self) -> bool {
        !self.consumer_key.trim().is_empty() && !self.access_token.trim().is_empty()
    }
}

impl YouTubeConfig {
    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }
}

impl ArticleConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[cfg(test)]
impl Settings {
    /// Everything under `root`, remote services at `base_url`, no pauses
    pub fn for_test(root: &Path, base_url: &str) -> Self {
        Self {
            paths: PathsConfig {
                data_folder: root.join("data"),
                takeout_dir: root.join("takeout"),
                metadata_cache: root.join("youtube_metadata_cache.json"),
            },
            pocket: PocketConfig {
                consumer_key: "consumer".to_string(),
                access_token: "token".to_string(),
                api_base: base_url.to_string(),
                authorize_url: format!("{base_url}/auth/authorize"),
                page_size: 2,
                tagger_batch_size: 30,
                pause_ms: 0,
                bookmarks_file: "pocket_items.csv".to_string(),
                tags_file: "pocket_tags.csv".to_string(),
            },
            youtube: YouTubeConfig {
                api_key: "yt-key".to_string(),
                api_base: base_url.to_string(),
                batch_size: 2,
                pause_ms: 0,
                history_file: "youtube_history.csv".to_string(),
                metadata_file: "youtube_metadata.csv".to_string(),
            },
            articles: ArticleConfig {
                max_attempts: 2,
                retry_delay_ms: 0,
                timeout_seconds: 5,
            },
            http: HttpConfig::default(),
        }
    }
}
