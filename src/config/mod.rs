use crate::models::{DateRange, Ticker};
use crate::pipeline::FailurePolicy;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub download: DownloadConfig,
}

/// Market data provider (HTTP) configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// What to download and where to put it
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloadConfig {
    #[serde(default = "default_tickers")]
    pub tickers: Vec<String>,

    #[serde(default = "default_start_date")]
    pub start_date: NaiveDate,

    #[serde(default = "default_end_date")]
    pub end_date: NaiveDate,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default)]
    pub on_error: FailurePolicy,
}

/// A validated download request, ready for the pipeline.
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub tickers: Vec<Ticker>,
    pub range: DateRange,
    pub output_dir: PathBuf,
    pub on_error: FailurePolicy,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_base_url() -> String {
    "https://query2.finance.yahoo.com".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko)".to_string()
}
fn default_tickers() -> Vec<String> {
    ["NVDA", "MSFT", "GOOG", "AAPL", "^IXIC"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 7, 1).unwrap_or_default()
}
fn default_end_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 4, 30).unwrap_or_default()
}
fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            tickers: default_tickers(),
            start_date: default_start_date(),
            end_date: default_end_date(),
            output_dir: default_output_dir(),
            on_error: FailurePolicy::default(),
        }
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from optional files + `STOCKDL__*` environment overrides.
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::Environment::with_prefix("STOCKDL")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("download.tickers"),
            )
            .build()
            .context("Failed to read configuration sources")?;

        cfg.try_deserialize().context("Invalid configuration")
    }
}

impl DownloadConfig {
    /// Validate tickers and dates into a [`DownloadJob`].
    pub fn job(&self) -> Result<DownloadJob> {
        let tickers = self
            .tickers
            .iter()
            .map(|raw| Ticker::parse(raw))
            .collect::<Result<Vec<_>, _>>()
            .context("Invalid ticker list")?;

        let range = DateRange::new(self.start_date, self.end_date)?;

        Ok(DownloadJob {
            tickers,
            range,
            output_dir: self.output_dir.clone(),
            on_error: self.on_error,
        })
    }
}
