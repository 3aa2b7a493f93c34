// src/config.rs

use clap::Parser;
use std::{
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;
use tracing_subscriber::EnvFilter;
use url::Url;

/// Seed the relational store from a directory of CSV exports.
#[derive(Parser, Debug, Clone)]
#[command(name = "dataseed")]
#[command(about = "Load CSV exports into the target store in dependency order")]
pub struct Args {
    /// Base URL of the store's REST endpoint
    #[arg(long, env = "SEED_STORE_URL")]
    pub store_url: Option<String>,

    /// API key sent with every store request
    #[arg(long, env = "SEED_STORE_KEY", hide_env_values = true)]
    pub store_key: Option<String>,

    /// Directory holding categories.csv, clients.csv, ...
    #[arg(long, env = "SEED_SOURCE_DIR", default_value = "./data")]
    pub source_dir: PathBuf,

    /// Where to write the failure report if the run aborts
    #[arg(long, env = "SEED_FAILURE_REPORT", default_value = "./seed_failure.txt")]
    pub failure_report: PathBuf,

    /// Deadline for each individual store call, in seconds
    #[arg(long, env = "SEED_STORE_TIMEOUT_SECS", default_value_t = 30)]
    pub store_timeout_secs: u64,

    /// Run against an in-memory store instead of the real one
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("store URL is not set (--store-url or SEED_STORE_URL)")]
    MissingStoreUrl,
    #[error("store key is not set (--store-key or SEED_STORE_KEY)")]
    MissingStoreKey,
    #[error("store URL `{url}` is invalid: {reason}")]
    InvalidStoreUrl { url: String, reason: String },
    #[error("source directory `{}` does not exist", .0.display())]
    MissingSourceDir(PathBuf),
    #[error("store timeout must be greater than zero")]
    ZeroTimeout,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub url: Url,
    pub api_key: String,
}

/// Validated run configuration.
#[derive(Debug, Clone)]
pub struct SeedConfig {
    /// `None` only for dry runs.
    pub store: Option<StoreConfig>,
    pub source_dir: PathBuf,
    pub failure_report: PathBuf,
    pub store_timeout: Duration,
    pub dry_run: bool,
}

impl StoreConfig {
    /// Endpoint and credential only; the other flags are not consulted.
    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        let raw = non_empty(args.store_url.as_deref()).ok_or(ConfigError::MissingStoreUrl)?;
        let api_key = non_empty(args.store_key.as_deref()).ok_or(ConfigError::MissingStoreKey)?;
        Ok(Self {
            url: parse_store_url(&raw)?,
            api_key,
        })
    }
}

impl SeedConfig {
    pub fn from_args(args: Args) -> Result<Self, ConfigError> {
        if args.store_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if !args.source_dir.is_dir() {
            return Err(ConfigError::MissingSourceDir(args.source_dir));
        }

        let store = if args.dry_run {
            None
        } else {
            Some(StoreConfig::from_args(&args)?)
        };

        Ok(Self {
            store,
            source_dir: args.source_dir,
            failure_report: args.failure_report,
            store_timeout: Duration::from_secs(args.store_timeout_secs),
            dry_run: args.dry_run,
        })
    }
}

/// Load `.env` (the given file, or the usual lookup), then build the log
/// filter from `RUST_LOG`, falling back to `default`. Variables already set in
/// the process win over the file.
pub fn log_filter(dotenv_path: Option<&Path>, default: &str) -> EnvFilter {
    match dotenv_path {
        Some(path) => {
            dotenv::from_path(path).ok();
        }
        None => {
            dotenv::dotenv().ok();
        }
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_store_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidStoreUrl {
        url: raw.to_string(),
        reason,
    };
    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(invalid(format!("unsupported scheme `{}`", other))),
    }
}
