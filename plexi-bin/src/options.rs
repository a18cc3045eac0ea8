//! Command-line arguments and the optional TOML configuration file.
//!
//! Precedence is command line over configuration file over built-in
//! defaults.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use url::Url;

use crate::verbosity::Verbosity;

/// Configuration file picked up from the working directory when no
/// `--config` is given.
pub(crate) const PLEXI_CONFIG_FILE: &str = "plexi.toml";

#[derive(Parser, Debug)]
#[command(
    name = "plexi",
    version,
    about = "An unofficial command-line client for the Perplexity.ai answer engine"
)]
pub(crate) struct PlexiOptions {
    /// Configuration file to use
    #[arg(short, long = "config", value_name = "CONFIG_FILE")]
    pub(crate) config_file: Option<PathBuf>,

    #[command(flatten)]
    pub(crate) verbose: Verbosity,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Submit a query and stream the answer
    Query(QueryArgs),
    /// Store an API token for subsequent commands
    Auth(AuthArgs),
    /// Remove the stored API token
    Logout,
    /// Show whether a usable token is stored
    Status,
    /// Export the account's thread history to CSV
    Threads(ThreadsArgs),
}

#[derive(clap::Args, Debug)]
pub(crate) struct QueryArgs {
    /// The question to ask
    pub(crate) query: String,

    /// Output format for the answer
    #[arg(short, long, value_enum)]
    pub(crate) format: Option<OutputFormat>,

    /// Do not print cited web sources after the answer
    #[arg(long)]
    pub(crate) no_references: bool,

    /// Restrict search results by recency
    #[arg(long, value_name = "day|week|month|year")]
    pub(crate) recency: Option<String>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECONDS")]
    pub(crate) timeout: Option<u64>,

    /// Maximum connection attempts per request
    #[arg(long)]
    pub(crate) max_retries: Option<usize>,
}

#[derive(clap::Args, Debug)]
pub(crate) struct AuthArgs {
    /// API token, taken from the browser session. Read from stdin
    /// when omitted
    #[arg(env = "PLEXI_TOKEN", hide_env_values = true)]
    pub(crate) token: Option<String>,
}

#[derive(clap::Args, Debug)]
pub(crate) struct ThreadsArgs {
    /// CSV file to write
    #[arg(short, long, default_value = "threads.csv")]
    pub(crate) output: PathBuf,

    /// Only include threads from this date onwards
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub(crate) from: Option<NaiveDate>,

    /// Only include threads up to and including this date
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub(crate) to: Option<NaiveDate>,
}

/// How the final answer is rendered.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Deserialize, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub(crate) enum OutputFormat {
    /// Answer text followed by a numbered reference list
    #[default]
    Plain,
    /// Markdown with a linked references section
    Markdown,
    /// The complete answer as a single JSON document
    Json,
}

/// Options deserialized from `plexi.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct Config {
    /// Alternative service base URL
    pub(crate) base_url: Option<Url>,
    /// Request timeout in seconds
    pub(crate) timeout: Option<u64>,
    /// Maximum connection attempts per request
    pub(crate) max_retries: Option<usize>,
    /// Default output format for `query`
    pub(crate) format: Option<OutputFormat>,
    /// Throttling of multi-request commands
    pub(crate) rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct RateLimitConfig {
    /// Whether multi-request commands are throttled at all
    pub(crate) enabled: bool,
    /// Requests allowed per period
    pub(crate) requests_per_period: u32,
    /// Period length in seconds
    pub(crate) period_seconds: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        // Conservative default matching the service's observed quota.
        Self {
            enabled: true,
            requests_per_period: 20,
            period_seconds: 60.0,
        }
    }
}

impl Config {
    /// Load the configuration.
    ///
    /// An explicitly given file must exist and parse; without one,
    /// `plexi.toml` in the working directory is used when present, and
    /// defaults otherwise.
    pub(crate) fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let fallback = Path::new(PLEXI_CONFIG_FILE);
                if fallback.is_file() {
                    Self::from_file(fallback)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("cannot read configuration file `{}`", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("invalid configuration file `{}`", path.display()))
    }
}
