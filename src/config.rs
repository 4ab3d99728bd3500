//! Runtime configuration
//!
//! Everything is read from the environment (optionally seeded from a `.env`
//! file). Athlete credentials are not configuration: they live in the
//! `athletes` table.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

/// ---------------------------------------------------------------------------
/// Defaults
/// ---------------------------------------------------------------------------

const DEFAULT_DATABASE_URL: &str = "sqlite://strava.db?mode=rwc";
const DEFAULT_STRAVA_API_BASE: &str = "https://www.strava.com/api/v3";
const DEFAULT_STRAVA_TOKEN_URL: &str = "https://www.strava.com/oauth/token";
const DEFAULT_GEOCODER_BASE_URL: &str = "https://nominatim.openstreetmap.org";
const DEFAULT_GEOCODER_USER_AGENT: &str = "strava-ingest/0.1";

/// Strava rejects `per_page` above this value
pub const MAX_PER_PAGE: u32 = 200;
const DEFAULT_MAX_PAGES: u32 = 500;

/// 600 calls / 15 minutes leaves room for one detail call every 1.5s
const DEFAULT_DETAIL_DELAY_MS: u64 = 2000;
/// Nominatim usage policy: at most one request per second
const DEFAULT_GEOCODER_DELAY_MS: u64 = 1000;

/// ---------------------------------------------------------------------------
/// Error Handling
/// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("Invalid value for {key}: {value}")]
  InvalidConfig { key: String, value: String },
}

/// ---------------------------------------------------------------------------
/// Config
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
  Pretty,
  Json,
}

impl FromStr for LogFormat {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "pretty" | "text" => Ok(Self::Pretty),
      "json" => Ok(Self::Json),
      other => Err(format!("Unknown log format: {}", other)),
    }
  }
}

#[derive(Debug, Clone)]
pub struct Config {
  pub database_url: String,
  pub strava_api_base: String,
  pub strava_token_url: String,
  pub geocoder_base_url: String,
  pub geocoder_user_agent: String,
  pub per_page: u32,
  pub max_pages: u32,
  pub detail_delay: Duration,
  pub geocoder_delay: Duration,
  /// When set, each run writes a CSV of the rows it appended here
  pub backup_dir: Option<PathBuf>,
  /// When set, raw API responses are kept here for audit and replay
  pub raw_dump_dir: Option<PathBuf>,
  pub log_format: LogFormat,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      database_url: DEFAULT_DATABASE_URL.to_string(),
      strava_api_base: DEFAULT_STRAVA_API_BASE.to_string(),
      strava_token_url: DEFAULT_STRAVA_TOKEN_URL.to_string(),
      geocoder_base_url: DEFAULT_GEOCODER_BASE_URL.to_string(),
      geocoder_user_agent: DEFAULT_GEOCODER_USER_AGENT.to_string(),
      per_page: MAX_PER_PAGE,
      max_pages: DEFAULT_MAX_PAGES,
      detail_delay: Duration::from_millis(DEFAULT_DETAIL_DELAY_MS),
      geocoder_delay: Duration::from_millis(DEFAULT_GEOCODER_DELAY_MS),
      backup_dir: None,
      raw_dump_dir: None,
      log_format: LogFormat::Pretty,
    }
  }
}

impl Config {
  /// Load configuration from environment variables, falling back to defaults.
  pub fn from_env() -> Result<Self, ConfigError> {
    dotenvy::dotenv().ok();

    let defaults = Self::default();

    let per_page = parse_var("STRAVA_PER_PAGE")?.unwrap_or(defaults.per_page);
    if per_page == 0 {
      return Err(ConfigError::InvalidConfig {
        key: "STRAVA_PER_PAGE".into(),
        value: "0".into(),
      });
    }

    Ok(Self {
      database_url: string_var("DATABASE_URL").unwrap_or(defaults.database_url),
      strava_api_base: url_var("STRAVA_API_BASE")?.unwrap_or(defaults.strava_api_base),
      strava_token_url: url_var("STRAVA_TOKEN_URL")?.unwrap_or(defaults.strava_token_url),
      geocoder_base_url: url_var("GEOCODER_BASE_URL")?.unwrap_or(defaults.geocoder_base_url),
      geocoder_user_agent: string_var("GEOCODER_USER_AGENT")
        .unwrap_or(defaults.geocoder_user_agent),
      per_page: per_page.min(MAX_PER_PAGE),
      max_pages: parse_var("STRAVA_MAX_PAGES")?.unwrap_or(defaults.max_pages),
      detail_delay: parse_var::<u64>("STRAVA_DETAIL_DELAY_MS")?
        .map(Duration::from_millis)
        .unwrap_or(defaults.detail_delay),
      geocoder_delay: parse_var::<u64>("GEOCODER_DELAY_MS")?
        .map(Duration::from_millis)
        .unwrap_or(defaults.geocoder_delay),
      backup_dir: string_var("BACKUP_DIR").map(PathBuf::from),
      raw_dump_dir: string_var("RAW_DUMP_DIR").map(PathBuf::from),
      log_format: parse_var("LOG_FORMAT")?.unwrap_or(defaults.log_format),
    })
  }

  /// Config pointing every remote collaborator at one mock server, with no delays.
  #[cfg(test)]
  pub fn for_tests(server_url: &str) -> Self {
    Self {
      database_url: "sqlite::memory:".to_string(),
      strava_api_base: format!("{}/api/v3", server_url),
      strava_token_url: format!("{}/oauth/token", server_url),
      geocoder_base_url: server_url.to_string(),
      per_page: 2,
      max_pages: 10,
      detail_delay: Duration::ZERO,
      geocoder_delay: Duration::ZERO,
      ..Self::default()
    }
  }
}

fn string_var(key: &str) -> Option<String> {
  env::var(key)
    .ok()
    .map(|v| v.trim().to_string())
    .filter(|v| !v.is_empty())
}

/// Must be an absolute http(s) URL
fn url_var(key: &str) -> Result<Option<String>, ConfigError> {
  let Some(raw) = string_var(key) else {
    return Ok(None);
  };

  match Url::parse(&raw) {
    Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(Some(raw)),
    _ => Err(ConfigError::InvalidConfig {
      key: key.to_string(),
      value: raw,
    }),
  }
}

fn parse_var<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
  match string_var(key) {
    None => Ok(None),
    Some(raw) => raw
      .parse::<T>()
      .map(Some)
      .map_err(|_| ConfigError::InvalidConfig {
        key: key.to_string(),
        value: raw,
      }),
  }
}
