//! Pipeline error types
//!
//! Two tiers: `PipelineError` aborts the run, `RecordIssue` is recorded
//! against a single activity and the run continues.

use crate::config::ConfigError;
use crate::geocode::GeocodingError;
use crate::strava::StravaError;

/// ---------------------------------------------------------------------------
/// Fatal Errors
/// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  Strava(#[from] StravaError),

  #[error(transparent)]
  Geocoding(#[from] GeocodingError),

  #[error("Database error: {0}")]
  Database(#[from] sqlx::Error),

  #[error("Migration error: {0}")]
  Migration(#[from] sqlx::migrate::MigrateError),

  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),

  #[error("CSV error: {0}")]
  Csv(#[from] csv::Error),

  #[error("Invalid JSON in {path}: {source}")]
  Json {
    path: String,
    #[source]
    source: serde_json::Error,
  },

  #[error("No athlete matches {0}")]
  AthleteNotFound(String),
}

impl PipelineError {
  /// True when the remote service rejected our credentials
  pub fn is_authentication_failure(&self) -> bool {
    matches!(self, PipelineError::Strava(StravaError::Authentication(_)))
  }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// ---------------------------------------------------------------------------
/// Per-Record Issues (recovered locally)
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecordIssue {
  /// A field group was missing for an activity and was replaced with nulls
  #[error("activity {activity_id}: {field} missing, stored as null")]
  MalformedRecord {
    activity_id: i64,
    field: &'static str,
  },

  /// Kept with a null pace
  #[error("activity {activity_id}: zero distance, pace left empty")]
  ZeroDistance { activity_id: i64 },
}

impl RecordIssue {
  pub fn activity_id(&self) -> i64 {
    match self {
      RecordIssue::MalformedRecord { activity_id, .. } => *activity_id,
      RecordIssue::ZeroDistance { activity_id } => *activity_id,
    }
  }
}
