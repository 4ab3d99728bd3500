use serde::{Deserialize, Serialize};

/// Row in `splits_km`; distance in meters as reported
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct KmSplitRow {
  pub activity_id: i64,
  pub split: i64,
  pub distance: f64,
  pub moving_time: i64,
  pub elapsed_time: i64,
  pub average_speed_ms: Option<f64>,
  pub heartrate: Option<f64>,
  pub elevation_difference: Option<f64>,
}

/// Row in `splits_miles`; distance in miles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MileSplitRow {
  pub activity_id: i64,
  pub split: i64,
  pub distance: f64,
  pub moving_time: i64,
  pub elapsed_time: i64,
  pub average_speed_ms: Option<f64>,
  pub heartrate: Option<f64>,
  pub elevation_difference: Option<f64>,
  pub mile_marker: Option<f64>,
  pub pace_min_mile: Option<f64>,
  /// Built from metric splits because Strava sent no mile splits
  pub derived: bool,
}
