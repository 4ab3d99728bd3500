use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// One normalized activity, exactly as stored in `activities`.
///
/// Field order is the storage and backup column order; keep the two in sync
/// with the migration and `writer::insert_activity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ActivityRow {
  // Basics
  pub activity_id: i64,
  pub athlete_id: i64,
  pub activity_type: String,
  pub sport_type: Option<String>,
  pub workout_type: Option<i64>,
  pub activity_date: NaiveDate,
  pub activity_name: String,
  pub activity_description: Option<String>,
  pub perceived_exertion: Option<f64>,
  pub athlete_count: Option<i64>,
  pub commute: Option<bool>,
  // Distance
  pub distance_miles: f64,
  pub distance_meters: f64,
  pub distance_km: f64,
  // Speed
  pub average_speed_ms: Option<f64>,
  pub min_per_mile: Option<f64>,
  pub max_speed_ms: Option<f64>,
  // Time
  pub start_date: DateTime<Utc>,
  pub start_date_local: NaiveDateTime,
  pub timezone: Option<String>,
  pub moving_time: i64,
  pub elapsed_time: i64,
  pub end_date: DateTime<Utc>,
  pub end_date_local: NaiveDateTime,
  pub hour_of_day: i64,
  pub day_of_week: String,
  pub year_: i64,
  // Location
  pub start_latitude: Option<f64>,
  pub start_longitude: Option<f64>,
  pub end_latitude: Option<f64>,
  pub end_longitude: Option<f64>,
  // Records
  pub pr_count: Option<i64>,
  pub achievement_count: Option<i64>,
  pub fastest_mile: Option<f64>,
  pub fastest_mile_pace: Option<f64>,
  // Health
  pub has_heartrate: Option<bool>,
  pub heartrate: Option<f64>,
  pub max_heartrate: Option<f64>,
  pub calories: Option<f64>,
  // Elevation
  pub elev_high: Option<f64>,
  pub elev_low: Option<f64>,
  pub total_elevation_gain: Option<f64>,
  // Cycling specific
  pub average_watts: Option<f64>,
  pub kilojoules: Option<f64>,
  // ID references
  pub gear_id: Option<String>,
  pub device_name: Option<String>,
  pub upload_id: Option<i64>,
  pub external_id: Option<String>,
}
