//! Enriched activity -> storage rows
//!
//! Pure and single pass: no I/O, no clock. Every output row has the same
//! field set whatever the upstream payload contained.

use chrono::{Datelike, Duration, Timelike};

use crate::enricher::EnrichedActivity;
use crate::error::RecordIssue;
use crate::models::{ActivityRow, KmSplitRow, MileSplitRow};
use crate::splits::{km_split_rows, mile_split_rows};
use crate::strava::ActivityDetail;
use crate::units::{meters_to_km, meters_to_miles, round_to};

/// One activity with its split rows, ready for the writer
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedActivity {
  pub activity: ActivityRow,
  pub km_splits: Vec<KmSplitRow>,
  pub mile_splits: Vec<MileSplitRow>,
}

impl NormalizedActivity {
  pub fn id(&self) -> i64 {
    self.activity.activity_id
  }
}

pub fn normalize(enriched: &EnrichedActivity) -> (NormalizedActivity, Vec<RecordIssue>) {
  let summary = &enriched.summary;
  let empty = ActivityDetail {
    id: summary.id,
    ..ActivityDetail::default()
  };
  let detail = enriched.detail.as_ref().unwrap_or(&empty);
  let mut issues = Vec::new();

  let distance_miles = round_to(meters_to_miles(summary.distance), 2);
  let distance_km = round_to(meters_to_km(summary.distance), 2);

  let min_per_mile = if distance_miles > 0.0 {
    Some(round_to((summary.moving_time as f64 / 60.0) / distance_miles, 4))
  } else {
    issues.push(RecordIssue::ZeroDistance {
      activity_id: summary.id,
    });
    None
  };

  let start_date = summary.start_date;
  let start_date_local = summary.start_date_local.naive_utc();
  let elapsed = Duration::seconds(summary.elapsed_time);

  let (start_latitude, start_longitude) = latlng_pair(summary.start_latlng.as_deref());
  let (end_latitude, end_longitude) = latlng_pair(summary.end_latlng.as_deref());

  let (mile_splits, fastest) = mile_split_rows(detail);
  let km_splits = km_split_rows(summary.id, detail.splits_metric.as_deref().unwrap_or_default());

  let gear_id = summary
    .gear_id
    .clone()
    .or_else(|| detail.gear.as_ref().map(|g| g.id.clone()));

  let activity = ActivityRow {
    activity_id: summary.id,
    athlete_id: summary.athlete.id,
    activity_type: summary.activity_type.clone(),
    sport_type: summary.sport_type.clone(),
    workout_type: summary.workout_type,
    activity_date: start_date_local.date(),
    activity_name: summary.name.clone(),
    activity_description: detail.description.clone().filter(|d| !d.is_empty()),
    perceived_exertion: detail.perceived_exertion,
    athlete_count: summary.athlete_count,
    commute: summary.commute,
    distance_miles,
    distance_meters: summary.distance,
    distance_km,
    average_speed_ms: summary.average_speed,
    min_per_mile,
    max_speed_ms: summary.max_speed,
    start_date,
    start_date_local,
    timezone: summary.timezone.clone(),
    moving_time: summary.moving_time,
    elapsed_time: summary.elapsed_time,
    end_date: start_date + elapsed,
    end_date_local: start_date_local + elapsed,
    hour_of_day: i64::from(start_date_local.hour()),
    day_of_week: start_date_local.format("%A").to_string(),
    year_: i64::from(start_date_local.year()),
    start_latitude,
    start_longitude,
    end_latitude,
    end_longitude,
    pr_count: summary.pr_count,
    achievement_count: summary.achievement_count,
    fastest_mile: fastest.map(|f| f.marker),
    fastest_mile_pace: fastest.map(|f| f.pace),
    has_heartrate: summary.has_heartrate,
    heartrate: summary.average_heartrate,
    max_heartrate: summary.max_heartrate,
    calories: detail.calories,
    elev_high: summary.elev_high,
    elev_low: summary.elev_low,
    total_elevation_gain: summary.total_elevation_gain,
    average_watts: summary.average_watts,
    kilojoules: summary.kilojoules,
    gear_id,
    device_name: detail.device_name.clone(),
    upload_id: summary.upload_id,
    external_id: summary.external_id.clone(),
  };

  (
    NormalizedActivity {
      activity,
      km_splits,
      mile_splits,
    },
    issues,
  )
}

pub fn normalize_batch(batch: &[EnrichedActivity]) -> (Vec<NormalizedActivity>, Vec<RecordIssue>) {
  let mut rows = Vec::with_capacity(batch.len());
  let mut issues = Vec::new();

  for enriched in batch {
    let (row, mut row_issues) = normalize(enriched);
    rows.push(row);
    issues.append(&mut row_issues);
  }

  (rows, issues)
}

/// `[lat, lng]` only when exactly two components are present
fn latlng_pair(latlng: Option<&[f64]>) -> (Option<f64>, Option<f64>) {
  match latlng {
    Some([lat, lng]) => (Some(*lat), Some(*lng)),
    _ => (None, None),
  }
}
