//! Test utilities and helpers for unit testing
//!
//! This module provides common test infrastructure including:
//! - Database setup/teardown and seeding
//! - Mock data factories
//! - mockito endpoints for the Strava API and the geocoder

use chrono::{DateTime, Duration, Utc};
use mockito::{Matcher, Mock, ServerGuard};
use serde_json::json;
use sqlx::SqlitePool;

use crate::auth::AuthManager;
use crate::models::{LocationRow, NewAthlete};
use crate::strava::{ActivitySummary, ClientCredentials, StravaClient, StravaSplit};

/// ---------------------------------------------------------------------------
/// Database Test Utilities
/// ---------------------------------------------------------------------------

/// Create an in-memory SQLite database for testing
/// Runs all migrations and returns a ready-to-use pool
///
/// Uses max_connections(1) to prevent multiple pool connections from creating
/// isolated in-memory databases, which would cause intermittent test failures
pub async fn setup_test_db() -> SqlitePool {
  let pool = sqlx::sqlite::SqlitePoolOptions::new()
    .max_connections(1)
    .connect("sqlite::memory:")
    .await
    .expect("Failed to create in-memory database");

  sqlx::migrate!("./migrations")
    .run(&pool)
    .await
    .expect("Failed to run migrations");

  pool
}

/// Close a test database pool
pub async fn teardown_test_db(pool: SqlitePool) {
  pool.close().await;
}

pub fn mock_new_athlete(athlete_id: i64) -> NewAthlete {
  NewAthlete {
    athlete_id,
    client_id: 4242,
    client_secret: "secret".to_string(),
    refresh_token: "refresh-1".to_string(),
    first_name: Some("Lance".to_string()),
    last_name: Some("Tester".to_string()),
  }
}

pub async fn seed_test_athlete(pool: &SqlitePool, athlete_id: i64) {
  crate::db::register_athlete(pool, &mock_new_athlete(athlete_id))
    .await
    .expect("Failed to seed athlete");
}

/// Insert bare activity rows with the given ids and start dates
pub async fn seed_test_activities(pool: &SqlitePool, athlete_id: i64, activities: &[(i64, &str)]) {
  for (activity_id, start_date) in activities {
    sqlx::query(
      "INSERT INTO activities (activity_id, athlete_id, activity_type, start_date) VALUES (?1, ?2, 'Run', ?3)",
    )
    .bind(activity_id)
    .bind(athlete_id)
    .bind(datetime(start_date))
    .execute(pool)
    .await
    .expect("Failed to seed activity");
  }
}

pub async fn seed_test_gear(pool: &SqlitePool, gear_id: &str) {
  sqlx::query("INSERT INTO gear (gear_id, gear_name) VALUES (?1, 'Old Shoes')")
    .bind(gear_id)
    .execute(pool)
    .await
    .expect("Failed to seed gear");
}

/// ---------------------------------------------------------------------------
/// Mock Data Factories
/// ---------------------------------------------------------------------------

pub fn mock_location_row(latitude: f64, longitude: f64) -> LocationRow {
  LocationRow {
    latitude,
    longitude,
    place_id: Some(1001),
    osm_id: Some(2002),
    country_code: Some("US".to_string()),
    country: Some("United States".to_string()),
    region: None,
    state_name: Some("Oregon".to_string()),
    city: Some("Portland".to_string()),
    town: None,
    village: None,
    suburb: None,
    quarter: None,
    neighborhood: Some("Old Town".to_string()),
    street: Some("SW Main St".to_string()),
    postal: Some("97204".to_string()),
    address: Some("SW Main St, Portland, Oregon, 97204, United States".to_string()),
  }
}

/// List-endpoint JSON for one run starting in Portland
pub fn mock_summary_json(id: i64, athlete_id: i64, start_date: &str, distance: f64) -> String {
  json!({
    "id": id,
    "athlete": { "id": athlete_id, "resource_state": 1 },
    "name": format!("Run {}", id),
    "type": "Run",
    "sport_type": "Run",
    "workout_type": 0,
    "distance": distance,
    "moving_time": 1800,
    "elapsed_time": 1900,
    "total_elevation_gain": 42.0,
    "start_date": start_date,
    "start_date_local": start_date,
    "timezone": "(GMT-08:00) America/Los_Angeles",
    "start_latlng": [45.523064, -122.676483],
    "end_latlng": [45.52, -122.68],
    "achievement_count": 1,
    "pr_count": 0,
    "athlete_count": 1,
    "commute": false,
    "average_speed": 2.778,
    "max_speed": 4.1,
    "has_heartrate": true,
    "average_heartrate": 150.2,
    "max_heartrate": 171.0,
    "elev_high": 60.1,
    "elev_low": 12.4,
    "gear_id": null,
    "upload_id": 9000 + id,
    "external_id": format!("garmin_{}.fit", id),
    "kudos_count": 3
  })
  .to_string()
}

pub fn mock_summary(id: i64, athlete_id: i64, start_date: &str, distance: f64) -> ActivitySummary {
  serde_json::from_str(&mock_summary_json(id, athlete_id, start_date, distance))
    .expect("Failed to build mock summary")
}

pub fn mock_split(split: i64, distance: f64, moving_time: i64) -> StravaSplit {
  StravaSplit {
    split,
    distance,
    moving_time,
    elapsed_time: moving_time,
    average_speed: (moving_time > 0).then(|| distance / moving_time as f64),
    average_heartrate: Some(148.0),
    elevation_difference: Some(1.5),
  }
}

/// Detail-endpoint JSON with two kilometer splits and no mile splits
pub fn mock_detail_json(id: i64, gear_id: Option<&str>) -> String {
  let gear = gear_id.map(|g| {
    json!({ "id": g, "name": "Pegasus", "primary": true, "retired": false, "distance": 100000.0 })
  });

  json!({
    "id": id,
    "description": "",
    "calories": 512.5,
    "device_name": "Garmin Forerunner 255",
    "perceived_exertion": null,
    "gear_id": gear_id,
    "gear": gear,
    "splits_metric": [
      { "split": 1, "distance": 1000.0, "moving_time": 300, "elapsed_time": 305, "average_speed": 3.33, "average_heartrate": 145.123, "elevation_difference": 2.0 },
      { "split": 2, "distance": 500.0, "moving_time": 160, "elapsed_time": 160, "average_speed": 3.12, "average_heartrate": 151.456, "elevation_difference": -1.0 }
    ],
    "segment_efforts": []
  })
  .to_string()
}

/// ---------------------------------------------------------------------------
/// Mock Endpoints
/// ---------------------------------------------------------------------------

pub async fn mock_token_endpoint(server: &mut ServerGuard, expires_at: i64, times: usize) -> Mock {
  server
    .mock("POST", "/oauth/token")
    .with_status(200)
    .with_header("content-type", "application/json")
    .with_body(
      json!({
        "token_type": "Bearer",
        "access_token": "access-token",
        "refresh_token": "refresh-1",
        "expires_at": expires_at,
        "expires_in": 21600
      })
      .to_string(),
    )
    .expect(times)
    .create_async()
    .await
}

/// One page of the activity list for athlete 1
pub async fn mock_list_page(server: &mut ServerGuard, page: u32, activities: &[(i64, &str)]) -> Mock {
  let items: Vec<String> = activities
    .iter()
    .map(|(id, start)| mock_summary_json(*id, 1, start, 5000.0))
    .collect();

  server
    .mock("GET", "/api/v3/athlete/activities")
    .match_query(Matcher::UrlEncoded("page".into(), page.to_string()))
    .with_status(200)
    .with_header("content-type", "application/json")
    .with_body(format!("[{}]", items.join(",")))
    .create_async()
    .await
}

pub async fn mock_detail(server: &mut ServerGuard, id: i64, gear_id: Option<&str>) -> Mock {
  server
    .mock("GET", format!("/api/v3/activities/{}", id).as_str())
    .match_query(Matcher::Any)
    .with_status(200)
    .with_header("content-type", "application/json")
    .with_body(mock_detail_json(id, gear_id))
    .expect(1)
    .create_async()
    .await
}

pub async fn mock_gear(server: &mut ServerGuard, gear_id: &str, times: usize) -> Mock {
  server
    .mock("GET", format!("/api/v3/gear/{}", gear_id).as_str())
    .with_status(200)
    .with_header("content-type", "application/json")
    .with_body(
      json!({
        "id": gear_id,
        "name": "Pegasus 40",
        "brand_name": "Nike",
        "model_name": "Pegasus",
        "description": "Daily trainer",
        "frame_type": null,
        "primary": true,
        "retired": false,
        "distance": 123456.0,
        "converted_distance": 76.7,
        "resource_state": 3
      })
      .to_string(),
    )
    .expect(times)
    .create_async()
    .await
}

/// Nominatim reverse lookup for one coordinate pair
pub async fn mock_geocoder(server: &mut ServerGuard, lat: f64, lon: f64, times: usize) -> Mock {
  server
    .mock("GET", "/reverse")
    .match_query(Matcher::AllOf(vec![
      Matcher::UrlEncoded("lat".into(), format!("{:.6}", lat)),
      Matcher::UrlEncoded("lon".into(), format!("{:.6}", lon)),
    ]))
    .with_status(200)
    .with_header("content-type", "application/json")
    .with_body(
      json!({
        "place_id": 1001,
        "osm_id": 2002,
        "display_name": "SW Main St, Old Town, Portland, Oregon, 97204, United States",
        "address": {
          "road": "SW Main St",
          "neighbourhood": "Old Town",
          "city": "Portland",
          "county": "Multnomah County",
          "state": "Oregon",
          "postcode": "97204",
          "country": "United States",
          "country_code": "us"
        }
      })
      .to_string(),
    )
    .expect(times)
    .create_async()
    .await
}

/// AuthManager wired to a mock server, not yet authenticated
pub fn test_auth_manager(server: &ServerGuard) -> AuthManager {
  let client = StravaClient::new(
    format!("{}/api/v3", server.url()),
    format!("{}/oauth/token", server.url()),
  );
  AuthManager::new(
    client,
    ClientCredentials {
      client_id: 4242,
      client_secret: "secret".into(),
    },
    "refresh-1".into(),
  )
}

/// ---------------------------------------------------------------------------
/// Time Helpers
/// ---------------------------------------------------------------------------

pub fn datetime(rfc3339: &str) -> DateTime<Utc> {
  DateTime::parse_from_rfc3339(rfc3339)
    .expect("Invalid RFC 3339 timestamp")
    .with_timezone(&Utc)
}

pub fn datetime_from_ts(ts: i64) -> DateTime<Utc> {
  DateTime::from_timestamp(ts, 0).expect("Timestamp out of range")
}

/// An expiry a year from now; tokens with it never need a second refresh
pub fn far_future_ts() -> i64 {
  (Utc::now() + Duration::days(365)).timestamp()
}

/// ---------------------------------------------------------------------------
/// Test Macros
/// ---------------------------------------------------------------------------

/// Assert two floats are approximately equal within a tolerance
#[macro_export]
macro_rules! assert_approx_eq {
  ($left:expr, $right:expr, $tolerance:expr) => {
    let diff = ($left - $right).abs();
    assert!(
      diff < $tolerance,
      "Values not approximately equal: {} vs {} (diff: {}, tolerance: {})",
      $left,
      $right,
      diff,
      $tolerance
    );
  };
}

/// ---------------------------------------------------------------------------
/// Tests for Test Utilities
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_setup_db_creates_schema() {
    let pool = setup_test_db().await;

    let tables: Vec<(String,)> = sqlx::query_as(
      "SELECT name FROM sqlite_master WHERE type='table' AND name IN ('athletes', 'activities', 'splits_miles', 'splits_km', 'locations', 'gear')",
    )
    .fetch_all(&pool)
    .await
    .expect("Failed to query tables");

    assert_eq!(tables.len(), 6, "Expected 6 tables, got {}", tables.len());

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_seed_activities_requires_athlete() {
    let pool = setup_test_db().await;
    seed_test_athlete(&pool, 1).await;
    seed_test_activities(&pool, 1, &[(1, "2024-01-01T00:00:00Z"), (2, "2024-01-02T00:00:00Z")]).await;

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM activities")
      .fetch_one(&pool)
      .await
      .expect("Failed to count activities");
    assert_eq!(count, 2);

    teardown_test_db(pool).await;
  }

  #[test]
  fn test_mock_factories_create_valid_data() {
    let summary = mock_summary(5, 1, "2024-03-01T10:00:00Z", 10000.0);
    assert_eq!(summary.id, 5);
    assert_eq!(summary.activity_type, "Run");
    assert_eq!(summary.start_latlng.as_deref(), Some(&[45.523064, -122.676483][..]));

    let split = mock_split(1, 1000.0, 250);
    assert_eq!(split.average_speed, Some(4.0));
  }
}
