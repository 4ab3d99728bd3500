use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::collections::HashSet;
use std::str::FromStr;

use crate::error::{PipelineError, Result};
use crate::models::{Athlete, AthleteLookup, CoordKey, GearRow, LocationRow, NewAthlete};

pub type DbPool = SqlitePool;

/// Open the connection pool and run migrations
pub async fn initialize_db(database_url: &str) -> Result<DbPool> {
  tracing::info!(database_url, "Initializing database");

  let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

  // In-memory databases are per connection; a second connection would see an empty store
  let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

  let pool = SqlitePoolOptions::new()
    .max_connections(max_connections)
    .connect_with(options)
    .await?;

  sqlx::migrate!("./migrations").run(&pool).await?;

  tracing::info!("Database initialized successfully");

  Ok(pool)
}

/// ---------------------------------------------------------------------------
/// Athletes
/// ---------------------------------------------------------------------------

pub async fn load_athlete(db: &DbPool, lookup: &AthleteLookup) -> Result<Athlete> {
  let athlete = match lookup {
    AthleteLookup::Id(id) => {
      sqlx::query_as::<_, Athlete>("SELECT * FROM athletes WHERE athlete_id = ?1")
        .bind(id)
        .fetch_optional(db)
        .await?
    }
    AthleteLookup::FirstName(name) => {
      sqlx::query_as::<_, Athlete>(
        "SELECT * FROM athletes WHERE first_name = ?1 ORDER BY athlete_id LIMIT 1",
      )
      .bind(name)
      .fetch_optional(db)
      .await?
    }
  };

  athlete.ok_or_else(|| PipelineError::AthleteNotFound(lookup.to_string()))
}

/// First-time registration; an existing athlete is left untouched
pub async fn register_athlete(db: &DbPool, athlete: &NewAthlete) -> Result<bool> {
  let result = sqlx::query(
    r#"
    INSERT INTO athletes (athlete_id, client_id, client_secret, refresh_token, first_name, last_name)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
    ON CONFLICT(athlete_id) DO NOTHING
    "#,
  )
  .bind(athlete.athlete_id)
  .bind(athlete.client_id)
  .bind(&athlete.client_secret)
  .bind(&athlete.refresh_token)
  .bind(&athlete.first_name)
  .bind(&athlete.last_name)
  .execute(db)
  .await?;

  Ok(result.rows_affected() > 0)
}

/// ---------------------------------------------------------------------------
/// Cursor and Dedup Sets
/// ---------------------------------------------------------------------------

/// Unix timestamp of the newest stored activity, if any
pub async fn latest_start_timestamp(db: &DbPool, athlete_id: i64) -> Result<Option<i64>> {
  let ts: Option<i64> = sqlx::query_scalar(
    "SELECT CAST(strftime('%s', MAX(start_date)) AS INTEGER) FROM activities WHERE athlete_id = ?1",
  )
  .bind(athlete_id)
  .fetch_one(db)
  .await?;

  Ok(ts)
}

pub async fn persisted_activity_ids(db: &DbPool, athlete_id: i64) -> Result<HashSet<i64>> {
  let ids: Vec<i64> = sqlx::query_scalar("SELECT activity_id FROM activities WHERE athlete_id = ?1")
    .bind(athlete_id)
    .fetch_all(db)
    .await?;

  Ok(ids.into_iter().collect())
}

pub async fn persisted_location_keys(db: &DbPool) -> Result<HashSet<CoordKey>> {
  let rows: Vec<(f64, f64)> = sqlx::query_as("SELECT latitude, longitude FROM locations")
    .fetch_all(db)
    .await?;

  Ok(rows.into_iter().map(|(lat, lon)| CoordKey::new(lat, lon)).collect())
}

pub async fn persisted_gear_ids(db: &DbPool) -> Result<HashSet<String>> {
  let ids: Vec<String> = sqlx::query_scalar("SELECT gear_id FROM gear")
    .fetch_all(db)
    .await?;

  Ok(ids.into_iter().collect())
}

/// ---------------------------------------------------------------------------
/// Reference Data
/// ---------------------------------------------------------------------------

pub async fn load_location(db: &DbPool, key: CoordKey) -> Result<Option<LocationRow>> {
  let row = sqlx::query_as::<_, LocationRow>(
    "SELECT * FROM locations WHERE latitude = ?1 AND longitude = ?2",
  )
  .bind(key.latitude())
  .bind(key.longitude())
  .fetch_optional(db)
  .await?;

  Ok(row)
}

/// Returns false if the coordinate pair is already stored
pub async fn insert_location(db: &DbPool, location: &LocationRow) -> Result<bool> {
  let result = sqlx::query(
    r#"
    INSERT INTO locations (
      latitude, longitude, place_id, osm_id, country_code, country, region, state_name,
      city, town, village, suburb, quarter, neighborhood, street, postal, address
    )
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
    ON CONFLICT(latitude, longitude) DO NOTHING
    "#,
  )
  .bind(location.latitude)
  .bind(location.longitude)
  .bind(location.place_id)
  .bind(location.osm_id)
  .bind(&location.country_code)
  .bind(&location.country)
  .bind(&location.region)
  .bind(&location.state_name)
  .bind(&location.city)
  .bind(&location.town)
  .bind(&location.village)
  .bind(&location.suburb)
  .bind(&location.quarter)
  .bind(&location.neighborhood)
  .bind(&location.street)
  .bind(&location.postal)
  .bind(&location.address)
  .execute(db)
  .await?;

  Ok(result.rows_affected() > 0)
}

/// Returns false if the gear id is already stored
pub async fn insert_gear(db: &DbPool, gear: &GearRow) -> Result<bool> {
  let result = sqlx::query(
    r#"
    INSERT INTO gear (
      gear_id, gear_name, brand_name, model_name, description,
      frame_type, is_primary, retired, distance_meters
    )
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
    ON CONFLICT(gear_id) DO NOTHING
    "#,
  )
  .bind(&gear.gear_id)
  .bind(&gear.gear_name)
  .bind(&gear.brand_name)
  .bind(&gear.model_name)
  .bind(&gear.description)
  .bind(gear.frame_type)
  .bind(gear.is_primary)
  .bind(gear.retired)
  .bind(gear.distance_meters)
  .execute(db)
  .await?;

  Ok(result.rows_affected() > 0)
}
