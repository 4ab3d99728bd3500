//! Append-only persistence of normalized activities
//!
//! Stored activities are immutable: a fetched id that is already stored is
//! dropped, never overwritten. The appended batch and its splits commit in
//! one transaction.

use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use sqlx::SqliteConnection;

use crate::db::{self, DbPool};
use crate::error::Result;
use crate::models::{ActivityRow, KmSplitRow, MileSplitRow};
use crate::normalize::NormalizedActivity;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Default)]
pub struct WriteReport {
  /// Ids appended by this run, in batch order
  pub appended: Vec<i64>,
  /// Rows dropped because the id was already stored or repeated in the batch
  pub skipped: usize,
  pub backup: Option<PathBuf>,
}

pub struct Writer {
  backup_dir: Option<PathBuf>,
}

impl Writer {
  pub fn new(backup_dir: Option<PathBuf>) -> Self {
    Self { backup_dir }
  }

  /// Persist `batch \ stored` by activity id, then back up exactly those rows
  pub async fn write(
    &self,
    db: &DbPool,
    athlete_id: i64,
    batch: Vec<NormalizedActivity>,
    stamp: NaiveDateTime,
  ) -> Result<WriteReport> {
    let persisted = db::persisted_activity_ids(db, athlete_id).await?;
    let total = batch.len();
    let fresh = new_only(batch, &persisted);

    let appended = append(db, &fresh).await?;
    let skipped = total - appended.len();

    tracing::info!(athlete_id, appended = appended.len(), skipped, "Activities written");

    let backup = match &self.backup_dir {
      Some(dir) if !appended.is_empty() => {
        let rows: Vec<&ActivityRow> = appended.iter().map(|a| &a.activity).collect();
        Some(write_backup(dir, &rows, stamp)?)
      }
      _ => None,
    };

    Ok(WriteReport {
      appended: appended.iter().map(|a| a.id()).collect(),
      skipped,
      backup,
    })
  }
}

/// Keep only ids absent from `persisted`; within the batch the first occurrence wins
pub fn new_only(batch: Vec<NormalizedActivity>, persisted: &HashSet<i64>) -> Vec<NormalizedActivity> {
  let mut seen = HashSet::new();
  batch
    .into_iter()
    .filter(|a| !persisted.contains(&a.id()) && seen.insert(a.id()))
    .collect()
}

/// Insert activities and their splits in a single transaction.
///
/// Returns the activities actually inserted; an id that raced in since the
/// dedup set was loaded is skipped along with its splits.
pub async fn append(db: &DbPool, batch: &[NormalizedActivity]) -> Result<Vec<NormalizedActivity>> {
  let mut tx = db.begin().await?;
  let mut appended = Vec::with_capacity(batch.len());

  for item in batch {
    if !insert_activity(&mut *tx, &item.activity).await? {
      tracing::warn!(activity_id = item.id(), "Activity already stored, skipping");
      continue;
    }
    for split in &item.km_splits {
      insert_km_split(&mut *tx, split).await?;
    }
    for split in &item.mile_splits {
      insert_mile_split(&mut *tx, split).await?;
    }
    appended.push(item.clone());
  }

  tx.commit().await?;
  Ok(appended)
}

/// ---------------------------------------------------------------------------
/// Row Inserts
/// ---------------------------------------------------------------------------

pub async fn insert_activity(conn: &mut SqliteConnection, a: &ActivityRow) -> Result<bool> {
  let result = sqlx::query(
    r#"
    INSERT INTO activities (
      activity_id, athlete_id, activity_type, sport_type, workout_type, activity_date,
      activity_name, activity_description, perceived_exertion, athlete_count, commute,
      distance_miles, distance_meters, distance_km,
      average_speed_ms, min_per_mile, max_speed_ms,
      start_date, start_date_local, timezone, moving_time, elapsed_time,
      end_date, end_date_local, hour_of_day, day_of_week, year_,
      start_latitude, start_longitude, end_latitude, end_longitude,
      pr_count, achievement_count, fastest_mile, fastest_mile_pace,
      has_heartrate, heartrate, max_heartrate, calories,
      elev_high, elev_low, total_elevation_gain,
      average_watts, kilojoules,
      gear_id, device_name, upload_id, external_id
    )
    VALUES (
      ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
      ?, ?, ?,
      ?, ?, ?,
      ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
      ?, ?, ?, ?,
      ?, ?, ?, ?,
      ?, ?, ?, ?,
      ?, ?, ?,
      ?, ?,
      ?, ?, ?, ?
    )
    ON CONFLICT(activity_id) DO NOTHING
    "#,
  )
  .bind(a.activity_id)
  .bind(a.athlete_id)
  .bind(&a.activity_type)
  .bind(&a.sport_type)
  .bind(a.workout_type)
  .bind(a.activity_date)
  .bind(&a.activity_name)
  .bind(&a.activity_description)
  .bind(a.perceived_exertion)
  .bind(a.athlete_count)
  .bind(a.commute)
  .bind(a.distance_miles)
  .bind(a.distance_meters)
  .bind(a.distance_km)
  .bind(a.average_speed_ms)
  .bind(a.min_per_mile)
  .bind(a.max_speed_ms)
  .bind(a.start_date)
  .bind(a.start_date_local)
  .bind(&a.timezone)
  .bind(a.moving_time)
  .bind(a.elapsed_time)
  .bind(a.end_date)
  .bind(a.end_date_local)
  .bind(a.hour_of_day)
  .bind(&a.day_of_week)
  .bind(a.year_)
  .bind(a.start_latitude)
  .bind(a.start_longitude)
  .bind(a.end_latitude)
  .bind(a.end_longitude)
  .bind(a.pr_count)
  .bind(a.achievement_count)
  .bind(a.fastest_mile)
  .bind(a.fastest_mile_pace)
  .bind(a.has_heartrate)
  .bind(a.heartrate)
  .bind(a.max_heartrate)
  .bind(a.calories)
  .bind(a.elev_high)
  .bind(a.elev_low)
  .bind(a.total_elevation_gain)
  .bind(a.average_watts)
  .bind(a.kilojoules)
  .bind(&a.gear_id)
  .bind(&a.device_name)
  .bind(a.upload_id)
  .bind(&a.external_id)
  .execute(conn)
  .await?;

  Ok(result.rows_affected() > 0)
}

async fn insert_km_split(conn: &mut SqliteConnection, s: &KmSplitRow) -> Result<()> {
  sqlx::query(
    r#"
    INSERT INTO splits_km (
      activity_id, split, distance, moving_time, elapsed_time,
      average_speed_ms, heartrate, elevation_difference
    )
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
    "#,
  )
  .bind(s.activity_id)
  .bind(s.split)
  .bind(s.distance)
  .bind(s.moving_time)
  .bind(s.elapsed_time)
  .bind(s.average_speed_ms)
  .bind(s.heartrate)
  .bind(s.elevation_difference)
  .execute(conn)
  .await?;

  Ok(())
}

async fn insert_mile_split(conn: &mut SqliteConnection, s: &MileSplitRow) -> Result<()> {
  sqlx::query(
    r#"
    INSERT INTO splits_miles (
      activity_id, split, distance, moving_time, elapsed_time,
      average_speed_ms, heartrate, elevation_difference,
      mile_marker, pace_min_mile, derived
    )
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
    "#,
  )
  .bind(s.activity_id)
  .bind(s.split)
  .bind(s.distance)
  .bind(s.moving_time)
  .bind(s.elapsed_time)
  .bind(s.average_speed_ms)
  .bind(s.heartrate)
  .bind(s.elevation_difference)
  .bind(s.mile_marker)
  .bind(s.pace_min_mile)
  .bind(s.derived)
  .execute(conn)
  .await?;

  Ok(())
}

/// ---------------------------------------------------------------------------
/// Flat-File Backup
/// ---------------------------------------------------------------------------

pub fn backup_file_name(stamp: NaiveDateTime) -> String {
  format!("Strava Data {}.csv", stamp.format("%Y-%m-%d %H%M"))
}

/// CSV of `rows` in storage column order, UTF-8 with a byte order mark
pub fn write_backup(dir: &Path, rows: &[&ActivityRow], stamp: NaiveDateTime) -> Result<PathBuf> {
  std::fs::create_dir_all(dir)?;
  let path = dir.join(backup_file_name(stamp));

  let mut file = File::create(&path)?;
  file.write_all(UTF8_BOM)?;

  let mut csv = csv::Writer::from_writer(file);
  for row in rows {
    csv.serialize(row)?;
  }
  csv.flush()?;

  tracing::info!(path = %path.display(), rows = rows.len(), "Backup written");
  Ok(path)
}
