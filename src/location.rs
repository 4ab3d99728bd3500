//! Start-location deduplication and resolution
//!
//! Two tiers sit in front of the geocoder: a run-local cache of rows already
//! resolved in this run, and the set of coordinate pairs persisted by earlier
//! runs. Only a pair missing from both reaches the external service, and each
//! such pair is written exactly once.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::db::{self, DbPool};
use crate::error::{PipelineError, Result};
use crate::geocode::NominatimGeocoder;
use crate::models::{CoordKey, LocationRow};

pub struct LocationResolver {
  geocoder: NominatimGeocoder,
  delay: Duration,
  run_cache: HashMap<CoordKey, LocationRow>,
  persisted: HashSet<CoordKey>,
  lookups: usize,
}

impl LocationResolver {
  /// Load the persisted dedup set; call once at run start
  pub async fn load(db: &DbPool, geocoder: NominatimGeocoder, delay: Duration) -> Result<Self> {
    let persisted = db::persisted_location_keys(db).await?;
    tracing::debug!(count = persisted.len(), "Loaded stored locations");

    Ok(Self {
      geocoder,
      delay,
      run_cache: HashMap::new(),
      persisted,
      lookups: 0,
    })
  }

  /// Return the stored row for `coord`, geocoding and storing it first if new
  pub async fn resolve(&mut self, db: &DbPool, coord: CoordKey) -> Result<LocationRow> {
    if let Some(row) = self.run_cache.get(&coord) {
      return Ok(row.clone());
    }

    if self.persisted.contains(&coord) {
      if let Some(row) = db::load_location(db, coord).await? {
        self.run_cache.insert(coord, row.clone());
        return Ok(row);
      }
    }

    tokio::time::sleep(self.delay).await;
    self.lookups += 1;

    let row = self.geocoder.reverse(coord).await.map_err(|e| {
      tracing::error!(%coord, error = %e, "Reverse geocoding failed");
      PipelineError::from(e)
    })?;

    db::insert_location(db, &row).await?;
    tracing::info!(
      %coord,
      city = row.city.as_deref().or(row.town.as_deref()).unwrap_or("-"),
      country = row.country_code.as_deref().unwrap_or("-"),
      "Stored new location"
    );

    self.persisted.insert(coord);
    self.run_cache.insert(coord, row.clone());
    Ok(row)
  }

  /// Resolve each distinct pair once, in first-seen order
  pub async fn resolve_all<I>(&mut self, db: &DbPool, coords: I) -> Result<Vec<LocationRow>>
  where
    I: IntoIterator<Item = CoordKey>,
  {
    let mut seen = HashSet::new();
    let mut rows = Vec::new();

    for coord in coords {
      if seen.insert(coord) {
        rows.push(self.resolve(db, coord).await?);
      }
    }

    Ok(rows)
  }

  /// External calls made by this resolver
  pub fn lookups(&self) -> usize {
    self.lookups
  }
}
