//! Equipment deduplication against the `gear` table
//!
//! Same shape as the location resolver: gear ids already stored are never
//! fetched again, new ids are fetched once and written once.

use std::collections::HashSet;

use crate::auth::AuthManager;
use crate::db::{self, DbPool};
use crate::error::Result;
use crate::models::GearRow;
use crate::strava::GearSummary;

pub struct GearResolver {
  persisted: HashSet<String>,
}

impl GearResolver {
  pub async fn load(db: &DbPool) -> Result<Self> {
    let persisted = db::persisted_gear_ids(db).await?;
    tracing::debug!(count = persisted.len(), "Loaded stored gear");
    Ok(Self { persisted })
  }

  pub fn is_known(&self, gear_id: &str) -> bool {
    self.persisted.contains(gear_id)
  }

  /// Fetch and store metadata for every gear id not yet stored
  pub async fn resolve_all<'a, I>(
    &mut self,
    db: &DbPool,
    auth: &mut AuthManager,
    gear_ids: I,
  ) -> Result<Vec<GearRow>>
  where
    I: IntoIterator<Item = &'a str>,
  {
    let mut added = Vec::new();

    for gear_id in gear_ids {
      if self.is_known(gear_id) {
        continue;
      }

      auth.check_expiry().await?;
      let detail = auth
        .client()
        .get_gear(auth.access_token()?, gear_id)
        .await
        .inspect_err(|e| tracing::error!(gear_id, error = %e, "Gear request failed"))?;

      let row = GearRow::from(detail);
      self.store(db, row.clone()).await?;
      added.push(row);
    }

    Ok(added)
  }

  /// Store gear known only from the summary embedded in activity details
  pub async fn resolve_from_summaries<I>(&mut self, db: &DbPool, summaries: I) -> Result<Vec<GearRow>>
  where
    I: IntoIterator<Item = GearSummary>,
  {
    let mut added = Vec::new();

    for summary in summaries {
      if self.is_known(&summary.id) {
        continue;
      }
      let row = GearRow::from(summary);
      self.store(db, row.clone()).await?;
      added.push(row);
    }

    Ok(added)
  }

  async fn store(&mut self, db: &DbPool, row: GearRow) -> Result<()> {
    db::insert_gear(db, &row).await?;
    tracing::info!(gear_id = %row.gear_id, name = row.gear_name.as_deref().unwrap_or("-"), "Stored new gear");
    self.persisted.insert(row.gear_id);
    Ok(())
  }
}
