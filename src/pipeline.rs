//! One ingestion run, end to end
//!
//! fetch -> enrich -> validate -> resolve locations and gear -> normalize -> write.
//! Strictly sequential; all intermediate state belongs to the run.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDateTime, Utc};
use tracing::Instrument;

use crate::auth::AuthManager;
use crate::config::Config;
use crate::db::{self, DbPool};
use crate::enricher::{validate_batch, DetailEnricher, EnrichedActivity};
use crate::error::{RecordIssue, Result};
use crate::fetcher::{ActivityFetcher, FetchWindow};
use crate::gear::GearResolver;
use crate::geocode::NominatimGeocoder;
use crate::location::LocationResolver;
use crate::models::{Athlete, AthleteLookup, CoordKey};
use crate::normalize::normalize_batch;
use crate::replay::RawDump;
use crate::strava::StravaClient;
use crate::writer::Writer;

/// Everything a run needs, built once by the caller
pub struct RunContext {
  pub config: Config,
  pub db: DbPool,
  /// Local wall-clock start, used to name the backup file
  pub started_at: NaiveDateTime,
}

impl RunContext {
  pub fn new(config: Config, db: DbPool) -> Self {
    Self {
      config,
      db,
      started_at: Local::now().naive_local(),
    }
  }
}

#[derive(Debug, Default)]
pub struct SyncReport {
  pub athlete_id: i64,
  /// Activities returned by the list endpoint (or found in the dump)
  pub fetched: usize,
  pub appended: Vec<i64>,
  pub new_locations: usize,
  pub new_gear: usize,
  pub issues: Vec<RecordIssue>,
  pub backup: Option<PathBuf>,
}

/// Where gear metadata comes from
enum GearSource<'a> {
  Remote(&'a mut AuthManager),
  /// Only the gear summary inside each activity detail
  Embedded,
}

/// ---------------------------------------------------------------------------
/// Entry Points
/// ---------------------------------------------------------------------------

/// Incremental sync of one athlete against the live API
pub async fn run_sync(
  ctx: &RunContext,
  lookup: &AthleteLookup,
  before: Option<DateTime<Utc>>,
) -> Result<SyncReport> {
  let athlete = db::load_athlete(&ctx.db, lookup)
    .await
    .inspect_err(|e| tracing::error!(%lookup, error = %e, "Could not load athlete"))?;

  let span = tracing::info_span!("ingest_run", athlete_id = athlete.athlete_id, mode = "sync");
  async {
    sync_athlete(ctx, &athlete, before)
      .await
      .inspect_err(|e| tracing::error!(error = %e, "Ingestion run failed"))
  }
  .instrument(span)
  .await
}

/// Rebuild activities from a raw dump without calling the activity API
pub async fn run_replay(ctx: &RunContext, lookup: &AthleteLookup, dir: &Path) -> Result<SyncReport> {
  let athlete = db::load_athlete(&ctx.db, lookup).await?;

  let span = tracing::info_span!("ingest_run", athlete_id = athlete.athlete_id, mode = "replay");
  async {
    replay_athlete(ctx, &athlete, dir)
      .await
      .inspect_err(|e| tracing::error!(error = %e, "Replay failed"))
  }
  .instrument(span)
  .await
}

/// ---------------------------------------------------------------------------
/// Run Stages
/// ---------------------------------------------------------------------------

async fn sync_athlete(
  ctx: &RunContext,
  athlete: &Athlete,
  before: Option<DateTime<Utc>>,
) -> Result<SyncReport> {
  let config = &ctx.config;
  tracing::info!(athlete = %athlete.display_name(), "Starting ingestion run");

  let client = StravaClient::new(&config.strava_api_base, &config.strava_token_url);
  let mut auth = AuthManager::new(client, athlete.credentials(), athlete.refresh_token.clone());
  auth.refresh().await?;

  let dump = config.raw_dump_dir.as_ref().map(RawDump::new);

  let window = FetchWindow::from_cursor(&ctx.db, athlete.athlete_id, before).await?;
  let summaries = ActivityFetcher::new(config.per_page, config.max_pages)
    .fetch_all(&mut auth, window, dump.as_ref())
    .await?;
  let fetched = summaries.len();

  // Skip detail calls for anything already stored
  let persisted = db::persisted_activity_ids(&ctx.db, athlete.athlete_id).await?;
  let mut seen = HashSet::new();
  let summaries: Vec<_> = summaries
    .into_iter()
    .filter(|a| !persisted.contains(&a.id) && seen.insert(a.id))
    .collect();

  if summaries.is_empty() {
    tracing::info!(fetched, "No new activities");
    return Ok(SyncReport {
      athlete_id: athlete.athlete_id,
      fetched,
      ..SyncReport::default()
    });
  }

  let batch = DetailEnricher::new(config.detail_delay)
    .enrich(&mut auth, summaries, dump.as_ref())
    .await?;

  let mut report = finish_batch(ctx, athlete.athlete_id, batch, GearSource::Remote(&mut auth)).await?;
  report.fetched = fetched;
  Ok(report)
}

async fn replay_athlete(ctx: &RunContext, athlete: &Athlete, dir: &Path) -> Result<SyncReport> {
  let batch: Vec<EnrichedActivity> = RawDump::new(dir)
    .load_batch()?
    .into_iter()
    .filter(|a| a.summary.athlete.id == athlete.athlete_id)
    .collect();
  let fetched = batch.len();

  let mut report = finish_batch(ctx, athlete.athlete_id, batch, GearSource::Embedded).await?;
  report.fetched = fetched;
  Ok(report)
}

/// Shared tail of both modes: validate, resolve references, normalize, write
async fn finish_batch(
  ctx: &RunContext,
  athlete_id: i64,
  mut batch: Vec<EnrichedActivity>,
  gear_source: GearSource<'_>,
) -> Result<SyncReport> {
  let config = &ctx.config;
  let mut issues = validate_batch(&mut batch);

  // Locations
  let geocoder = NominatimGeocoder::new(&config.geocoder_base_url, &config.geocoder_user_agent)?;
  let mut locations = LocationResolver::load(&ctx.db, geocoder, config.geocoder_delay).await?;
  let coords = batch
    .iter()
    .filter_map(|a| CoordKey::from_latlng(a.summary.start_latlng.as_deref()));
  locations.resolve_all(&ctx.db, coords).await?;

  // Gear
  let mut gear = GearResolver::load(&ctx.db).await?;
  let new_gear = match gear_source {
    GearSource::Remote(auth) => {
      let ids = gear_ids(&batch);
      gear
        .resolve_all(&ctx.db, auth, ids.iter().map(String::as_str))
        .await?
    }
    GearSource::Embedded => {
      let summaries = batch
        .iter()
        .filter_map(|a| a.detail.as_ref().and_then(|d| d.gear.clone()));
      gear.resolve_from_summaries(&ctx.db, summaries).await?
    }
  };

  let (rows, mut normalize_issues) = normalize_batch(&batch);
  issues.append(&mut normalize_issues);
  for issue in &issues {
    tracing::warn!(activity_id = issue.activity_id(), "{}", issue);
  }

  let written = Writer::new(config.backup_dir.clone())
    .write(&ctx.db, athlete_id, rows, ctx.started_at)
    .await?;

  tracing::info!(
    appended = written.appended.len(),
    new_locations = locations.lookups(),
    new_gear = new_gear.len(),
    issues = issues.len(),
    "Ingestion run complete"
  );

  Ok(SyncReport {
    athlete_id,
    fetched: batch.len(),
    appended: written.appended,
    new_locations: locations.lookups(),
    new_gear: new_gear.len(),
    issues,
    backup: written.backup,
  })
}

/// Distinct gear ids referenced by the batch, in first-seen order
fn gear_ids(batch: &[EnrichedActivity]) -> Vec<String> {
  let mut seen = HashSet::new();
  batch
    .iter()
    .filter_map(|a| {
      a.summary
        .gear_id
        .clone()
        .or_else(|| a.detail.as_ref().and_then(|d| d.gear.as_ref().map(|g| g.id.clone())))
    })
    .filter(|id| seen.insert(id.clone()))
    .collect()
}
