//! Raw API response persistence and offline replay
//!
//! Layout under the dump root:
//!   activity_lists/after_<cursor>_page_<n>.json   one list page body
//!   individual_activities/<activity_id>.json      one detail body

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use crate::enricher::EnrichedActivity;
use crate::error::{PipelineError, Result};
use crate::strava::{ActivityDetail, ActivitySummary};

const LIST_DIR: &str = "activity_lists";
const DETAIL_DIR: &str = "individual_activities";

#[derive(Debug, Clone)]
pub struct RawDump {
  root: PathBuf,
}

impl RawDump {
  pub fn new(root: impl AsRef<Path>) -> Self {
    Self {
      root: root.as_ref().to_path_buf(),
    }
  }

  pub fn write_list_page(&self, after: Option<i64>, page: u32, raw: &str) -> Result<PathBuf> {
    let dir = self.root.join(LIST_DIR);
    fs::create_dir_all(&dir)?;
    let path = dir.join(format!("after_{}_page_{:05}.json", after.unwrap_or(0), page));
    fs::write(&path, raw)?;
    Ok(path)
  }

  pub fn write_detail(&self, activity_id: i64, raw: &str) -> Result<PathBuf> {
    let dir = self.root.join(DETAIL_DIR);
    fs::create_dir_all(&dir)?;
    let path = dir.join(format!("{}.json", activity_id));
    fs::write(&path, raw)?;
    Ok(path)
  }

  /// Read back every stored list page and detail body.
  ///
  /// Summaries are deduplicated by id (first seen wins) and ordered by start
  /// date; details are keyed by the id inside each body.
  pub fn load(&self) -> Result<(Vec<ActivitySummary>, HashMap<i64, ActivityDetail>)> {
    let mut seen = HashSet::new();
    let mut summaries = Vec::new();

    for path in json_files(&self.root.join(LIST_DIR))? {
      let page: Vec<ActivitySummary> = read_json(&path)?;
      summaries.extend(page.into_iter().filter(|a| seen.insert(a.id)));
    }
    summaries.sort_by_key(|a| a.start_date);

    let mut details = HashMap::new();
    for path in json_files(&self.root.join(DETAIL_DIR))? {
      let detail: ActivityDetail = read_json(&path)?;
      details.insert(detail.id, detail);
    }

    tracing::info!(
      root = %self.root.display(),
      activities = summaries.len(),
      details = details.len(),
      "Loaded raw dump"
    );

    Ok((summaries, details))
  }

  /// Join stored summaries with their details; activities without one are left unenriched
  pub fn load_batch(&self) -> Result<Vec<EnrichedActivity>> {
    let (summaries, mut details) = self.load()?;

    Ok(
      summaries
        .into_iter()
        .map(|summary| {
          let detail = details.remove(&summary.id);
          EnrichedActivity { summary, detail }
        })
        .collect(),
    )
  }
}

/// `*.json` files in name order; a missing directory is empty
fn json_files(dir: &Path) -> Result<Vec<PathBuf>> {
  if !dir.is_dir() {
    return Ok(Vec::new());
  }

  let mut files = Vec::new();
  for entry in fs::read_dir(dir)? {
    let path = entry?.path();
    if path.extension().is_some_and(|ext| ext == "json") {
      files.push(path);
    }
  }
  files.sort();
  Ok(files)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
  let raw = fs::read_to_string(path)?;
  serde_json::from_str(&raw).map_err(|source| PipelineError::Json {
    path: path.display().to_string(),
    source,
  })
}
