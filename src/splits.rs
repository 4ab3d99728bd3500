//! Mile pace reconstruction from split segments
//!
//! A segment of at least 1600 m is treated as one whole mile whose pace is
//! simply its moving time in minutes. Anything shorter is a partial mile: its
//! marker is the previous whole mile plus `distance / 1609`, and its pace is
//! scaled up by that fraction. The mile counter advances after every segment.
//! Only paces are rounded (4 decimals); markers keep full precision.

use crate::models::{KmSplitRow, MileSplitRow};
use crate::strava::{ActivityDetail, StravaSplit};
use crate::units::{meters_to_miles, round_to};

const WHOLE_MILE_THRESHOLD_M: f64 = 1600.0;
const METERS_PER_MILE: f64 = 1609.0;

/// Pace recorded at a mile marker
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MilePace {
  /// Index of the input segment this pace came from
  pub segment: usize,
  /// 1, 2, 3... for whole miles; fractional for a partial segment
  pub marker: f64,
  /// Minutes per mile
  pub pace: f64,
}

/// Distance in meters and moving time in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitSegment {
  pub distance: f64,
  pub moving_time: i64,
}

impl From<&StravaSplit> for SplitSegment {
  fn from(split: &StravaSplit) -> Self {
    Self {
      distance: split.distance,
      moving_time: split.moving_time,
    }
  }
}

/// Ordered marker -> pace mapping. Zero-length segments produce no marker.
pub fn mile_paces(segments: &[SplitSegment]) -> Vec<MilePace> {
  let mut paces = Vec::with_capacity(segments.len());
  let mut mile = 1.0_f64;

  for (index, segment) in segments.iter().enumerate() {
    let minutes = segment.moving_time as f64 / 60.0;

    if segment.distance < WHOLE_MILE_THRESHOLD_M {
      let fraction = segment.distance / METERS_PER_MILE;
      if fraction > 0.0 {
        paces.push(MilePace {
          segment: index,
          marker: (mile - 1.0) + fraction,
          pace: round_to(minutes / fraction, 4),
        });
      }
    } else {
      paces.push(MilePace {
        segment: index,
        marker: mile,
        pace: round_to(minutes, 4),
      });
    }

    mile += 1.0;
  }

  paces
}

/// Lowest pace; on a tie the earliest marker wins
pub fn fastest_mile(paces: &[MilePace]) -> Option<MilePace> {
  paces.iter().fold(None, |best: Option<MilePace>, candidate| match best {
    Some(b) if b.pace <= candidate.pace => Some(b),
    _ => Some(*candidate),
  })
}

/// ---------------------------------------------------------------------------
/// Split Rows
/// ---------------------------------------------------------------------------

pub fn km_split_rows(activity_id: i64, splits: &[StravaSplit]) -> Vec<KmSplitRow> {
  splits
    .iter()
    .map(|sp| KmSplitRow {
      activity_id,
      split: sp.split,
      distance: sp.distance,
      moving_time: sp.moving_time,
      elapsed_time: sp.elapsed_time,
      average_speed_ms: sp.average_speed,
      heartrate: sp.average_heartrate.map(|hr| round_to(hr, 2)),
      elevation_difference: sp.elevation_difference,
    })
    .collect()
}

/// Mile splits for one activity plus its fastest mile.
///
/// Native mile splits are used when Strava sent them; otherwise they are
/// derived from the kilometer splits.
pub fn mile_split_rows(detail: &ActivityDetail) -> (Vec<MileSplitRow>, Option<MilePace>) {
  let standard = detail.splits_standard.as_deref().unwrap_or_default();
  let metric = detail.splits_metric.as_deref().unwrap_or_default();

  let (source, derived) = if !standard.is_empty() {
    (standard, false)
  } else {
    (metric, true)
  };

  let segments: Vec<SplitSegment> = source.iter().map(SplitSegment::from).collect();
  let paces = mile_paces(&segments);
  let fastest = fastest_mile(&paces);

  let rows = if derived {
    paces
      .iter()
      .enumerate()
      .map(|(n, pace)| mile_row(detail.id, n as i64 + 1, &source[pace.segment], Some(pace), true))
      .collect()
  } else {
    source
      .iter()
      .enumerate()
      .map(|(index, sp)| {
        let pace = paces.iter().find(|p| p.segment == index);
        mile_row(detail.id, sp.split, sp, pace, false)
      })
      .collect()
  };

  (rows, fastest)
}

fn mile_row(
  activity_id: i64,
  split: i64,
  sp: &StravaSplit,
  pace: Option<&MilePace>,
  derived: bool,
) -> MileSplitRow {
  MileSplitRow {
    activity_id,
    split,
    distance: round_to(meters_to_miles(sp.distance), 4),
    moving_time: sp.moving_time,
    elapsed_time: sp.elapsed_time,
    average_speed_ms: sp.average_speed,
    heartrate: sp.average_heartrate.map(|hr| round_to(hr, 2)),
    elevation_difference: sp.elevation_difference,
    mile_marker: pace.map(|p| p.marker),
    pace_min_mile: pace.map(|p| p.pace),
    derived,
  }
}
