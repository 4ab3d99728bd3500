use serde::{Deserialize, Serialize};

use crate::strava::{GearDetail, GearSummary};

/// Row in `gear`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct GearRow {
  pub gear_id: String,
  pub gear_name: Option<String>,
  pub brand_name: Option<String>,
  pub model_name: Option<String>,
  pub description: Option<String>,
  pub frame_type: Option<i64>,
  pub is_primary: Option<bool>,
  pub retired: Option<bool>,
  pub distance_meters: Option<f64>,
}

impl From<GearDetail> for GearRow {
  fn from(gear: GearDetail) -> Self {
    Self {
      gear_id: gear.gear_id,
      gear_name: gear.name,
      brand_name: gear.brand_name,
      model_name: gear.model_name,
      description: gear.description,
      frame_type: gear.frame_type,
      is_primary: gear.primary,
      retired: gear.retired,
      distance_meters: gear.distance,
    }
  }
}

/// Used when only the gear reference embedded in an activity is available
impl From<GearSummary> for GearRow {
  fn from(gear: GearSummary) -> Self {
    Self {
      gear_id: gear.id,
      gear_name: gear.name,
      brand_name: None,
      model_name: None,
      description: None,
      frame_type: None,
      is_primary: gear.primary,
      retired: gear.retired,
      distance_meters: gear.distance,
    }
  }
}
