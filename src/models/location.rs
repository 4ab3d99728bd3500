use serde::{Deserialize, Serialize};

/// Coordinates are compared at 1e-6 degree resolution (about 0.1 m)
const COORD_SCALE: f64 = 1_000_000.0;

/// Hashable, rounded (latitude, longitude) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CoordKey {
  lat_e6: i64,
  lon_e6: i64,
}

impl CoordKey {
  pub fn new(latitude: f64, longitude: f64) -> Self {
    Self {
      lat_e6: (latitude * COORD_SCALE).round() as i64,
      lon_e6: (longitude * COORD_SCALE).round() as i64,
    }
  }

  /// Build from a Strava `[lat, lng]` array; anything but two components is no location
  pub fn from_latlng(latlng: Option<&[f64]>) -> Option<Self> {
    match latlng {
      Some([lat, lon]) => Some(Self::new(*lat, *lon)),
      _ => None,
    }
  }

  pub fn latitude(&self) -> f64 {
    self.lat_e6 as f64 / COORD_SCALE
  }

  pub fn longitude(&self) -> f64 {
    self.lon_e6 as f64 / COORD_SCALE
  }
}

impl std::fmt::Display for CoordKey {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "({:.6}, {:.6})", self.latitude(), self.longitude())
  }
}

/// Row in `locations`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct LocationRow {
  pub latitude: f64,
  pub longitude: f64,
  pub place_id: Option<i64>,
  pub osm_id: Option<i64>,
  pub country_code: Option<String>,
  pub country: Option<String>,
  pub region: Option<String>,
  pub state_name: Option<String>,
  pub city: Option<String>,
  pub town: Option<String>,
  pub village: Option<String>,
  pub suburb: Option<String>,
  pub quarter: Option<String>,
  pub neighborhood: Option<String>,
  pub street: Option<String>,
  pub postal: Option<String>,
  pub address: Option<String>,
}
