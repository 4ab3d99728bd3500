//! Reverse geocoding through Nominatim (OpenStreetMap)

use reqwest::Client;
use serde::Deserialize;

use crate::models::{CoordKey, LocationRow};

#[derive(Debug, thiserror::Error)]
pub enum GeocodingError {
  #[error("Reverse geocoding request failed: {0}")]
  Request(#[from] reqwest::Error),

  #[error("Reverse geocoding rejected {coord}: {message}")]
  Rejected { coord: String, message: String },
}

/// `format=jsonv2` reverse response; unknown fields are ignored
#[derive(Debug, Deserialize)]
struct NominatimResponse {
  #[serde(default)]
  error: Option<String>,
  #[serde(default)]
  place_id: Option<i64>,
  #[serde(default)]
  osm_id: Option<i64>,
  #[serde(default)]
  display_name: Option<String>,
  #[serde(default)]
  address: NominatimAddress,
}

#[derive(Debug, Default, Deserialize)]
struct NominatimAddress {
  country_code: Option<String>,
  country: Option<String>,
  region: Option<String>,
  county: Option<String>,
  state: Option<String>,
  city: Option<String>,
  town: Option<String>,
  village: Option<String>,
  suburb: Option<String>,
  quarter: Option<String>,
  neighbourhood: Option<String>,
  road: Option<String>,
  postcode: Option<String>,
}

pub struct NominatimGeocoder {
  http: Client,
  base_url: String,
}

impl NominatimGeocoder {
  pub fn new(base_url: impl Into<String>, user_agent: &str) -> Result<Self, GeocodingError> {
    // Nominatim refuses requests without an identifying User-Agent
    let http = Client::builder().user_agent(user_agent).build()?;
    Ok(Self {
      http,
      base_url: base_url.into().trim_end_matches('/').to_string(),
    })
  }

  /// Resolve one coordinate pair to an address row
  pub async fn reverse(&self, coord: CoordKey) -> Result<LocationRow, GeocodingError> {
    let url = format!("{}/reverse", self.base_url);

    let response = self
      .http
      .get(&url)
      .query(&[
        ("format", "jsonv2".to_string()),
        ("lat", format!("{:.6}", coord.latitude())),
        ("lon", format!("{:.6}", coord.longitude())),
        ("addressdetails", "1".to_string()),
      ])
      .send()
      .await?;

    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
      return Err(GeocodingError::Rejected {
        coord: coord.to_string(),
        message: format!("HTTP {}: {}", status, body),
      });
    }

    let parsed: NominatimResponse =
      serde_json::from_str(&body).map_err(|e| GeocodingError::Rejected {
        coord: coord.to_string(),
        message: format!("unparseable response ({}): {}", e, body),
      })?;

    if let Some(error) = parsed.error {
      return Err(GeocodingError::Rejected {
        coord: coord.to_string(),
        message: error,
      });
    }

    Ok(into_location_row(coord, parsed))
  }
}

fn into_location_row(coord: CoordKey, response: NominatimResponse) -> LocationRow {
  let address = response.address;

  LocationRow {
    latitude: coord.latitude(),
    longitude: coord.longitude(),
    place_id: response.place_id,
    osm_id: response.osm_id,
    country_code: address.country_code.map(|c| c.to_uppercase()),
    country: address.country,
    region: address.region.or(address.county),
    state_name: address.state,
    city: address.city,
    town: address.town,
    village: address.village,
    suburb: address.suburb,
    quarter: address.quarter,
    neighborhood: address.neighbourhood,
    street: address.road,
    postal: address.postcode,
    address: response.display_name,
  }
}
