use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// ---------------------------------------------------------------------------
/// OAuth Data Structures
/// ---------------------------------------------------------------------------

/// Per-athlete API application credentials
#[derive(Debug, Clone)]
pub struct ClientCredentials {
  pub client_id: i64,
  pub client_secret: String,
}

/// Response from Strava token endpoint
#[allow(dead_code)]
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
  pub access_token: String,
  pub refresh_token: String,
  pub expires_at: i64,
  #[serde(default)]
  pub token_type: Option<String>,
}

/// Token state held for the duration of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StravaTokens {
  pub access_token: String,
  pub refresh_token: String,
  pub expires_at: DateTime<Utc>,
}

impl StravaTokens {
  pub fn from_response(resp: TokenResponse) -> Self {
    Self {
      access_token: resp.access_token,
      refresh_token: resp.refresh_token,
      expires_at: DateTime::from_timestamp(resp.expires_at, 0).unwrap_or_else(Utc::now),
    }
  }

  pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
    now > self.expires_at
  }
}

/// ---------------------------------------------------------------------------
/// Error Handling
/// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum StravaError {
  #[error("Authentication failed: {0}")]
  Authentication(String),

  #[error("{endpoint} returned HTTP {status}: {body}")]
  RemoteApi {
    endpoint: &'static str,
    status: u16,
    body: String,
  },

  #[error("HTTP request failed: {0}")]
  Request(#[from] reqwest::Error),

  #[error("Failed to parse {endpoint} response: {message}")]
  Parse {
    endpoint: &'static str,
    message: String,
  },

  #[error("Not authenticated with Strava")]
  NotAuthenticated,
}

/// ---------------------------------------------------------------------------
/// Strava API - Wire Types
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AthleteRef {
  pub id: i64,
}

/// Activity as returned by the list endpoint
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ActivitySummary {
  pub id: i64,
  pub athlete: AthleteRef,
  #[serde(default)]
  pub name: String,
  #[serde(rename = "type", default)]
  pub activity_type: String,
  #[serde(default)]
  pub sport_type: Option<String>,
  #[serde(default)]
  pub workout_type: Option<i64>,
  #[serde(default)]
  pub distance: f64,
  #[serde(default)]
  pub moving_time: i64,
  #[serde(default)]
  pub elapsed_time: i64,
  #[serde(default)]
  pub total_elevation_gain: Option<f64>,
  pub start_date: DateTime<Utc>,
  /// Local wall-clock time; Strava tags it with a `Z` suffix anyway
  pub start_date_local: DateTime<Utc>,
  #[serde(default)]
  pub timezone: Option<String>,
  #[serde(default)]
  pub start_latlng: Option<Vec<f64>>,
  #[serde(default)]
  pub end_latlng: Option<Vec<f64>>,
  #[serde(default)]
  pub achievement_count: Option<i64>,
  #[serde(default)]
  pub pr_count: Option<i64>,
  #[serde(default)]
  pub athlete_count: Option<i64>,
  #[serde(default)]
  pub commute: Option<bool>,
  #[serde(default)]
  pub average_speed: Option<f64>,
  #[serde(default)]
  pub max_speed: Option<f64>,
  #[serde(default)]
  pub has_heartrate: Option<bool>,
  #[serde(default)]
  pub average_heartrate: Option<f64>,
  #[serde(default)]
  pub max_heartrate: Option<f64>,
  #[serde(default)]
  pub elev_high: Option<f64>,
  #[serde(default)]
  pub elev_low: Option<f64>,
  #[serde(default)]
  pub average_watts: Option<f64>,
  #[serde(default)]
  pub kilojoules: Option<f64>,
  #[serde(default)]
  pub gear_id: Option<String>,
  #[serde(default)]
  pub upload_id: Option<i64>,
  #[serde(default)]
  pub external_id: Option<String>,
}

/// One split segment (either a kilometer or a mile)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StravaSplit {
  pub split: i64,
  #[serde(default)]
  pub distance: f64,
  #[serde(default)]
  pub moving_time: i64,
  #[serde(default)]
  pub elapsed_time: i64,
  #[serde(default)]
  pub average_speed: Option<f64>,
  #[serde(default)]
  pub average_heartrate: Option<f64>,
  #[serde(default)]
  pub elevation_difference: Option<f64>,
}

/// Gear reference embedded in a detailed activity
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GearSummary {
  pub id: String,
  #[serde(default)]
  pub name: Option<String>,
  #[serde(default)]
  pub primary: Option<bool>,
  #[serde(default)]
  pub retired: Option<bool>,
  #[serde(default)]
  pub distance: Option<f64>,
}

/// Fields only available from the per-activity endpoint
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ActivityDetail {
  pub id: i64,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub calories: Option<f64>,
  #[serde(default)]
  pub device_name: Option<String>,
  #[serde(default)]
  pub perceived_exertion: Option<f64>,
  #[serde(default)]
  pub gear: Option<GearSummary>,
  #[serde(default)]
  pub splits_metric: Option<Vec<StravaSplit>>,
  #[serde(default)]
  pub splits_standard: Option<Vec<StravaSplit>>,
}

/// Full gear record from the gear endpoint; fields not listed here are dropped
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GearDetail {
  #[serde(rename = "id")]
  pub gear_id: String,
  #[serde(default)]
  pub name: Option<String>,
  #[serde(default)]
  pub brand_name: Option<String>,
  #[serde(default)]
  pub model_name: Option<String>,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub frame_type: Option<i64>,
  #[serde(default)]
  pub primary: Option<bool>,
  #[serde(default)]
  pub retired: Option<bool>,
  #[serde(default)]
  pub distance: Option<f64>,
}

/// Query window for the activity list endpoint
#[derive(Debug, Clone, Copy)]
pub struct ListParams {
  pub after: Option<i64>,
  pub before: Option<i64>,
  pub page: u32,
  pub per_page: u32,
}

/// A parsed list page plus the body it came from
#[derive(Debug)]
pub struct ActivityPage {
  pub activities: Vec<ActivitySummary>,
  pub raw: String,
}

/// ---------------------------------------------------------------------------
/// Strava API Client
/// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct StravaClient {
  http: Client,
  api_base: String,
  token_url: String,
}

impl StravaClient {
  pub fn new(api_base: impl Into<String>, token_url: impl Into<String>) -> Self {
    Self {
      http: Client::new(),
      api_base: api_base.into().trim_end_matches('/').to_string(),
      token_url: token_url.into(),
    }
  }

  /// Exchange a refresh token for a fresh access token.
  pub async fn refresh_tokens(
    &self,
    credentials: &ClientCredentials,
    refresh_token: &str,
  ) -> Result<StravaTokens, StravaError> {
    let client_id = credentials.client_id.to_string();

    let response = self
      .http
      .post(&self.token_url)
      .form(&[
        ("client_id", client_id.as_str()),
        ("client_secret", credentials.client_secret.as_str()),
        ("refresh_token", refresh_token),
        ("grant_type", "refresh_token"),
      ])
      .send()
      .await?;

    if !response.status().is_success() {
      let status = response.status();
      let error_text = response.text().await.unwrap_or_default();
      return Err(StravaError::Authentication(format!(
        "Token refresh failed ({}): {}",
        status, error_text
      )));
    }

    let token_response: TokenResponse = response.json().await?;
    Ok(StravaTokens::from_response(token_response))
  }

  /// Fetch one page of the authenticated athlete's activities
  pub async fn list_activities(
    &self,
    access_token: &str,
    params: &ListParams,
  ) -> Result<ActivityPage, StravaError> {
    let mut query = vec![
      ("page", params.page.to_string()),
      ("per_page", params.per_page.to_string()),
    ];
    if let Some(after) = params.after {
      query.push(("after", after.to_string()));
    }
    if let Some(before) = params.before {
      query.push(("before", before.to_string()));
    }

    let url = format!("{}/athlete/activities", self.api_base);
    let raw = self.get_text("activity list", &url, access_token, &query).await?;
    let activities = parse_body("activity list", &raw)?;

    Ok(ActivityPage { activities, raw })
  }

  /// Fetch the detailed representation of one activity
  pub async fn get_activity(
    &self,
    access_token: &str,
    activity_id: i64,
  ) -> Result<(ActivityDetail, String), StravaError> {
    let url = format!("{}/activities/{}", self.api_base, activity_id);
    let query = [("include_all_efforts", "false".to_string())];
    let raw = self.get_text("activity detail", &url, access_token, &query).await?;
    let detail = parse_body("activity detail", &raw)?;
    Ok((detail, raw))
  }

  pub async fn get_gear(&self, access_token: &str, gear_id: &str) -> Result<GearDetail, StravaError> {
    let url = format!("{}/gear/{}", self.api_base, gear_id);
    let raw = self.get_text("gear", &url, access_token, &[]).await?;
    parse_body("gear", &raw)
  }

  /// GET with bearer auth; any non-2xx status is an error carrying the body
  async fn get_text(
    &self,
    endpoint: &'static str,
    url: &str,
    access_token: &str,
    query: &[(&str, String)],
  ) -> Result<String, StravaError> {
    let response = self
      .http
      .get(url)
      .bearer_auth(access_token)
      .query(query)
      .send()
      .await?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(StravaError::RemoteApi {
        endpoint,
        status: status.as_u16(),
        body,
      });
    }

    Ok(response.text().await?)
  }
}

fn parse_body<T: DeserializeOwned>(endpoint: &'static str, raw: &str) -> Result<T, StravaError> {
  serde_json::from_str(raw).map_err(|e| {
    tracing::error!(
      endpoint,
      error = %e,
      body = %raw.chars().take(500).collect::<String>(),
      "Failed to parse Strava response"
    );
    StravaError::Parse {
      endpoint,
      message: e.to_string(),
    }
  })
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
