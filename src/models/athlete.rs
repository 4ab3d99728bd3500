use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::strava::ClientCredentials;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Athlete {
  pub athlete_id: i64,
  pub client_id: i64,
  #[serde(skip_serializing)]
  pub client_secret: String,
  #[serde(skip_serializing)]
  pub refresh_token: String,
  pub first_name: Option<String>,
  pub last_name: Option<String>,
  pub created_at: Option<NaiveDateTime>,
}

impl Athlete {
  pub fn credentials(&self) -> ClientCredentials {
    ClientCredentials {
      client_id: self.client_id,
      client_secret: self.client_secret.clone(),
    }
  }

  pub fn display_name(&self) -> String {
    match (&self.first_name, &self.last_name) {
      (Some(first), Some(last)) => format!("{} {}", first, last),
      (Some(first), None) => first.clone(),
      (None, Some(last)) => last.clone(),
      (None, None) => self.athlete_id.to_string(),
    }
  }
}

/// For first-time registration (without created_at)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAthlete {
  pub athlete_id: i64,
  pub client_id: i64,
  pub client_secret: String,
  pub refresh_token: String,
  pub first_name: Option<String>,
  pub last_name: Option<String>,
}

/// How a run picks its athlete
#[derive(Debug, Clone)]
pub enum AthleteLookup {
  Id(i64),
  FirstName(String),
}

impl std::fmt::Display for AthleteLookup {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Id(id) => write!(f, "athlete_id={}", id),
      Self::FirstName(name) => write!(f, "first_name={}", name),
    }
  }
}
