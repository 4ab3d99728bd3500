//! Access token lifecycle for one ingestion run
//!
//! The manager starts without a token, refreshes once on construction, and
//! refreshes again whenever a guarded call finds the token past its expiry.

use chrono::{DateTime, Utc};

use crate::strava::{ClientCredentials, StravaClient, StravaError, StravaTokens};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
  Unauthenticated,
  Authenticated,
  Expired,
}

pub struct AuthManager {
  client: StravaClient,
  credentials: ClientCredentials,
  refresh_token: String,
  tokens: Option<StravaTokens>,
}

impl AuthManager {
  pub fn new(client: StravaClient, credentials: ClientCredentials, refresh_token: String) -> Self {
    Self {
      client,
      credentials,
      refresh_token,
      tokens: None,
    }
  }

  pub fn state_at(&self, now: DateTime<Utc>) -> AuthState {
    match &self.tokens {
      None => AuthState::Unauthenticated,
      Some(tokens) if tokens.is_expired_at(now) => AuthState::Expired,
      Some(_) => AuthState::Authenticated,
    }
  }

  pub fn expires_at(&self) -> Option<DateTime<Utc>> {
    self.tokens.as_ref().map(|t| t.expires_at)
  }

  /// Exchange the refresh token for a new access token. A rejection is fatal.
  pub async fn refresh(&mut self) -> Result<(), StravaError> {
    let tokens = self
      .client
      .refresh_tokens(&self.credentials, &self.refresh_token)
      .await
      .inspect_err(|e| tracing::error!(error = %e, "Strava token refresh rejected"))?;

    tracing::info!(
      expires_at = %tokens.expires_at.format("%Y-%m-%d %H:%M:%S"),
      "Access token refreshed"
    );

    // Strava may rotate the refresh token; the new one is only kept for this run
    if tokens.refresh_token != self.refresh_token {
      tracing::debug!("Strava issued a new refresh token");
      self.refresh_token = tokens.refresh_token.clone();
    }

    self.tokens = Some(tokens);
    Ok(())
  }

  /// Refresh if the token is missing or past its expiry
  pub async fn check_expiry(&mut self) -> Result<(), StravaError> {
    self.check_expiry_at(Utc::now()).await
  }

  pub async fn check_expiry_at(&mut self, now: DateTime<Utc>) -> Result<(), StravaError> {
    match self.state_at(now) {
      AuthState::Authenticated => Ok(()),
      AuthState::Expired => {
        tracing::info!("Access token expired, refreshing");
        self.refresh().await
      }
      AuthState::Unauthenticated => self.refresh().await,
    }
  }

  pub fn access_token(&self) -> Result<&str, StravaError> {
    self
      .tokens
      .as_ref()
      .map(|t| t.access_token.as_str())
      .ok_or(StravaError::NotAuthenticated)
  }

  pub fn client(&self) -> &StravaClient {
    &self.client
  }
}
