//! Per-activity detail retrieval under the API rate limit
//!
//! Strava allows 600 calls per 15 minutes. Detail calls are issued one at a
//! time with a fixed pause between them; there is no adaptive backoff.

use std::time::Duration;

use crate::auth::AuthManager;
use crate::error::{RecordIssue, Result};
use crate::replay::RawDump;
use crate::strava::{ActivityDetail, ActivitySummary};

/// A list-endpoint activity together with its detail fields
#[derive(Debug, Clone)]
pub struct EnrichedActivity {
  pub summary: ActivitySummary,
  /// None until enriched; `validate_batch` guarantees it is set afterwards
  pub detail: Option<ActivityDetail>,
}

impl EnrichedActivity {
  pub fn new(summary: ActivitySummary) -> Self {
    Self {
      summary,
      detail: None,
    }
  }

  pub fn id(&self) -> i64 {
    self.summary.id
  }
}

pub struct DetailEnricher {
  delay: Duration,
}

impl DetailEnricher {
  pub fn new(delay: Duration) -> Self {
    Self { delay }
  }

  /// One detail call per activity, sequentially. The first failure aborts.
  pub async fn enrich(
    &self,
    auth: &mut AuthManager,
    summaries: Vec<ActivitySummary>,
    dump: Option<&RawDump>,
  ) -> Result<Vec<EnrichedActivity>> {
    tracing::info!(count = summaries.len(), "Retrieving additional activity data");

    let mut enriched = Vec::with_capacity(summaries.len());

    for summary in summaries {
      let activity_id = summary.id;

      let (detail, raw) = auth
        .client()
        .get_activity(auth.access_token()?, activity_id)
        .await
        .inspect_err(|e| tracing::error!(activity_id, error = %e, "Activity detail request failed"))?;

      if let Some(dump) = dump {
        dump.write_detail(activity_id, &raw)?;
      }

      enriched.push(EnrichedActivity {
        summary,
        detail: Some(detail),
      });

      tokio::time::sleep(self.delay).await;
      auth.check_expiry().await?;
    }

    tracing::info!("Finished retrieving additional activity data");
    Ok(enriched)
  }
}

/// Make every record structurally complete before normalization.
///
/// A missing or mismatched detail block is replaced with an all-null one and
/// reported; the activity itself is kept.
pub fn validate_batch(batch: &mut [EnrichedActivity]) -> Vec<RecordIssue> {
  let mut issues = Vec::new();

  for activity in batch.iter_mut() {
    let id = activity.id();
    let valid = matches!(&activity.detail, Some(detail) if detail.id == id);

    if !valid {
      activity.detail = Some(ActivityDetail {
        id,
        ..ActivityDetail::default()
      });
      issues.push(RecordIssue::MalformedRecord {
        activity_id: id,
        field: "detail",
      });
    }
  }

  issues
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::PipelineError;
  use crate::strava::StravaError;
  use crate::test_utils::*;
  use mockito::Matcher;

  #[tokio::test]
  async fn test_enrich_merges_detail_by_id() {
    let mut server = mockito::Server::new_async().await;
    let _token = mock_token_endpoint(&mut server, far_future_ts(), 1).await;
    let d1 = mock_detail(&mut server, 1, Some("g1")).await;
    let d2 = mock_detail(&mut server, 2, None).await;

    let mut auth = test_auth_manager(&server);
    auth.refresh().await.unwrap();

    let summaries = vec![
      mock_summary(1, 1, "2024-03-01T10:00:00Z", 5000.0),
      mock_summary(2, 1, "2024-03-02T10:00:00Z", 5000.0),
    ];
    let enriched = DetailEnricher::new(Duration::ZERO)
      .enrich(&mut auth, summaries, None)
      .await
      .unwrap();

    assert_eq!(enriched.len(), 2);
    let first = enriched[0].detail.as_ref().unwrap();
    assert_eq!(first.id, 1);
    assert_eq!(first.gear.as_ref().map(|g| g.id.as_str()), Some("g1"));
    assert!(enriched[1].detail.as_ref().unwrap().gear.is_none());
    d1.assert_async().await;
    d2.assert_async().await;
  }

  #[tokio::test]
  async fn test_expired_token_refreshes_after_each_detail() {
    let mut server = mockito::Server::new_async().await;
    // already expired: every post-call check refreshes again
    let token = mock_token_endpoint(&mut server, 1_000, 3).await;
    let _d1 = mock_detail(&mut server, 1, None).await;
    let _d2 = mock_detail(&mut server, 2, None).await;

    let mut auth = test_auth_manager(&server);
    auth.refresh().await.unwrap();

    let summaries = vec![
      mock_summary(1, 1, "2024-03-01T10:00:00Z", 5000.0),
      mock_summary(2, 1, "2024-03-02T10:00:00Z", 5000.0),
    ];
    let enriched = DetailEnricher::new(Duration::ZERO)
      .enrich(&mut auth, summaries, None)
      .await
      .unwrap();

    assert_eq!(enriched.len(), 2);
    token.assert_async().await;
  }

  #[tokio::test]
  async fn test_pauses_after_each_detail() {
    let mut server = mockito::Server::new_async().await;
    let _token = mock_token_endpoint(&mut server, far_future_ts(), 1).await;
    let _d1 = mock_detail(&mut server, 1, None).await;
    let _d2 = mock_detail(&mut server, 2, None).await;
    let _d3 = mock_detail(&mut server, 3, None).await;

    let mut auth = test_auth_manager(&server);
    auth.refresh().await.unwrap();

    let summaries = vec![
      mock_summary(1, 1, "2024-03-01T10:00:00Z", 5000.0),
      mock_summary(2, 1, "2024-03-02T10:00:00Z", 5000.0),
      mock_summary(3, 1, "2024-03-03T10:00:00Z", 5000.0),
    ];
    let delay = Duration::from_millis(40);
    let start = tokio::time::Instant::now();
    DetailEnricher::new(delay)
      .enrich(&mut auth, summaries, None)
      .await
      .unwrap();

    assert!(start.elapsed() >= delay * 3);
  }

  #[tokio::test]
  async fn test_detail_failure_is_fatal() {
    let mut server = mockito::Server::new_async().await;
    let _token = mock_token_endpoint(&mut server, far_future_ts(), 1).await;
    server
      .mock("GET", "/api/v3/activities/5")
      .match_query(Matcher::Any)
      .with_status(429)
      .with_body(r#"{"message":"Rate Limit Exceeded"}"#)
      .create_async()
      .await;

    let mut auth = test_auth_manager(&server);
    auth.refresh().await.unwrap();

    let err = DetailEnricher::new(Duration::ZERO)
      .enrich(&mut auth, vec![mock_summary(5, 1, "2024-03-01T10:00:00Z", 5000.0)], None)
      .await
      .unwrap_err();

    assert!(matches!(
      err,
      PipelineError::Strava(StravaError::RemoteApi { status: 429, .. })
    ));
  }

  #[test]
  fn test_validate_fills_missing_detail_with_nulls() {
    let mut batch = vec![
      EnrichedActivity::new(mock_summary(1, 1, "2024-03-01T10:00:00Z", 5000.0)),
      EnrichedActivity {
        summary: mock_summary(2, 1, "2024-03-02T10:00:00Z", 5000.0),
        detail: Some(ActivityDetail {
          id: 2,
          calories: Some(300.0),
          ..ActivityDetail::default()
        }),
      },
      EnrichedActivity {
        summary: mock_summary(3, 1, "2024-03-03T10:00:00Z", 5000.0),
        detail: Some(ActivityDetail {
          id: 99,
          ..ActivityDetail::default()
        }),
      },
    ];

    let issues = validate_batch(&mut batch);

    assert_eq!(issues.len(), 2);
    assert_eq!(issues[0].activity_id(), 1);
    assert_eq!(issues[1].activity_id(), 3);
    assert!(batch.iter().all(|a| a.detail.as_ref().map(|d| d.id) == Some(a.id())));
    assert_eq!(batch[1].detail.as_ref().unwrap().calories, Some(300.0));
    assert!(batch[2].detail.as_ref().unwrap().calories.is_none());
  }
}
