//! Incremental, paginated retrieval of the activity list

use chrono::{DateTime, Utc};

use crate::auth::AuthManager;
use crate::db::{self, DbPool};
use crate::error::Result;
use crate::replay::RawDump;
use crate::strava::{ActivitySummary, ListParams};

/// Time bounds for a fetch, as unix timestamps
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchWindow {
  pub after: Option<i64>,
  pub before: Option<i64>,
}

impl FetchWindow {
  /// Cursor policy: start after the newest stored activity, or at epoch 0
  /// when nothing is stored yet.
  ///
  /// `after` is always sent so Strava returns pages oldest first; a run cut
  /// short by the page bound then leaves a cursor the next run can resume from.
  pub async fn from_cursor(
    db: &DbPool,
    athlete_id: i64,
    before: Option<DateTime<Utc>>,
  ) -> Result<Self> {
    let after = db::latest_start_timestamp(db, athlete_id).await?.unwrap_or(0);
    Ok(Self {
      after: Some(after),
      before: before.map(|b| b.timestamp()),
    })
  }
}

pub struct ActivityFetcher {
  per_page: u32,
  max_pages: u32,
}

impl ActivityFetcher {
  pub fn new(per_page: u32, max_pages: u32) -> Self {
    Self {
      per_page: per_page.max(1),
      max_pages: max_pages.max(1),
    }
  }

  /// Walk pages 1, 2, ... until one comes back empty or the page bound is hit.
  ///
  /// Any failed page aborts the whole fetch; nothing gathered so far is returned.
  pub async fn fetch_all(
    &self,
    auth: &mut AuthManager,
    window: FetchWindow,
    dump: Option<&RawDump>,
  ) -> Result<Vec<ActivitySummary>> {
    tracing::info!(after = ?window.after, before = ?window.before, "Retrieving activity list");

    let mut activities = Vec::new();

    for page in 1..=self.max_pages {
      auth.check_expiry().await?;

      let params = ListParams {
        after: window.after,
        before: window.before,
        page,
        per_page: self.per_page,
      };

      let result = auth
        .client()
        .list_activities(auth.access_token()?, &params)
        .await
        .inspect_err(|e| tracing::error!(page, error = %e, "Activity list request failed"))?;

      if let Some(dump) = dump {
        dump.write_list_page(window.after, page, &result.raw)?;
      }

      if result.activities.is_empty() {
        tracing::info!(pages = page - 1, count = activities.len(), "Finished retrieving activity list");
        return Ok(activities);
      }

      tracing::debug!(page, count = result.activities.len(), "Fetched activity page");
      activities.extend(result.activities);
    }

    tracing::warn!(
      max_pages = self.max_pages,
      count = activities.len(),
      "Page limit reached before an empty page; remaining activities will be fetched next run"
    );
    Ok(activities)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::strava::StravaError;
  use crate::error::PipelineError;
  use crate::test_utils::*;
  use mockito::Matcher;

  #[tokio::test]
  async fn test_fetches_until_empty_page() {
    let mut server = mockito::Server::new_async().await;
    let _token = mock_token_endpoint(&mut server, far_future_ts(), 1).await;
    let page1 = mock_list_page(&mut server, 1, &[(1, "2024-03-01T10:00:00Z"), (2, "2024-03-02T10:00:00Z")]).await;
    let page2 = mock_list_page(&mut server, 2, &[(3, "2024-03-03T10:00:00Z")]).await;
    let page3 = mock_list_page(&mut server, 3, &[]).await;

    let mut auth = test_auth_manager(&server);
    let fetcher = ActivityFetcher::new(2, 10);
    let activities = fetcher
      .fetch_all(&mut auth, FetchWindow::default(), None)
      .await
      .unwrap();

    let ids: Vec<i64> = activities.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    page1.assert_async().await;
    page2.assert_async().await;
    page3.assert_async().await;
  }

  #[tokio::test]
  async fn test_stops_at_page_bound() {
    let mut server = mockito::Server::new_async().await;
    let _token = mock_token_endpoint(&mut server, far_future_ts(), 1).await;
    let _page1 = mock_list_page(&mut server, 1, &[(1, "2024-03-01T10:00:00Z")]).await;
    let _page2 = mock_list_page(&mut server, 2, &[(2, "2024-03-02T10:00:00Z")]).await;
    let page3 = server
      .mock("GET", "/api/v3/athlete/activities")
      .match_query(Matcher::UrlEncoded("page".into(), "3".into()))
      .expect(0)
      .create_async()
      .await;

    let mut auth = test_auth_manager(&server);
    let activities = ActivityFetcher::new(1, 2)
      .fetch_all(&mut auth, FetchWindow::default(), None)
      .await
      .unwrap();

    assert_eq!(activities.len(), 2);
    page3.assert_async().await;
  }

  #[tokio::test]
  async fn test_failed_page_aborts_fetch() {
    let mut server = mockito::Server::new_async().await;
    let _token = mock_token_endpoint(&mut server, far_future_ts(), 1).await;
    let _page1 = mock_list_page(&mut server, 1, &[(1, "2024-03-01T10:00:00Z")]).await;
    server
      .mock("GET", "/api/v3/athlete/activities")
      .match_query(Matcher::UrlEncoded("page".into(), "2".into()))
      .with_status(500)
      .with_body("upstream error")
      .create_async()
      .await;

    let mut auth = test_auth_manager(&server);
    let err = ActivityFetcher::new(1, 10)
      .fetch_all(&mut auth, FetchWindow::default(), None)
      .await
      .unwrap_err();

    assert!(matches!(
      err,
      PipelineError::Strava(StravaError::RemoteApi { status: 500, .. })
    ));
  }

  #[tokio::test]
  async fn test_window_uses_latest_stored_activity() {
    let pool = setup_test_db().await;
    seed_test_athlete(&pool, 1).await;
    seed_test_activities(&pool, 1, &[(10, "2024-01-01T08:00:00Z"), (11, "2024-02-01T08:00:00Z")]).await;

    let window = FetchWindow::from_cursor(&pool, 1, None).await.unwrap();
    assert_eq!(window.after, Some(datetime("2024-02-01T08:00:00Z").timestamp()));
    assert_eq!(window.before, None);

    let empty = FetchWindow::from_cursor(&pool, 2, None).await.unwrap();
    assert_eq!(empty.after, Some(0));

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_first_fetch_sends_after_zero() {
    let pool = setup_test_db().await;
    seed_test_athlete(&pool, 1).await;
    let mut server = mockito::Server::new_async().await;
    let _token = mock_token_endpoint(&mut server, far_future_ts(), 1).await;
    let page1 = server
      .mock("GET", "/api/v3/athlete/activities")
      .match_query(Matcher::AllOf(vec![
        Matcher::UrlEncoded("after".into(), "0".into()),
        Matcher::UrlEncoded("page".into(), "1".into()),
      ]))
      .with_status(200)
      .with_body(format!("[{}]", mock_summary_json(1, 1, "2015-06-01T10:00:00Z", 5000.0)))
      .expect(1)
      .create_async()
      .await;
    let _page2 = mock_list_page(&mut server, 2, &[]).await;

    let window = FetchWindow::from_cursor(&pool, 1, None).await.unwrap();
    let mut auth = test_auth_manager(&server);
    let activities = ActivityFetcher::new(1, 10)
      .fetch_all(&mut auth, window, None)
      .await
      .unwrap();

    assert_eq!(activities.len(), 1);
    page1.assert_async().await;

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_raw_pages_are_persisted() {
    let mut server = mockito::Server::new_async().await;
    let _token = mock_token_endpoint(&mut server, far_future_ts(), 1).await;
    let _page1 = mock_list_page(&mut server, 1, &[(1, "2024-03-01T10:00:00Z")]).await;
    let _page2 = mock_list_page(&mut server, 2, &[]).await;
    let dir = tempfile::tempdir().unwrap();
    let dump = RawDump::new(dir.path());

    let mut auth = test_auth_manager(&server);
    ActivityFetcher::new(1, 10)
      .fetch_all(&mut auth, FetchWindow::default(), Some(&dump))
      .await
      .unwrap();

    let (summaries, _) = dump.load().unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].id, 1);
  }
}
