use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogFormat;

const DEFAULT_FILTER: &str = "strava_ingest=debug,info";

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
pub fn init_logging(format: LogFormat) {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

  let registry = tracing_subscriber::registry().with(filter);

  match format {
    LogFormat::Json => registry
      .with(
        tracing_subscriber::fmt::layer()
          .json()
          .with_target(false)
          .with_current_span(true)
          .flatten_event(true),
      )
      .init(),
    LogFormat::Pretty => registry
      .with(tracing_subscriber::fmt::layer().with_target(false))
      .init(),
  }
}
