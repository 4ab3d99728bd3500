use std::path::PathBuf;
use std::process::ExitCode;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};

use strava_ingest::db;
use strava_ingest::logging::init_logging;
use strava_ingest::models::{AthleteLookup, NewAthlete};
use strava_ingest::{run_replay, run_sync, Config, RunContext, SyncReport};

#[derive(Parser)]
#[command(name = "strava-ingest")]
#[command(about = "Incremental Strava activity ingestion into SQLite")]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct AthleteArgs {
  /// Strava athlete id
  #[arg(long)]
  athlete_id: Option<i64>,

  /// First name as stored in the athletes table
  #[arg(long)]
  first_name: Option<String>,
}

impl AthleteArgs {
  fn lookup(self) -> AthleteLookup {
    // the arg group guarantees exactly one is set
    match self.athlete_id {
      Some(id) => AthleteLookup::Id(id),
      None => AthleteLookup::FirstName(self.first_name.unwrap_or_default()),
    }
  }
}

#[derive(Subcommand)]
enum Commands {
  /// Fetch activities newer than the latest stored one
  Sync {
    #[command(flatten)]
    athlete: AthleteArgs,

    /// Only fetch activities that started before this RFC 3339 time
    #[arg(long)]
    before: Option<DateTime<Utc>>,
  },

  /// Rebuild activities from a raw JSON dump directory
  Replay {
    #[command(flatten)]
    athlete: AthleteArgs,

    #[arg(long)]
    dir: PathBuf,
  },

  /// Store API credentials for a new athlete
  RegisterAthlete {
    #[arg(long)]
    athlete_id: i64,

    #[arg(long)]
    client_id: i64,

    #[arg(long)]
    client_secret: String,

    #[arg(long)]
    refresh_token: String,

    #[arg(long)]
    first_name: Option<String>,

    #[arg(long)]
    last_name: Option<String>,
  },
}

#[tokio::main]
async fn main() -> ExitCode {
  let cli = Cli::parse();

  let config = match Config::from_env() {
    Ok(config) => config,
    Err(e) => {
      eprintln!("Configuration error: {}", e);
      return ExitCode::FAILURE;
    }
  };

  init_logging(config.log_format);

  match run(cli.command, config).await {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      tracing::error!(error = %e, "strava-ingest failed");
      ExitCode::FAILURE
    }
  }
}

async fn run(command: Commands, config: Config) -> strava_ingest::Result<()> {
  let pool = db::initialize_db(&config.database_url).await?;

  match command {
    Commands::Sync { athlete, before } => {
      let ctx = RunContext::new(config, pool);
      let report = run_sync(&ctx, &athlete.lookup(), before).await?;
      log_report(&report);
    }
    Commands::Replay { athlete, dir } => {
      let ctx = RunContext::new(config, pool);
      let report = run_replay(&ctx, &athlete.lookup(), &dir).await?;
      log_report(&report);
    }
    Commands::RegisterAthlete {
      athlete_id,
      client_id,
      client_secret,
      refresh_token,
      first_name,
      last_name,
    } => {
      let athlete = NewAthlete {
        athlete_id,
        client_id,
        client_secret,
        refresh_token,
        first_name,
        last_name,
      };
      if db::register_athlete(&pool, &athlete).await? {
        tracing::info!(athlete_id, "Athlete registered");
      } else {
        tracing::warn!(athlete_id, "Athlete already registered, left unchanged");
      }
    }
  }

  Ok(())
}

fn log_report(report: &SyncReport) {
  tracing::info!(
    athlete_id = report.athlete_id,
    fetched = report.fetched,
    appended = report.appended.len(),
    new_locations = report.new_locations,
    new_gear = report.new_gear,
    issues = report.issues.len(),
    backup = ?report.backup,
    "Done"
  );
}
