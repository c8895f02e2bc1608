use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use clap::{Parser, ValueEnum};
use marquee_core::{
    ConfigManager, CutoffMode, KeyVault, ProviderResponse, SessionObservation, SessionProvider,
    Tracker, VenueDirectory,
};

/// Batch box-office reconciler for multiplex ticketing sessions.
#[derive(Parser, Debug)]
#[command(name = "marquee")]
#[command(about = "Marquee box-office reconciler")]
struct Args {
    /// Path to the configuration file (created with defaults if missing)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Venue directory JSON file
    #[arg(long)]
    venues: PathBuf,

    /// Directory of captured provider responses (<venue_id>_<date>.json)
    #[arg(long)]
    captures: PathBuf,

    /// Which cutoff the run applies
    #[arg(long, value_enum, default_value = "live")]
    mode: Mode,

    /// Reconcile exactly this date instead of the dates the tracked
    /// movies would target
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Override the configured daily output directory
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    Live,
    Advance,
}

impl From<Mode> for CutoffMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Live => CutoffMode::Live,
            Mode::Advance => CutoffMode::Advance,
        }
    }
}

/// Serves previously captured provider responses from disk. A missing
/// capture file means the venue had nothing on sale for that date.
struct ReplayProvider {
    captures_dir: PathBuf,
}

#[async_trait]
impl SessionProvider for ReplayProvider {
    async fn fetch(&self, venue_id: &str, date: NaiveDate) -> Result<ProviderResponse> {
        let path = self.captures_dir.join(format!("{}_{}.json", venue_id, date));
        if !path.exists() {
            return Ok(ProviderResponse::Unavailable);
        }
        let content = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read capture {}", path.display()))?;
        let sessions: Vec<SessionObservation> = serde_json::from_str(&content)
            .with_context(|| format!("Malformed capture {}", path.display()))?;
        Ok(ProviderResponse::Sessions(sessions))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config_manager = ConfigManager::new(args.config);
    let mut config = config_manager.load()?;
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }
    log::info!(
        "Loaded config from {} ({} tracked movies)",
        config_manager.config_path().display(),
        config.movies.len()
    );

    let directory = VenueDirectory::load(&args.venues)?;
    if directory.is_empty() {
        anyhow::bail!("Venue directory {} is empty", args.venues.display());
    }
    log::info!("{} venues in directory", directory.len());

    let now = Utc::now();
    let mut vault = KeyVault::open(&config.store_dir, config.rotation_interval_days, now)?;

    let provider = Arc::new(ReplayProvider {
        captures_dir: args.captures,
    });
    let tracker = Tracker::new(config, directory, provider);

    let reports = match args.date {
        Some(date) => {
            if let Err(e) = vault.rotate_if_due(now) {
                log::error!("Key rotation aborted: {}", e);
            }
            let report = tracker
                .run_for_date(now, date, args.mode.into(), &vault)
                .await?;
            vec![(date, report)]
        }
        None => tracker.run(now, args.mode.into(), &mut vault).await?,
    };
    for (date, report) in &reports {
        println!(
            "{}: {} movies, {} shows ({} admitted, {} rejected; venues {} ok / {} empty / {} failed)",
            date,
            report.movies,
            report.shows,
            report.admitted,
            report.rejected,
            report.venues_fetched,
            report.venues_unavailable,
            report.venues_failed
        );
    }

    Ok(())
}
