//! Gig Crawler CLI
//!
//! Local execution entry point.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use gig_crawler::{
    error::{AppError, Result},
    models::{Config, TimingConfig},
    pipeline::{self, Orchestrator},
    services::{
        ApiHarvester, BrowserHarvester,
        browser::{ChromiumLauncher, find_chromium},
    },
    storage::{LocalStorage, RunStorage},
    utils::timing::pacer_from_config,
};

/// Gig Crawler - paid gig listing harvester
#[derive(Parser, Debug)]
#[command(
    name = "gig-crawler",
    version,
    about = "Harvests paid gig listings via the search API with a browser fallback"
)]
struct Cli {
    /// Path to storage directory containing config.toml and saved runs
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Harvest every current paid gig and save the run
    Run {
        /// Skip humanized delays
        #[arg(long)]
        no_delay: bool,

        /// Go straight to the browser, skipping the API
        #[arg(long)]
        browser_only: bool,
    },

    /// Validate configuration file
    Validate,

    /// Estimate a day's earnings from a saved run
    Report {
        /// Run to report on (default: latest)
        #[arg(long)]
        run: Option<u64>,
    },

    /// Show storage and browser info
    Info,
}

/// Initialize logging based on verbosity flag and configured level.
fn init_logging(verbose: bool, default_level: &str) {
    let level = if verbose { "debug" } else { default_level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.storage_dir.join("config.toml");
    let config = Config::load_or_default(&config_path);
    init_logging(cli.verbose, &config.logging.level);

    log::info!("Gig Crawler starting...");
    log::info!("Loaded configuration from {}", cli.storage_dir.display());

    let storage = LocalStorage::new(&cli.storage_dir);

    match cli.command {
        Command::Run {
            no_delay,
            browser_only,
        } => {
            config.validate()?;

            let timing = TimingConfig {
                humanize: config.timing.humanize && !no_delay,
                ..config.timing.clone()
            };
            let pacer = pacer_from_config(&timing);

            let launcher = Arc::new(ChromiumLauncher::new(config.browser.clone()));
            let browser = BrowserHarvester::new(config.browser.clone(), launcher, Arc::clone(&pacer));

            let (run_id, run) = if browser_only {
                let run = pipeline::collect_with(&browser).await?;
                (storage.save_run(&run).await?, run)
            } else {
                let api = ApiHarvester::new(config.api.clone(), Arc::clone(&pacer));
                Orchestrator::new(Box::new(api), Box::new(browser), pacer)
                    .run(&storage)
                    .await?
            };

            log::info!(
                "Run {} complete: {} gigs via {} in {:.1}s",
                run_id,
                run.records.len(),
                run.strategy_used,
                run.duration_seconds
            );
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");

            log::info!("All validations passed!");
        }

        Command::Report { run } => {
            let run_id = match run {
                Some(id) => id,
                None => storage
                    .latest_run_id()
                    .await?
                    .ok_or_else(|| AppError::storage("No runs saved yet. Use 'run' first."))?,
            };

            let stored = storage
                .load_run(run_id)
                .await?
                .ok_or_else(|| AppError::storage(format!("Run {} not found", run_id)))?;

            log::info!(
                "Run {}: {} gigs via {} recorded at {}",
                stored.run_id,
                stored.gig_count,
                stored.strategy_used,
                stored.recorded_at
            );
            match pipeline::estimate_hourly(&stored.gigs) {
                Some(daily) => log::info!(
                    "If you worked 8 hours a day you could make around {:.2} dollars.",
                    daily
                ),
                None => log::warn!("No gig in run {} carries a usable compensation estimate", run_id),
            }
        }

        Command::Info => {
            log::info!("Storage directory: {}", cli.storage_dir.display());
            log::info!(
                "Config: {}",
                if config_path.exists() {
                    "exists"
                } else {
                    "not found (using defaults)"
                }
            );
            log::info!("API endpoint: {}", config.api.api_url);
            log::info!("Search page: {}", config.api.site_url());

            let chrome = config.browser.chrome_executable.clone().or_else(find_chromium);
            match chrome {
                Some(path) => log::info!("Browser: {}", path.display()),
                None => log::warn!("Browser: not found (browser fallback unavailable)"),
            }

            match storage.latest_run_id().await? {
                Some(id) => log::info!("Latest run: {}", id),
                None => log::info!("No runs saved yet."),
            }
        }
    }

    log::info!("Done!");

    Ok(())
}
