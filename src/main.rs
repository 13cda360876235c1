//! jamlog - commute jam-score logger
//!
//! Polls a traffic-aware travel time for a fixed route, scores it against
//! the free-flow baseline and appends one record per sample to a CSV file
//! or a spreadsheet. Meant to be run from cron.
//!
//! Exit codes:
//!   0 - Every sample recorded (notification failures do not count)
//!   1 - Configuration error (nothing was fetched or written)
//!   2 - Measurement failed for at least one sample (no row for it)
//!   3 - Writing to the sink failed

mod cli;
mod config;
mod errors;
mod jam;
mod models;
mod notify;
mod pipeline;
mod provider;
mod report;
mod sink;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::Args;
use config::{Config, DEFAULT_CONFIG_FILE};
use pipeline::{NotificationStatus, RunOptions};
use sink::{AnySink, RecordSink};
use std::time::Duration;
use tracing::{debug, error, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load .env before parsing so clap's env fallbacks can see it
    let dotenv = dotenvy::dotenv();

    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    let mut config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    init_logging(&args, &config);

    info!("jamlog v{}", env!("CARGO_PKG_VERSION"));
    if let Ok(path) = dotenv {
        debug!("Loaded environment from {}", path.display());
    }
    debug!("Arguments: {:?}", args);

    let exit_code = match args.tail {
        Some(n) => handle_tail(&config, n).await,
        None => run_measurement(&config, &args).await,
    };

    std::process::exit(exit_code);
}

/// Handle --init-config: generate a default .jamlog.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", DEFAULT_CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Set route.origin and route.destination, then export GOOGLE_MAPS_API_KEY.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args, config: &Config) {
    let level = if !args.quiet && config.general.verbose {
        tracing::Level::DEBUG
    } else {
        args.log_level()
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Measure, score and record every configured departure. Returns the exit code.
async fn run_measurement(config: &Config, args: &Args) -> i32 {
    let options = RunOptions {
        dry_run: args.dry_run,
    };

    if !args.quiet {
        println!("📡 Measuring {} → {}", config.route.origin, config.route.destination);
    }

    let outcome = match pipeline::run_configured(config, options, Utc::now()).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Run aborted: {}", e);
            eprintln!("\n❌ Error: {}", e);
            return e.exit_code();
        }
    };

    for sample in &outcome.samples {
        match sample.result {
            Ok(ref recorded) => {
                if !args.quiet {
                    print!("{}", report::render_sample(&recorded.record, &recorded.score));
                }
                match recorded.notification {
                    NotificationStatus::Sent if !args.quiet => println!("   📨 Summary sent"),
                    NotificationStatus::Failed(ref reason) => {
                        eprintln!("   ⚠️  Summary not sent: {}", reason)
                    }
                    _ => {}
                }
            }
            Err(ref e) => {
                eprintln!(
                    "❌ {} {}: {} (nothing logged)",
                    sample.departure.date(),
                    sample.departure.clock_string(),
                    e
                );
            }
        }
    }

    let written = outcome.recorded().filter(|r| r.written).count();
    if !args.quiet {
        if args.dry_run {
            println!("\n✅ Dry run complete. Nothing was written.");
        } else {
            println!("\n✅ Logged {} of {} sample(s).", written, outcome.samples.len());
        }
        println!("   Ran at {}", Utc::now().with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S"));
    }

    outcome.exit_code()
}

/// Handle --tail: print the last `n` logged rows.
async fn handle_tail(config: &Config, n: usize) -> i32 {
    let timeout = Duration::from_secs(config.general.request_timeout_seconds.max(1));

    let result = match config.sink_settings() {
        Ok(settings) => match AnySink::from_settings(&settings, timeout) {
            Ok(sink) => {
                println!("📜 Last {} record(s) from {}:\n", n, sink.describe());
                sink.recent(n).await
            }
            Err(e) => Err(e),
        },
        Err(e) => Err(e),
    };

    match result {
        Ok(rows) => {
            print!("{}", report::render_rows(&rows));
            0
        }
        Err(e) => {
            error!("Could not read records: {}", e);
            eprintln!("❌ Error: {}", e);
            e.exit_code()
        }
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default()? {
        Some(config) => Ok(config),
        None => Ok(Config::default()),
    }
}
