//! Command-line interface argument parsing.
//!
//! Every option can also come from `.jamlog.toml`; values given here (or
//! through their environment variables) win over the file.

use clap::Parser;
use std::path::PathBuf;

/// jamlog - commute jam-score logger
///
/// Asks the traffic provider how long the trip takes right now (or at a
/// given departure time), scores it against the free-flow baseline and
/// appends the result to a CSV file or a spreadsheet.
///
/// Examples:
///   jamlog
///   jamlog --departure 08:30
///   jamlog --departure 07:45,08:00,08:15 --layout full
///   jamlog --sink sheets --spreadsheet-id 1AbC... --worksheet Commute
///   jamlog --tail 5
///   jamlog --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    ///
    /// If not specified, looks for .jamlog.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Trip origin (free-text address)
    #[arg(long, value_name = "ADDRESS", env = "JAMLOG_ORIGIN")]
    pub origin: Option<String>,

    /// Trip destination (free-text address)
    #[arg(long, value_name = "ADDRESS", env = "JAMLOG_DESTINATION")]
    pub destination: Option<String>,

    /// Free-flow travel time in minutes
    #[arg(long, value_name = "MINUTES", env = "JAMLOG_BASELINE_MINUTES")]
    pub baseline: Option<f64>,

    /// Departure time(s): HH:MM or "now" (comma-separated for several samples)
    #[arg(
        short,
        long,
        value_name = "HH:MM",
        value_delimiter = ',',
        env = "DEPARTURE_TIME"
    )]
    pub departure: Option<Vec<String>>,

    /// IANA timezone the departure times are expressed in
    #[arg(long, value_name = "TZ", env = "JAMLOG_TIMEZONE")]
    pub timezone: Option<String>,

    /// Distance Matrix API key
    #[arg(long, env = "GOOGLE_MAPS_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Where records go
    #[arg(long, value_name = "SINK")]
    pub sink: Option<SinkKind>,

    /// CSV log file (csv sink)
    #[arg(long, value_name = "FILE")]
    pub csv_path: Option<PathBuf>,

    /// CSV column layout (csv sink)
    #[arg(long, value_name = "LAYOUT")]
    pub layout: Option<CsvLayout>,

    /// Spreadsheet id (sheets sink)
    #[arg(long, value_name = "ID", env = "JAMLOG_SPREADSHEET_ID")]
    pub spreadsheet_id: Option<String>,

    /// Worksheet name (sheets sink)
    #[arg(long, value_name = "NAME")]
    pub worksheet: Option<String>,

    /// OAuth access token for the spreadsheet API
    #[arg(long, env = "GOOGLE_SHEETS_ACCESS_TOKEN", hide_env_values = true)]
    pub sheets_token: Option<String>,

    /// Webhook that receives the summary notification
    #[arg(long, value_name = "URL", env = "JAMLOG_NOTIFY_WEBHOOK")]
    pub notify_webhook: Option<String>,

    /// Departure time (HH:MM) that triggers the summary notification
    #[arg(long, value_name = "HH:MM")]
    pub notify_at: Option<String>,

    /// HTTP request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Fetch and score, but do not write or notify
    #[arg(long)]
    pub dry_run: bool,

    /// Print the last N logged rows and exit
    #[arg(long, value_name = "N", conflicts_with = "dry_run")]
    pub tail: Option<usize>,

    /// Generate a default .jamlog.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Record destination.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Local CSV file (default)
    #[default]
    Csv,
    /// Google Sheets worksheet
    Sheets,
}

/// Column layout of the CSV sink.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum CsvLayout {
    /// date, travel_time_min, jam_score
    #[default]
    Compact,
    /// date, day_of_week, departure_time, jam_score, travel_time_minutes
    Full,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if self.tail == Some(0) {
            return Err("--tail must be at least 1".to_string());
        }

        if let Some(ref url) = self.notify_webhook {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Webhook URL must start with 'http://' or 'https://'".to_string());
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
