//! Configuration file handling.
//!
//! Settings come from `.jamlog.toml`, then from CLI flags and their
//! environment variables (a `.env` file is loaded into the environment
//! first). [`Config::settings`] validates the merged result into the
//! immutable [`Settings`] the pipeline runs with.

use crate::cli::{CsvLayout, SinkKind};
use crate::errors::JamError;
use crate::jam::departure::parse_clock;
use crate::jam::DepartureRequest;
use anyhow::{Context, Result};
use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".jamlog.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// The trip being measured.
    #[serde(default)]
    pub route: RouteConfig,

    /// Measurement provider settings.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Which departures to sample on each run.
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Where records are written.
    #[serde(default)]
    pub sink: SinkConfig,

    /// Summary notification.
    #[serde(default)]
    pub notify: NotifyConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Timeout for every HTTP request, in seconds.
    #[serde(default = "default_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            request_timeout_seconds: default_timeout(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

/// Trip settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Origin address.
    #[serde(default)]
    pub origin: String,

    /// Destination address.
    #[serde(default)]
    pub destination: String,

    /// Free-flow travel time in minutes.
    #[serde(default = "default_baseline")]
    pub baseline_minutes: f64,

    /// IANA timezone for departure times and record dates.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            origin: String::new(),
            destination: String::new(),
            baseline_minutes: default_baseline(),
            timezone: default_timezone(),
        }
    }
}

fn default_baseline() -> f64 {
    9.0
}

fn default_timezone() -> String {
    "America/New_York".to_string()
}

/// Distance Matrix settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API base URL.
    #[serde(default = "default_provider_url")]
    pub base_url: String,

    /// API key. Prefer GOOGLE_MAPS_API_KEY over storing it here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_provider_url(),
            api_key: None,
        }
    }
}

fn default_provider_url() -> String {
    "https://maps.googleapis.com".to_string()
}

/// Sampling schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Departure times per run: "now" or HH:MM.
    #[serde(default = "default_departures")]
    pub departures: Vec<String>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            departures: default_departures(),
        }
    }
}

fn default_departures() -> Vec<String> {
    vec!["now".to_string()]
}

/// Record sink settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// `csv` or `sheets`.
    #[serde(default)]
    pub kind: SinkKind,

    /// CSV log path.
    #[serde(default = "default_csv_path")]
    pub csv_path: PathBuf,

    /// CSV column layout.
    #[serde(default)]
    pub csv_layout: CsvLayout,

    /// Spreadsheet id for the sheets sink.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spreadsheet_id: Option<String>,

    /// Worksheet (tab) name.
    #[serde(default = "default_worksheet")]
    pub worksheet: String,

    /// Sheets API base URL.
    #[serde(default = "default_sheets_url")]
    pub sheets_base_url: String,

    /// OAuth access token. Prefer GOOGLE_SHEETS_ACCESS_TOKEN.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            kind: SinkKind::default(),
            csv_path: default_csv_path(),
            csv_layout: CsvLayout::default(),
            spreadsheet_id: None,
            worksheet: default_worksheet(),
            sheets_base_url: default_sheets_url(),
            access_token: None,
        }
    }
}

fn default_csv_path() -> PathBuf {
    PathBuf::from("jam.csv")
}

fn default_worksheet() -> String {
    "Sheet1".to_string()
}

fn default_sheets_url() -> String {
    "https://sheets.googleapis.com".to_string()
}

/// Notification settings. Disabled unless a webhook is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Webhook receiving `{"subject", "text"}` JSON.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,

    /// Departure time (HH:MM) that triggers the summary.
    #[serde(default = "default_trigger")]
    pub trigger_time: String,

    /// Number of recent rows included in the summary.
    #[serde(default = "default_summary_rows")]
    pub rows: usize,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            trigger_time: default_trigger(),
            rows: default_summary_rows(),
        }
    }
}

fn default_trigger() -> String {
    "17:30".to_string()
}

fn default_summary_rows() -> usize {
    2
}

/// Validated, immutable settings for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub origin: String,
    pub destination: String,
    pub baseline_minutes: f64,
    pub timezone: Tz,
    pub departures: Vec<DepartureRequest>,
    pub api_key: String,
    pub provider_base_url: String,
    pub request_timeout: Duration,
    pub sink: SinkSettings,
    pub notify: Option<NotifySettings>,
}

/// Validated sink selection.
#[derive(Debug, Clone)]
pub enum SinkSettings {
    Csv {
        path: PathBuf,
        layout: CsvLayout,
    },
    Sheets {
        base_url: String,
        spreadsheet_id: String,
        worksheet: String,
        access_token: String,
    },
}

/// Validated notification settings.
#[derive(Debug, Clone)]
pub struct NotifySettings {
    pub webhook_url: String,
    pub trigger: NaiveTime,
    pub rows: usize,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// Only values the user actually gave (flag or env var) override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref origin) = args.origin {
            self.route.origin = origin.clone();
        }
        if let Some(ref destination) = args.destination {
            self.route.destination = destination.clone();
        }
        if let Some(baseline) = args.baseline {
            self.route.baseline_minutes = baseline;
        }
        if let Some(ref tz) = args.timezone {
            self.route.timezone = tz.clone();
        }
        if let Some(ref departures) = args.departure {
            self.schedule.departures = departures.clone();
        }

        if args.api_key.is_some() {
            self.provider.api_key = args.api_key.clone();
        }

        if let Some(kind) = args.sink {
            self.sink.kind = kind;
        }
        if let Some(ref path) = args.csv_path {
            self.sink.csv_path = path.clone();
        }
        if let Some(layout) = args.layout {
            self.sink.csv_layout = layout;
        }
        if args.spreadsheet_id.is_some() {
            self.sink.spreadsheet_id = args.spreadsheet_id.clone();
        }
        if let Some(ref worksheet) = args.worksheet {
            self.sink.worksheet = worksheet.clone();
        }
        if args.sheets_token.is_some() {
            self.sink.access_token = args.sheets_token.clone();
        }

        if args.notify_webhook.is_some() {
            self.notify.webhook_url = args.notify_webhook.clone();
        }
        if let Some(ref at) = args.notify_at {
            self.notify.trigger_time = at.clone();
        }

        if let Some(timeout) = args.timeout {
            self.general.request_timeout_seconds = timeout;
        }
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Settings needed to read the sink, without requiring provider credentials.
    pub fn sink_settings(&self) -> Result<SinkSettings, JamError> {
        match self.sink.kind {
            SinkKind::Csv => Ok(SinkSettings::Csv {
                path: self.sink.csv_path.clone(),
                layout: self.sink.csv_layout,
            }),
            SinkKind::Sheets => {
                let spreadsheet_id = non_empty(&self.sink.spreadsheet_id)
                    .ok_or_else(|| JamError::config("sheets sink needs a spreadsheet id"))?;
                let access_token = non_empty(&self.sink.access_token).ok_or_else(|| {
                    JamError::config("sheets sink needs GOOGLE_SHEETS_ACCESS_TOKEN")
                })?;
                if self.sink.worksheet.trim().is_empty() {
                    return Err(JamError::config("worksheet name must not be empty"));
                }
                Ok(SinkSettings::Sheets {
                    base_url: self.sink.sheets_base_url.trim_end_matches('/').to_string(),
                    spreadsheet_id: spreadsheet_id.to_string(),
                    worksheet: self.sink.worksheet.clone(),
                    access_token: access_token.to_string(),
                })
            }
        }
    }

    /// Validate everything a measurement run needs.
    ///
    /// Runs before any network call, so every failure here is a
    /// [`JamError::Configuration`].
    pub fn settings(&self) -> Result<Settings, JamError> {
        let origin = self.route.origin.trim();
        let destination = self.route.destination.trim();
        if origin.is_empty() || destination.is_empty() {
            return Err(JamError::config(
                "route origin and destination must both be set",
            ));
        }

        let baseline_minutes = self.route.baseline_minutes;
        if !baseline_minutes.is_finite() || baseline_minutes <= 0.0 {
            return Err(JamError::config(format!(
                "baseline must be a positive number of minutes, got {}",
                baseline_minutes
            )));
        }

        let timezone: Tz = self
            .route
            .timezone
            .parse()
            .map_err(|_| JamError::config(format!("unknown timezone '{}'", self.route.timezone)))?;

        if self.schedule.departures.is_empty() {
            return Err(JamError::config("at least one departure time is required"));
        }
        let departures = self
            .schedule
            .departures
            .iter()
            .map(|d| d.parse::<DepartureRequest>())
            .collect::<Result<Vec<_>, _>>()?;

        let api_key = non_empty(&self.provider.api_key)
            .ok_or_else(|| JamError::config("GOOGLE_MAPS_API_KEY is not set"))?
            .to_string();

        if self.general.request_timeout_seconds == 0 {
            return Err(JamError::config("request timeout must be at least 1 second"));
        }

        let notify = match non_empty(&self.notify.webhook_url) {
            Some(url) => Some(NotifySettings {
                webhook_url: url.to_string(),
                trigger: parse_clock(self.notify.trigger_time.trim())?,
                rows: self.notify.rows.max(1),
            }),
            None => None,
        };

        Ok(Settings {
            origin: origin.to_string(),
            destination: destination.to_string(),
            baseline_minutes,
            timezone,
            departures,
            api_key,
            provider_base_url: self.provider.base_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(self.general.request_timeout_seconds),
            sink: self.sink_settings()?,
            notify,
        })
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let mut config = Config::default();
        config.route.origin = "123 Example St, Springfield".to_string();
        config.route.destination = "456 Office Ave, Springfield".to_string();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
