//! Append-only record sinks.
//!
//! A sink stores [`JamRecord`]s in insertion order and can hand back the
//! most recent rows for summaries. Nothing is ever updated or deleted.

pub mod csv_file;
pub mod sheets;

use crate::config::SinkSettings;
use crate::errors::JamError;
use crate::models::{JamRecord, LoggedRow};
use std::time::Duration;

pub use csv_file::CsvFileSink;
pub use sheets::SheetsSink;

/// Durable, human-inspectable log of jam records.
#[allow(async_fn_in_trait)]
pub trait RecordSink {
    /// Append one record, leaving every earlier row untouched.
    async fn append(&self, record: &JamRecord) -> Result<(), JamError>;

    /// The last `n` rows, oldest first.
    async fn recent(&self, n: usize) -> Result<Vec<LoggedRow>, JamError>;

    /// Human-readable location, for log lines.
    fn describe(&self) -> String;
}

/// The sink chosen by configuration.
pub enum AnySink {
    Csv(CsvFileSink),
    Sheets(SheetsSink),
}

impl AnySink {
    pub fn from_settings(settings: &SinkSettings, timeout: Duration) -> Result<Self, JamError> {
        match settings {
            SinkSettings::Csv { path, layout } => {
                Ok(AnySink::Csv(CsvFileSink::new(path.clone(), *layout)))
            }
            SinkSettings::Sheets {
                base_url,
                spreadsheet_id,
                worksheet,
                access_token,
            } => Ok(AnySink::Sheets(SheetsSink::new(
                base_url,
                spreadsheet_id,
                worksheet,
                access_token,
                timeout,
            )?)),
        }
    }
}

impl RecordSink for AnySink {
    async fn append(&self, record: &JamRecord) -> Result<(), JamError> {
        match self {
            AnySink::Csv(sink) => sink.append(record).await,
            AnySink::Sheets(sink) => sink.append(record).await,
        }
    }

    async fn recent(&self, n: usize) -> Result<Vec<LoggedRow>, JamError> {
        match self {
            AnySink::Csv(sink) => sink.recent(n).await,
            AnySink::Sheets(sink) => sink.recent(n).await,
        }
    }

    fn describe(&self) -> String {
        match self {
            AnySink::Csv(sink) => sink.describe(),
            AnySink::Sheets(sink) => sink.describe(),
        }
    }
}

/// Keep the last `n` items of `rows`.
pub(crate) fn tail<T>(mut rows: Vec<T>, n: usize) -> Vec<T> {
    if rows.len() > n {
        rows.drain(..rows.len() - n);
    }
    rows
}
