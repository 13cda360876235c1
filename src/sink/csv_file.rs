//! Local CSV log file.
//!
//! A missing file is an empty log and is created with a header on the first
//! append. Rows are appended in place, so earlier bytes never change, and
//! the read-check-append sequence runs under an exclusive file lock so
//! overlapping runs cannot interleave.

use super::{tail, RecordSink};
use crate::cli::CsvLayout;
use crate::errors::JamError;
use crate::models::{JamRecord, LoggedRow};
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::PathBuf;
use tracing::{debug, info, warn};

const COMPACT_HEADER: [&str; 3] = ["date", "travel_time_min", "jam_score"];
const FULL_HEADER: [&str; 5] = [
    "date",
    "day_of_week",
    "departure_time",
    "jam_score",
    "travel_time_minutes",
];

impl CsvLayout {
    pub fn header(&self) -> &'static [&'static str] {
        match self {
            CsvLayout::Compact => &COMPACT_HEADER,
            CsvLayout::Full => &FULL_HEADER,
        }
    }

    fn row(&self, record: &JamRecord) -> Vec<String> {
        let travel = format!("{:.1}", record.travel_time_minutes);
        let score = format!("{:.1}", record.jam_score);
        match self {
            CsvLayout::Compact => vec![record.date_string(), travel, score],
            CsvLayout::Full => vec![
                record.date_string(),
                record.day_of_week.clone(),
                record.departure_time.clone(),
                score,
                travel,
            ],
        }
    }
}

/// Column positions found in an existing file's header.
struct Columns {
    date: usize,
    travel: usize,
    score: usize,
    day: Option<usize>,
    time: Option<usize>,
}

impl Columns {
    fn parse(&self, rec: &csv::StringRecord) -> Option<LoggedRow> {
        let get = |i: usize| rec.get(i).map(str::trim);
        Some(LoggedRow {
            date: get(self.date)?.to_string(),
            day_of_week: self.day.and_then(get).map(String::from),
            departure_time: self.time.and_then(get).map(String::from),
            travel_time_minutes: get(self.travel)?.parse().ok()?,
            jam_score: get(self.score)?.parse().ok()?,
        })
    }
}

/// CSV file sink.
#[derive(Debug, Clone)]
pub struct CsvFileSink {
    path: PathBuf,
    layout: CsvLayout,
}

impl CsvFileSink {
    pub fn new(path: PathBuf, layout: CsvLayout) -> Self {
        Self { path, layout }
    }

    fn open_locked(&self) -> Result<File, JamError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                JamError::sink(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }

        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(|e| JamError::sink(format!("cannot open {}: {}", self.path.display(), e)))?;

        file.lock()
            .map_err(|e| JamError::sink(format!("cannot lock {}: {}", self.path.display(), e)))?;

        Ok(file)
    }

    fn check_header(&self, existing: &str) -> Result<(), JamError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(existing.as_bytes());
        let found = reader.headers()?;

        if found.iter().ne(self.layout.header().iter().copied()) {
            return Err(JamError::sink(format!(
                "{} has columns [{}], expected [{}]",
                self.path.display(),
                found.iter().collect::<Vec<_>>().join(", "),
                self.layout.header().join(", ")
            )));
        }
        Ok(())
    }

    fn append_sync(&self, record: &JamRecord) -> Result<(), JamError> {
        let mut file = self.open_locked()?;

        let mut existing = String::new();
        file.read_to_string(&mut existing)?;

        let mut out = Vec::new();
        if existing.is_empty() {
            debug!("Starting new log at {}", self.path.display());
        } else {
            self.check_header(&existing)?;
            if !existing.ends_with('\n') {
                out.push(b'\n');
            }
        }

        {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(&mut out);
            if existing.is_empty() {
                writer.write_record(self.layout.header())?;
            }
            writer.write_record(self.layout.row(record))?;
            writer.flush()?;
        }

        file.write_all(&out)?;
        file.sync_data()?;
        Ok(())
    }

    fn recent_sync(&self, n: usize) -> Result<Vec<LoggedRow>, JamError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.path)?;
        let headers = reader.headers()?.clone();
        let column = |names: &[&str]| headers.iter().position(|h| names.contains(&h));

        let date_idx = column(&["date"]);
        let travel_idx = column(&["travel_time_min", "travel_time_minutes"]);
        let score_idx = column(&["jam_score"]);
        let day_idx = column(&["day_of_week"]);
        let time_idx = column(&["departure_time"]);

        let (Some(date), Some(travel), Some(score)) = (date_idx, travel_idx, score_idx) else {
            return Err(JamError::sink(format!(
                "{} is missing date/travel time/jam score columns",
                self.path.display()
            )));
        };
        let columns = Columns {
            date,
            travel,
            score,
            day: day_idx,
            time: time_idx,
        };

        let mut rows = Vec::new();
        for (line, result) in reader.records().enumerate() {
            let parsed = match result {
                Ok(rec) => columns.parse(&rec),
                Err(e) if e.is_io_error() => return Err(e.into()),
                Err(_) => None,
            };
            match parsed {
                Some(row) => rows.push(row),
                None => warn!("Skipping unreadable row {} in {}", line + 2, self.path.display()),
            }
        }

        Ok(tail(rows, n))
    }
}

impl RecordSink for CsvFileSink {
    async fn append(&self, record: &JamRecord) -> Result<(), JamError> {
        let sink = self.clone();
        let record = record.clone();
        tokio::task::spawn_blocking(move || sink.append_sync(&record))
            .await
            .map_err(|e| JamError::sink(format!("CSV writer task failed: {}", e)))??;
        info!("Appended record to {}", self.path.display());
        Ok(())
    }

    async fn recent(&self, n: usize) -> Result<Vec<LoggedRow>, JamError> {
        let sink = self.clone();
        tokio::task::spawn_blocking(move || sink.recent_sync(n))
            .await
            .map_err(|e| JamError::sink(format!("CSV reader task failed: {}", e)))?
    }

    fn describe(&self) -> String {
        format!("CSV file {}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn record(day: u32, travel: f64, score: f64) -> JamRecord {
        let date = NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        JamRecord {
            date,
            day_of_week: date.format("%A").to_string(),
            departure_time: "08:30".to_string(),
            travel_time_minutes: travel,
            jam_score: score,
        }
    }

    #[tokio::test]
    async fn test_creates_file_with_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("jam.csv");
        let sink = CsvFileSink::new(path.clone(), CsvLayout::Compact);

        sink.append(&record(15, 18.0, 50.0)).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "date,travel_time_min,jam_score\n2024-01-15,18.0,50.0\n");
    }

    #[tokio::test]
    async fn test_n_appends_give_n_rows_plus_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs").join("jam.csv");
        let sink = CsvFileSink::new(path.clone(), CsvLayout::Full);

        for day in 1..=5 {
            sink.append(&record(day, 10.0 + day as f64, 90.0)).await.unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 6);
        assert_eq!(
            lines[0],
            "date,day_of_week,departure_time,jam_score,travel_time_minutes"
        );
        assert_eq!(lines[1], "2024-01-01,Monday,08:30,90.0,11.0");
        assert_eq!(lines[5], "2024-01-05,Friday,08:30,90.0,15.0");
    }

    #[tokio::test]
    async fn test_existing_bytes_preserved() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("jam.csv");
        // odd float formatting from an older writer must survive untouched
        let before = "date,travel_time_min,jam_score\n2023-12-01,9.03,99.67\n";
        std::fs::write(&path, before).unwrap();

        let sink = CsvFileSink::new(path.clone(), CsvLayout::Compact);
        sink.append(&record(15, 18.0, 50.0)).await.unwrap();

        let after = std::fs::read_to_string(&path).unwrap();
        assert!(after.starts_with(before));
        assert_eq!(&after[before.len()..], "2024-01-15,18.0,50.0\n");
    }

    #[tokio::test]
    async fn test_missing_trailing_newline_repaired() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("jam.csv");
        std::fs::write(&path, "date,travel_time_min,jam_score\n2023-12-01,9.0,100.0").unwrap();

        let sink = CsvFileSink::new(path.clone(), CsvLayout::Compact);
        sink.append(&record(15, 18.0, 50.0)).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "date,travel_time_min,jam_score\n2023-12-01,9.0,100.0\n2024-01-15,18.0,50.0\n"
        );
    }

    #[tokio::test]
    async fn test_header_mismatch_is_sink_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("jam.csv");
        let before = "Date,Day,Travel Time\n2024-01-01,Monday,12\n";
        std::fs::write(&path, before).unwrap();

        let sink = CsvFileSink::new(path.clone(), CsvLayout::Compact);
        let err = sink.append(&record(15, 18.0, 50.0)).await.unwrap_err();

        assert!(matches!(err, JamError::Sink(_)));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }

    #[tokio::test]
    async fn test_recent_reads_last_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("jam.csv");
        let sink = CsvFileSink::new(path, CsvLayout::Full);

        assert!(sink.recent(2).await.unwrap().is_empty());

        for (day, score) in [(1, 100.0), (2, 75.0), (3, 50.0)] {
            sink.append(&record(day, 12.0, score)).await.unwrap();
        }

        let rows = sink.recent(2).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, "2024-01-02");
        assert_eq!(rows[0].day_of_week.as_deref(), Some("Tuesday"));
        assert_eq!(rows[1].jam_score, 50.0);
        assert_eq!(rows[1].departure_time.as_deref(), Some("08:30"));
    }

    #[tokio::test]
    async fn test_recent_compact_layout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("jam.csv");
        std::fs::write(
            &path,
            "date,travel_time_min,jam_score\n2024-01-01,9.0,100.0\nbroken,row,here\n2024-01-02,18.0,50.0\n",
        )
        .unwrap();

        let sink = CsvFileSink::new(path, CsvLayout::Compact);
        let rows = sink.recent(5).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[1].day_of_week.is_none());
        assert_eq!(rows[1].travel_time_minutes, 18.0);
    }

    #[tokio::test]
    async fn test_recent_skips_short_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("jam.csv");
        std::fs::write(
            &path,
            "date,travel_time_min,jam_score\n2024-01-01,9.0,100.0\n2024-01-02,18.0\n2024-01-03,18.0,50.0\n",
        )
        .unwrap();

        let sink = CsvFileSink::new(path, CsvLayout::Compact);
        let rows = sink.recent(2).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, "2024-01-01");
        assert_eq!(rows[1].date, "2024-01-03");
        assert_eq!(rows[1].jam_score, 50.0);
    }
}
