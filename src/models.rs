//! Data models for the jam logger.
//!
//! A [`JamRecord`] is one observed travel-time sample; a [`LoggedRow`] is a
//! row read back from a sink, which may carry fewer columns.

use crate::jam::{round1_positive, Departure, JamScore};
use chrono::NaiveDate;
use std::fmt;

/// One travel-time sample, ready to be appended to a sink.
///
/// All date fields come from the resolved [`Departure`]; the numeric fields
/// are rounded to one decimal here and nowhere earlier, staying above zero.
#[derive(Debug, Clone, PartialEq)]
pub struct JamRecord {
    /// Local calendar date of the departure.
    pub date: NaiveDate,
    /// English weekday name of `date`.
    pub day_of_week: String,
    /// Local departure clock time, `HH:MM`.
    pub departure_time: String,
    /// Travel time including traffic, minutes, one decimal.
    pub travel_time_minutes: f64,
    /// Jam score percentage, one decimal.
    pub jam_score: f64,
}

impl JamRecord {
    pub fn new(departure: &Departure, score: &JamScore) -> Self {
        Self {
            date: departure.date(),
            day_of_week: departure.day_of_week(),
            departure_time: departure.clock_string(),
            travel_time_minutes: round1_positive(score.travel_time_minutes),
            jam_score: round1_positive(score.score),
        }
    }

    /// `YYYY-MM-DD`.
    pub fn date_string(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }

    /// Row for the spreadsheet sink. Column order is part of the contract.
    pub fn sheet_row(&self) -> Vec<serde_json::Value> {
        vec![
            self.date_string().into(),
            self.day_of_week.clone().into(),
            self.departure_time.clone().into(),
            self.jam_score.into(),
            self.travel_time_minutes.into(),
        ]
    }
}

/// A row read back from a sink for summaries.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedRow {
    pub date: String,
    pub day_of_week: Option<String>,
    pub departure_time: Option<String>,
    pub travel_time_minutes: f64,
    pub jam_score: f64,
}

impl From<&JamRecord> for LoggedRow {
    fn from(record: &JamRecord) -> Self {
        Self {
            date: record.date_string(),
            day_of_week: Some(record.day_of_week.clone()),
            departure_time: Some(record.departure_time.clone()),
            travel_time_minutes: record.travel_time_minutes,
            jam_score: record.jam_score,
        }
    }
}

impl fmt::Display for LoggedRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.date)?;
        if let Some(ref day) = self.day_of_week {
            write!(f, " ({})", day)?;
        }
        if let Some(ref time) = self.departure_time {
            write!(f, " {}", time)?;
        }
        write!(
            f,
            ": {:.1} min, jam score {:.1}%",
            self.travel_time_minutes, self.jam_score
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jam::{jam_score, DepartureResolver};
    use chrono::{TimeZone, Utc};
    use chrono_tz::America::New_York;

    fn record(seconds: f64) -> JamRecord {
        let dep = DepartureResolver::new(New_York)
            .resolve(
                "08:30".parse().unwrap(),
                Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap(),
            )
            .unwrap();
        JamRecord::new(&dep, &jam_score(seconds, 9.0).unwrap())
    }

    #[test]
    fn test_record_fields_come_from_departure() {
        let r = record(1080.0);
        assert_eq!(r.date_string(), "2024-01-15");
        assert_eq!(r.day_of_week, "Monday");
        assert_eq!(r.departure_time, "08:30");
        assert_eq!(r.travel_time_minutes, 18.0);
        assert_eq!(r.jam_score, 50.0);
    }

    #[test]
    fn test_rounding_keeps_values_positive() {
        let fast = record(2.0);
        assert_eq!(fast.travel_time_minutes, 0.1);
        assert_eq!(fast.jam_score, 100.0);

        let dep = DepartureResolver::new(New_York)
            .resolve(
                "08:30".parse().unwrap(),
                Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap(),
            )
            .unwrap();
        let slow = JamRecord::new(&dep, &jam_score(2_000_000.0, 0.5).unwrap());
        assert!(slow.jam_score > 0.0 && slow.jam_score <= 100.0);
        assert_eq!(slow.jam_score, 0.1);
    }

    #[test]
    fn test_sheet_row_order() {
        let row = record(540.0).sheet_row();
        assert_eq!(
            row,
            vec![
                serde_json::json!("2024-01-15"),
                serde_json::json!("Monday"),
                serde_json::json!("08:30"),
                serde_json::json!(100.0),
                serde_json::json!(9.0),
            ]
        );
    }

    #[test]
    fn test_logged_row_display() {
        let row = LoggedRow::from(&record(1080.0));
        assert_eq!(
            row.to_string(),
            "2024-01-15 (Monday) 08:30: 18.0 min, jam score 50.0%"
        );

        let compact = LoggedRow {
            day_of_week: None,
            departure_time: None,
            ..row
        };
        assert_eq!(compact.to_string(), "2024-01-15: 18.0 min, jam score 50.0%");
    }
}
