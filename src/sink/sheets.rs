//! Google Sheets worksheet sink.
//!
//! Rows go through the `values:append` endpoint, which appends atomically
//! after the last row of the table, so no read-modify-write is involved.

use super::{tail, RecordSink};
use crate::errors::JamError;
use crate::models::{JamRecord, LoggedRow};
use reqwest::Url;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Spreadsheet sink.
pub struct SheetsSink {
    http_client: reqwest::Client,
    base_url: String,
    spreadsheet_id: String,
    worksheet: String,
    access_token: String,
}

impl SheetsSink {
    pub fn new(
        base_url: &str,
        spreadsheet_id: &str,
        worksheet: &str,
        access_token: &str,
        timeout: Duration,
    ) -> Result<Self, JamError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| JamError::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.to_string(),
            spreadsheet_id: spreadsheet_id.to_string(),
            worksheet: worksheet.to_string(),
            access_token: access_token.to_string(),
        })
    }

    /// A1 range covering the record columns, sheet name quoted.
    fn range(&self) -> String {
        format!("'{}'!A:E", self.worksheet.replace('\'', "''"))
    }

    fn values_url(&self, suffix: &str) -> Result<Url, JamError> {
        let last = format!("{}{}", self.range(), suffix);
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| JamError::config(format!("invalid sheets URL {}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| JamError::config(format!("invalid sheets URL {}", self.base_url)))?
            .pop_if_empty()
            .extend([
                "v4",
                "spreadsheets",
                self.spreadsheet_id.as_str(),
                "values",
                last.as_str(),
            ]);
        Ok(url)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, JamError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(JamError::sink(format!("Sheets API error {}: {}", status, body)))
    }
}

fn transport_error(e: reqwest::Error) -> JamError {
    if e.is_timeout() {
        JamError::sink("Sheets API request timed out")
    } else {
        JamError::sink(format!("Sheets API request failed: {}", e.without_url()))
    }
}

fn cell_text(cell: &Value) -> Option<String> {
    match cell {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse one worksheet row; header and partial rows give `None`.
fn parse_row(row: &[Value]) -> Option<LoggedRow> {
    if row.len() < 5 {
        return None;
    }
    Some(LoggedRow {
        date: cell_text(&row[0])?,
        day_of_week: cell_text(&row[1]),
        departure_time: cell_text(&row[2]),
        jam_score: cell_text(&row[3])?.trim_end_matches('%').parse().ok()?,
        travel_time_minutes: cell_text(&row[4])?.parse().ok()?,
    })
}

impl RecordSink for SheetsSink {
    async fn append(&self, record: &JamRecord) -> Result<(), JamError> {
        let url = self.values_url(":append")?;
        debug!("Appending row to {}", url);

        let response = self
            .http_client
            .post(url)
            .bearer_auth(&self.access_token)
            .query(&[
                ("valueInputOption", "USER_ENTERED"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .json(&json!({
                "range": self.range(),
                "majorDimension": "ROWS",
                "values": [record.sheet_row()],
            }))
            .send()
            .await
            .map_err(transport_error)?;

        Self::check(response).await?;
        info!("Appended record to {}", self.describe());
        Ok(())
    }

    async fn recent(&self, n: usize) -> Result<Vec<LoggedRow>, JamError> {
        let url = self.values_url("")?;

        let response = self
            .http_client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(transport_error)?;

        let range: ValueRange = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| JamError::sink(format!("invalid Sheets response: {}", e.without_url())))?;

        let total = range.values.len();
        let rows: Vec<LoggedRow> = range.values.iter().filter_map(|r| parse_row(r)).collect();
        if total - rows.len() > 1 {
            warn!("Skipped {} unreadable worksheet rows", total - rows.len());
        }

        Ok(tail(rows, n))
    }

    fn describe(&self) -> String {
        format!("worksheet '{}' of spreadsheet {}", self.worksheet, self.spreadsheet_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use wiremock::matchers::{body_json, header, method, path_regex, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sink(base_url: &str) -> SheetsSink {
        SheetsSink::new(base_url, "sheet-id", "Commute", "token-123", Duration::from_secs(5))
            .unwrap()
    }

    fn record() -> JamRecord {
        JamRecord {
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            day_of_week: "Monday".to_string(),
            departure_time: "08:30".to_string(),
            travel_time_minutes: 18.0,
            jam_score: 50.0,
        }
    }

    #[test]
    fn test_values_url_quotes_sheet_name() {
        let s = SheetsSink::new(
            "https://sheets.example.com",
            "abc",
            "Bob's Log",
            "t",
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(s.range(), "'Bob''s Log'!A:E");
        let url = s.values_url(":append").unwrap();
        assert!(url.path().starts_with("/v4/spreadsheets/abc/values/"));
        assert!(url.path().ends_with("!A:E:append"));
    }

    #[tokio::test]
    async fn test_append_row_in_contract_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"^/v4/spreadsheets/sheet-id/values/.*Commute.*!A:E:append$"))
            .and(header("authorization", "Bearer token-123"))
            .and(query_param("valueInputOption", "USER_ENTERED"))
            .and(body_json(serde_json::json!({
                "range": "'Commute'!A:E",
                "majorDimension": "ROWS",
                "values": [["2024-01-15", "Monday", "08:30", 50.0, 18.0]]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        sink(&server.uri()).append(&record()).await.unwrap();
    }

    #[tokio::test]
    async fn test_append_failure_is_sink_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("PERMISSION_DENIED"))
            .mount(&server)
            .await;

        let err = sink(&server.uri()).append(&record()).await.unwrap_err();
        assert!(matches!(err, JamError::Sink(_)));
        assert!(err.to_string().contains("403"));
    }

    #[tokio::test]
    async fn test_recent_skips_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"!A:E$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "range": "Commute!A1:E4",
                "majorDimension": "ROWS",
                "values": [
                    ["Date", "Day", "Departure", "Jam Score", "Travel Time"],
                    ["2024-01-12", "Friday", "08:30", "100", "9"],
                    ["2024-01-15", "Monday", "08:30", "50", "18"],
                    ["2024-01-15", "Monday", "08:45", "75.5", "11.9"]
                ]
            })))
            .mount(&server)
            .await;

        let rows = sink(&server.uri()).recent(2).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, "2024-01-15");
        assert_eq!(rows[0].jam_score, 50.0);
        assert_eq!(rows[1].departure_time.as_deref(), Some("08:45"));
        assert_eq!(rows[1].travel_time_minutes, 11.9);
    }

    #[tokio::test]
    async fn test_recent_empty_sheet() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "range": "Commute!A1:E1" })),
            )
            .mount(&server)
            .await;

        assert!(sink(&server.uri()).recent(2).await.unwrap().is_empty());
    }
}
