//! Plain-text summaries.
//!
//! Used for the console output of a run, `--tail`, and the body of the
//! summary notification.

use crate::jam::JamScore;
use crate::models::{JamRecord, LoggedRow};

/// Console lines for one measured sample.
pub fn render_sample(record: &JamRecord, score: &JamScore) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "🚗 {} {} ({})\n",
        record.date_string(),
        record.departure_time,
        record.day_of_week
    ));
    output.push_str(&format!("   Jam Score: {:.1}%\n", score.score));
    output.push_str(&format!(
        "   Travel time: {:.2} minutes\n",
        score.travel_time_minutes
    ));

    output
}

/// Fixed-width listing of logged rows, oldest first.
pub fn render_rows(rows: &[LoggedRow]) -> String {
    if rows.is_empty() {
        return "   No records logged yet.\n".to_string();
    }

    let mut output = String::new();
    output.push_str(&format!(
        "   {:<10}  {:<9}  {:<5}  {:>8}  {:>9}\n",
        "Date", "Day", "Time", "Travel", "Jam score"
    ));
    for row in rows {
        output.push_str(&format!(
            "   {:<10}  {:<9}  {:<5}  {:>8.1}  {:>8.1}%\n",
            row.date,
            row.day_of_week.as_deref().unwrap_or("-"),
            row.departure_time.as_deref().unwrap_or("-"),
            row.travel_time_minutes,
            row.jam_score
        ));
    }

    output
}

/// Subject and body of the summary notification.
pub fn render_notification(rows: &[LoggedRow]) -> (String, String) {
    let subject = match rows.last() {
        Some(latest) => format!("Commute jam score {:.1}% ({})", latest.jam_score, latest.date),
        None => "Commute jam score".to_string(),
    };

    let mut body = String::new();
    body.push_str("Most recent commute readings:\n\n");
    for row in rows.iter().rev() {
        body.push_str(&format!("- {}\n", row));
    }

    (subject, body)
}
