//! Departure-time resolution.
//!
//! A departure request is either "now" or a wall-clock `HH:MM`. Explicit
//! times are pinned to the current calendar date in the configured zone
//! through `chrono-tz`, so DST transitions never move the hour.

use crate::errors::JamError;
use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use std::fmt;
use std::str::FromStr;

/// What the caller asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepartureRequest {
    /// Leave immediately; the provider gets the literal `now`.
    Now,
    /// Leave at this local time of day.
    At(NaiveTime),
}

impl FromStr for DepartureRequest {
    type Err = JamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("now") {
            return Ok(DepartureRequest::Now);
        }
        parse_clock(s).map(DepartureRequest::At)
    }
}

impl fmt::Display for DepartureRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DepartureRequest::Now => write!(f, "now"),
            DepartureRequest::At(t) => write!(f, "{}", t.format("%H:%M")),
        }
    }
}

/// Parse a strict, zero-padded `HH:MM` clock time.
///
/// chrono's `%H:%M` accepts unpadded fields, so the shape is checked by hand.
pub fn parse_clock(s: &str) -> Result<NaiveTime, JamError> {
    let invalid = || {
        JamError::config(format!(
            "invalid departure time '{}': expected HH:MM (24h) or 'now'",
            s
        ))
    };

    let bytes = s.as_bytes();
    if bytes.len() != 5 || bytes[2] != b':' {
        return Err(invalid());
    }
    if ![0, 1, 3, 4].iter().all(|&i| bytes[i].is_ascii_digit()) {
        return Err(invalid());
    }

    let hour: u32 = s[0..2].parse().map_err(|_| invalid())?;
    let minute: u32 = s[3..5].parse().map_err(|_| invalid())?;

    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(invalid)
}

/// A departure pinned to a concrete instant in the local zone.
#[derive(Debug, Clone, PartialEq)]
pub struct Departure {
    pub request: DepartureRequest,
    pub at: DateTime<Tz>,
    /// The instant had already passed at resolution time. The provider
    /// rejects past departures, so live traffic is requested instead.
    pub elapsed: bool,
}

impl Departure {
    /// Value of the provider's `departure_time` query parameter.
    pub fn api_param(&self) -> String {
        match self.request {
            DepartureRequest::At(_) if !self.elapsed => self.at.timestamp().to_string(),
            _ => "now".to_string(),
        }
    }

    /// Local calendar date.
    pub fn date(&self) -> NaiveDate {
        self.at.date_naive()
    }

    /// Full English weekday name, e.g. `Monday`.
    pub fn day_of_week(&self) -> String {
        self.at.format("%A").to_string()
    }

    /// Local wall-clock time, minute precision.
    pub fn clock(&self) -> NaiveTime {
        // hour/minute of a valid DateTime are always in range
        NaiveTime::from_hms_opt(self.at.hour(), self.at.minute(), 0).unwrap_or_default()
    }

    /// Local wall-clock time as `HH:MM`.
    pub fn clock_string(&self) -> String {
        self.at.format("%H:%M").to_string()
    }
}

/// Turns requests into zone-aware instants.
#[derive(Debug, Clone, Copy)]
pub struct DepartureResolver {
    tz: Tz,
}

impl DepartureResolver {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// Resolve `request` relative to the instant `now`.
    ///
    /// `Now` is truncated to the minute. Explicit times use today's local
    /// date, even once they have passed. Ambiguous local times take the
    /// earlier instant; times that fall into a spring-forward gap move one
    /// hour later.
    pub fn resolve(
        &self,
        request: DepartureRequest,
        now: DateTime<Utc>,
    ) -> Result<Departure, JamError> {
        let local_now = now.with_timezone(&self.tz);

        let at = match request {
            DepartureRequest::Now => local_now
                .with_second(0)
                .and_then(|t| t.with_nanosecond(0))
                .unwrap_or(local_now),
            DepartureRequest::At(time) => self.localize(local_now.date_naive(), time)?,
        };

        let elapsed = matches!(request, DepartureRequest::At(_)) && at <= now;

        Ok(Departure {
            request,
            at,
            elapsed,
        })
    }

    fn localize(&self, date: NaiveDate, time: NaiveTime) -> Result<DateTime<Tz>, JamError> {
        let naive = date.and_time(time);
        match self.tz.from_local_datetime(&naive) {
            LocalResult::Single(dt) => Ok(dt),
            LocalResult::Ambiguous(earliest, _) => Ok(earliest),
            LocalResult::None => {
                let shifted = naive + Duration::hours(1);
                self.tz.from_local_datetime(&shifted).earliest().ok_or_else(|| {
                    JamError::config(format!(
                        "departure time {} does not exist on {} in {}",
                        time.format("%H:%M"),
                        date,
                        self.tz
                    ))
                })
            }
        }
    }
}
