//! Jam score calculation.
//!
//! The score compares a measured traffic-aware travel time with the
//! free-flow baseline for the route. 100 means "no worse than free flow".

use crate::errors::JamError;

/// Upper bound of the score. Faster-than-baseline readings clamp here.
pub const MAX_SCORE: f64 = 100.0;

/// Unrounded result of scoring one measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JamScore {
    /// Measured travel time in minutes.
    pub travel_time_minutes: f64,
    /// Score in (0, 100].
    pub score: f64,
}

/// Compute the jam score for a measurement.
///
/// `travel_time_seconds` comes straight from the provider and must be a
/// positive finite number. `baseline_minutes` is validated at config load.
pub fn jam_score(travel_time_seconds: f64, baseline_minutes: f64) -> Result<JamScore, JamError> {
    if !travel_time_seconds.is_finite() || travel_time_seconds <= 0.0 {
        return Err(JamError::UpstreamFormat(format!(
            "travel time must be a positive number of seconds, got {}",
            travel_time_seconds
        )));
    }
    if !baseline_minutes.is_finite() || baseline_minutes <= 0.0 {
        return Err(JamError::config(format!(
            "baseline must be a positive number of minutes, got {}",
            baseline_minutes
        )));
    }

    let score = (baseline_minutes * 60.0 / travel_time_seconds * 100.0).min(MAX_SCORE);

    Ok(JamScore {
        travel_time_minutes: travel_time_seconds / 60.0,
        score,
    })
}

/// Round to one decimal place. Presentation only.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Round a strictly positive value to one decimal place without letting it
/// collapse to zero.
pub fn round1_positive(value: f64) -> f64 {
    round1(value).max(0.1)
}
