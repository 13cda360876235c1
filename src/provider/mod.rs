//! Travel-time measurement providers.

pub mod distance_matrix;

use crate::errors::JamError;
use crate::jam::Departure;

pub use distance_matrix::DistanceMatrixClient;

/// One traffic-aware travel-time reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    /// Duration including traffic, seconds.
    pub travel_time_seconds: f64,
}

/// Source of traffic-aware travel times for the configured route.
#[allow(async_fn_in_trait)]
pub trait TravelTimeProvider {
    /// Measure the trip for `departure`.
    async fn measure(&self, departure: &Departure) -> Result<Measurement, JamError>;
}
