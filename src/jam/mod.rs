//! Jam scoring and departure-time handling.

pub mod departure;
pub mod score;

pub use departure::{Departure, DepartureRequest, DepartureResolver};
pub use score::{jam_score, round1_positive, JamScore};
