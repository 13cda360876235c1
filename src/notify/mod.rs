//! Summary notifications.
//!
//! A notification goes out only when a sample's departure clock time equals
//! the configured trigger. It is a side channel: the caller logs failures
//! and carries on.

pub mod webhook;

use crate::errors::JamError;
use crate::jam::Departure;
use chrono::NaiveTime;

pub use webhook::WebhookNotifier;

/// Outbound message channel.
#[allow(async_fn_in_trait)]
pub trait Notifier {
    async fn send(&self, subject: &str, body: &str) -> Result<(), JamError>;
}

/// Whether `departure` is the sample that triggers the summary.
pub fn is_trigger(departure: &Departure, trigger: NaiveTime) -> bool {
    departure.clock() == trigger
}
