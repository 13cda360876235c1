//! Human-readable output.

pub mod summary;

pub use summary::{render_notification, render_rows, render_sample};
