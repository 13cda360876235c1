//! Error kinds for the jam logging pipeline.
//!
//! Every stage returns a [`JamError`] so the entry point can decide how to
//! report it and which exit code to use.

use thiserror::Error;

/// Errors produced while resolving, measuring, recording or notifying.
#[derive(Error, Debug)]
pub enum JamError {
    /// Missing credential, bad departure time, invalid route or baseline.
    /// Always raised before any network call.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The measurement provider could not be reached or refused the request.
    #[error("Measurement provider error: {0}")]
    Upstream(String),

    /// The provider answered but the travel duration is missing or unusable.
    #[error("Unexpected provider response: {0}")]
    UpstreamFormat(String),

    /// Writing to or reading from the record sink failed.
    #[error("Sink error: {0}")]
    Sink(String),

    /// The summary notification could not be delivered.
    #[error("Notification error: {0}")]
    Notification(String),
}

impl JamError {
    /// Process exit code for this error.
    ///
    /// Notification failures never reach the process boundary, but they
    /// still get a code so the mapping is total.
    pub fn exit_code(&self) -> i32 {
        match self {
            JamError::Configuration(_) => 1,
            JamError::Upstream(_) | JamError::UpstreamFormat(_) => 2,
            JamError::Sink(_) => 3,
            JamError::Notification(_) => 0,
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        JamError::Configuration(msg.into())
    }

    pub fn sink(msg: impl Into<String>) -> Self {
        JamError::Sink(msg.into())
    }
}

impl From<csv::Error> for JamError {
    fn from(e: csv::Error) -> Self {
        JamError::Sink(e.to_string())
    }
}

impl From<std::io::Error> for JamError {
    fn from(e: std::io::Error) -> Self {
        JamError::Sink(format!("I/O error: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(JamError::config("x").exit_code(), 1);
        assert_eq!(JamError::Upstream("x".into()).exit_code(), 2);
        assert_eq!(JamError::UpstreamFormat("x".into()).exit_code(), 2);
        assert_eq!(JamError::sink("x").exit_code(), 3);
        assert_eq!(JamError::Notification("x".into()).exit_code(), 0);
    }

    #[test]
    fn test_io_errors_are_sink_errors() {
        let err: JamError = std::io::Error::other("disk full").into();
        assert!(matches!(err, JamError::Sink(_)));
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn test_csv_errors_are_not_double_prefixed() {
        let mut reader = csv::ReaderBuilder::new().from_reader("a,b\n1\n".as_bytes());
        let csv_err = reader.records().next().unwrap().unwrap_err();
        let err: JamError = csv_err.into();

        assert!(matches!(err, JamError::Sink(_)));
        assert_eq!(err.to_string().matches("CSV error").count(), 1);
    }
}
