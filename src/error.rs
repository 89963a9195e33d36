//! Error handling for the data plane
//!
//! Each subsystem has its own error enum (`NdtpError`, `PipelineError`,
//! `ClockError`); this module defines the crate-level error that wraps them,
//! plus a Result alias and a context extension.

use crate::clock::ClockError;
use crate::ndtp::NdtpError;
use crate::pipeline::PipelineError;
use thiserror::Error;

/// Main error type for data plane operations
#[derive(Error, Debug)]
pub enum DataPlaneError {
    /// Wire codec errors
    #[error("Codec error: {0}")]
    Codec(#[from] NdtpError),

    /// Node graph and device lifecycle errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Time synchronization errors
    #[error("Clock sync error: {0}")]
    Clock(#[from] ClockError),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<DataPlaneError>,
    },
}

impl DataPlaneError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        DataPlaneError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

/// Result type alias for data plane operations
pub type Result<T> = std::result::Result<T, DataPlaneError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<DataPlaneError>,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DataPlaneError::Config("missing device section".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: missing device section"
        );
    }

    #[test]
    fn test_error_with_context() {
        let err = DataPlaneError::from(NdtpError::InvalidBitWidth(0));
        let with_ctx = err.with_context("Failed to encode frame");
        assert!(with_ctx.to_string().contains("Failed to encode frame"));
        assert!(with_ctx.to_string().contains("Invalid bit width"));
    }

    #[test]
    fn test_result_ext_converts_subsystem_errors() {
        let res: std::result::Result<(), NdtpError> = Err(NdtpError::UnknownDataKind(9));
        let err = res.context("decoding").unwrap_err();
        assert!(matches!(
            err,
            DataPlaneError::WithContext { ref source, .. }
                if matches!(**source, DataPlaneError::Codec(_))
        ));
    }
}
