use std::time::Duration;

use thiserror::Error;

/// ocistow error types
#[derive(Error, Debug)]
pub enum StowError {
    /// Image reference text does not match the OCI name grammar
    #[error("invalid reference '{reference}': {reason}")]
    InvalidReference { reference: String, reason: String },

    /// Malformed `key=value` annotation
    #[error("invalid annotation: {0}")]
    InvalidAnnotation(String),

    /// Signer or existing signature state could not be obtained
    #[error("discovery error: {0}")]
    Discovery(String),

    /// Registry fetch/push/publish failure
    #[error("registry error: {operation} {reference} - {message}")]
    Registry {
        reference: String,
        operation: String,
        message: String,
    },

    /// Manifest or blob does not exist in the registry
    #[error("not found: {reference}")]
    NotFound { reference: String },

    /// Payload construction or cryptographic signing failure
    #[error("signing error: {0}")]
    Signing(String),

    /// Dedup/construct/attach failure for a signed entity
    #[error("attachment error: {0}")]
    Attachment(String),

    /// Deadline exceeded
    #[error("timeout: {operation} exceeded {duration:?}")]
    Timeout { operation: String, duration: Duration },

    /// Cancelled by the caller
    #[error("cancelled: {operation}")]
    Cancelled { operation: String },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error wrapped with the operation it interrupted
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<StowError>,
    },
}

impl StowError {
    /// Wrap this error with additional context.
    pub fn context(self, context: impl Into<String>) -> Self {
        StowError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping any context wrappers.
    pub fn root(&self) -> &StowError {
        match self {
            StowError::Context { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether the innermost error is a registry "not found".
    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), StowError::NotFound { .. })
    }
}

impl From<serde_json::Error> for StowError {
    fn from(err: serde_json::Error) -> Self {
        StowError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for StowError {
    fn from(err: serde_yaml::Error) -> Self {
        StowError::Serialization(err.to_string())
    }
}

/// Result type alias for ocistow operations
pub type Result<T> = std::result::Result<T, StowError>;

/// Attach context to the error side of a [`Result`].
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T>;

    fn with_context<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(context))
    }

    fn with_context<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>,
    {
        self.map_err(|e| e.context(f()))
    }
}
