//! ocistow core - foundational types.
//!
//! Errors, configuration, the annotation set and the request-scoped context
//! shared by the runtime and the command-line front-end.

pub mod annotations;
pub mod config;
pub mod context;
pub mod error;

// Re-export commonly used types
pub use annotations::Annotations;
pub use config::StowConfig;
pub use context::{Context, DEFAULT_REQUEST_TIMEOUT};
pub use error::{Result, ResultExt, StowError};

/// ocistow version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
