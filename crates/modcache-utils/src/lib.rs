//! # modcache Utilities
//!
//! Shared logging setup and helpers for the modcache workspace.
//!
//! The core library only emits `tracing` events; this crate installs the
//! subscriber that binaries use to print or persist them.

pub mod logging;

// Re-export commonly used logging functions for convenience
pub use logging::{
    init_logging, init_logging_to_file, init_logging_with_level, LogFormat, LogLevel, LoggingConfig, LoggingError,
    LoggingGuard,
};
pub use tracing::{debug, error, info, trace, warn};
