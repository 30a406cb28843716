//! # Logging Utilities
//!
//! Logging setup for modcache tools using `tracing`.
//!
//! Libraries in the workspace only emit events; binaries call one of the
//! `init_logging*` functions once at startup. Logs go to stderr so they never
//! mix with command output on stdout.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use modcache_utils::init_logging;
//!
//! // Keep the guard alive for as long as logs should be written
//! let _guard = init_logging().expect("Failed to initialize logging");
//! tracing::info!("Application started");
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: filter directives (e.g. `debug`, `modcache_core=trace`)
//! - `MODCACHE_LOG_FORMAT`: `pretty` (default) or `json`
//! - `MODCACHE_LOG_FILE`: also write logs to this file, rotated daily

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::{env, fs, io};

use chrono::Utc;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Environment variable selecting the output format.
pub const LOG_FORMAT_ENV: &str = "MODCACHE_LOG_FORMAT";

/// Environment variable naming an additional log file.
pub const LOG_FILE_ENV: &str = "MODCACHE_LOG_FILE";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat
{
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per event, with span context
    Json,
}

impl FromStr for LogFormat
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(LoggingError::InvalidFormat(s.to_string())),
        }
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel
{
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level
{
    fn from(level: LogLevel) -> Self
    {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

impl FromStr for LogLevel
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.trim().to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(LoggingError::InvalidLevel(s.to_string())),
        }
    }
}

/// Resolved logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LoggingConfig
{
    pub format: LogFormat,
    /// Overrides `RUST_LOG` when set.
    pub level: Option<LogLevel>,
    /// Extra daily-rotated log file.
    pub file: Option<PathBuf>,
}

impl LoggingConfig
{
    /// Read `MODCACHE_LOG_FORMAT` and `MODCACHE_LOG_FILE`.
    ///
    /// ## Errors
    ///
    /// Returns [`LoggingError::InvalidFormat`] for an unknown format name.
    pub fn from_env() -> Result<Self, LoggingError>
    {
        Self::from_vars(env::var(LOG_FORMAT_ENV).ok().as_deref(), env::var_os(LOG_FILE_ENV).map(PathBuf::from))
    }

    /// Build from raw variable values.
    ///
    /// ## Errors
    ///
    /// Returns [`LoggingError::InvalidFormat`] for an unknown format name.
    pub fn from_vars(format: Option<&str>, file: Option<PathBuf>) -> Result<Self, LoggingError>
    {
        let format = format.map(LogFormat::from_str).transpose()?.unwrap_or_default();
        Ok(Self {
            format,
            level: None,
            file: file.filter(|path| !path.as_os_str().is_empty()),
        })
    }

    fn filter(&self) -> EnvFilter
    {
        match self.level {
            Some(level) => EnvFilter::new(Level::from(level).to_string()),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string())),
        }
    }
}

/// Keeps background log writers alive. Dropping it flushes and stops file
/// logging.
#[must_use = "dropping the guard stops file logging"]
#[derive(Debug, Default)]
pub struct LoggingGuard
{
    _file_writer: Option<WorkerGuard>,
}

/// Initialize logging from the environment.
///
/// ## Errors
///
/// Returns an error if the environment holds an invalid format, the log file
/// cannot be opened, or a global subscriber is already installed.
pub fn init_logging() -> Result<LoggingGuard, LoggingError>
{
    init_logging_from(&LoggingConfig::from_env()?)
}

/// Initialize console logging with an explicit level and format.
///
/// ```rust,no_run
/// use modcache_utils::{LogFormat, LogLevel, init_logging_with_level};
///
/// let _guard = init_logging_with_level(LogLevel::Debug, LogFormat::Json).expect("Failed to initialize logging");
/// ```
///
/// ## Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_logging_with_level(level: LogLevel, format: LogFormat) -> Result<LoggingGuard, LoggingError>
{
    init_logging_from(&LoggingConfig {
        format,
        level: Some(level),
        file: None,
    })
}

/// Initialize file-only logging into a dated file.
///
/// The file is `~/.modcache/YYYY-MM-DD-modcache.log`, or the same name in the
/// system temp directory when `HOME` is unset. Returns the path written to.
///
/// ## Errors
///
/// Returns an error if the directory cannot be created or a global subscriber
/// is already installed.
pub fn init_logging_to_file(level: Option<LogLevel>) -> Result<(PathBuf, LoggingGuard), LoggingError>
{
    let directory = match env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".modcache"),
        None => env::temp_dir(),
    };
    fs::create_dir_all(&directory)?;
    let log_file = directory.join(format!("{}-modcache.log", Utc::now().format("%Y-%m-%d")));

    let config = LoggingConfig {
        level,
        ..LoggingConfig::from_env()?
    };
    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(&directory, file_name(&log_file)));
    let layer = fmt_layer(config.format, writer, false, config.filter());
    install(vec![layer])?;

    Ok((
        log_file,
        LoggingGuard {
            _file_writer: Some(guard),
        },
    ))
}

fn init_logging_from(config: &LoggingConfig) -> Result<LoggingGuard, LoggingError>
{
    let mut layers = vec![fmt_layer(config.format, io::stderr, true, config.filter())];

    let file_writer = match &config.file {
        Some(path) => {
            let directory = path.parent().filter(|dir| !dir.as_os_str().is_empty()).unwrap_or(Path::new("."));
            fs::create_dir_all(directory)?;
            let (writer, worker) =
                tracing_appender::non_blocking(tracing_appender::rolling::daily(directory, file_name(path)));
            layers.push(fmt_layer(config.format, writer, false, config.filter()));
            Some(worker)
        }
        None => None,
    };

    install(layers)?;
    Ok(LoggingGuard {
        _file_writer: file_writer,
    })
}

fn file_name(path: &Path) -> &std::ffi::OsStr
{
    path.file_name().unwrap_or_else(|| "modcache.log".as_ref())
}

fn fmt_layer<W>(format: LogFormat, writer: W, ansi: bool, filter: EnvFilter) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_timer(ChronoUtc::rfc_3339())
        .with_writer(writer);

    match format {
        LogFormat::Pretty => layer.with_ansi(ansi).with_filter(filter).boxed(),
        LogFormat::Json => layer
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_filter(filter)
            .boxed(),
    }
}

fn install(layers: Vec<BoxedLayer>) -> Result<(), LoggingError>
{
    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|err| LoggingError::InitializationFailed(err.to_string()))
}

/// Logging initialization error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError
{
    /// Unknown value for `MODCACHE_LOG_FORMAT`
    #[error("Invalid log format: {0} (expected 'pretty' or 'json')")]
    InvalidFormat(String),

    /// Unknown log level name
    #[error("Invalid log level: {0}")]
    InvalidLevel(String),

    /// A global subscriber was already installed
    #[error("Failed to initialize logging: {0}")]
    InitializationFailed(String),

    /// Log file or directory could not be created
    #[error("File logging error: {0}")]
    FileError(#[from] io::Error),
}
