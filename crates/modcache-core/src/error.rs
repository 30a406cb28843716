//! # Error Types
//!
//! Errors produced while locating and loading modules.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and operator-facing messages. None of these are ever raised as panics: the
//! shared module protocol hands them back as data next to an empty module.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::types::{Architecture, ModuleUuid};

/// Main error type for module loading
///
/// ## Error Categories
///
/// 1. **Not found**: FileNotFound
/// 2. **Format mismatch**: ArchitectureMismatch
/// 3. **Identity mismatch**: UuidMismatch
/// 4. **Open failure**: OpenFailed, ObjectParse
/// 5. **Not located**: NotLocated
/// 6. **Input errors**: InvalidUuid, InvalidArchitecture
/// 7. **I/O errors**: Io
#[derive(Error, Debug)]
pub enum ModuleError
{
    /// Nothing exists at the path that was asked for (or located).
    #[error("'{}' does not exist", path.display())]
    FileNotFound
    {
        /// Path that was checked
        path: PathBuf,
    },

    /// The file exists but holds no object for the requested architecture.
    ///
    /// When a UUID was also requested it is named in the message, since either
    /// constraint could be the one that failed.
    #[error("'{}' does not contain the {arch} architecture{}", path.display(), uuid_suffix(uuid.as_ref()))]
    ArchitectureMismatch
    {
        /// Path that was opened
        path: PathBuf,
        /// Architecture that was requested
        arch: Architecture,
        /// UUID that was requested, if any
        uuid: Option<ModuleUuid>,
    },

    /// The file exists but its build identifier is not the requested one.
    #[error("'{}' does not contain a module with UUID {uuid}", path.display())]
    UuidMismatch
    {
        /// Path that was opened
        path: PathBuf,
        /// UUID that was requested
        uuid: ModuleUuid,
    },

    /// The file exists but could not be opened as an object file.
    #[error("{}", open_failed_message(path, *arch))]
    OpenFailed
    {
        /// Path that was opened
        path: PathBuf,
        /// Architecture that was requested, if any
        arch: Option<Architecture>,
    },

    /// Neither a path nor a build identifier led anywhere.
    #[error("{}", not_located_message(uuid.as_ref()))]
    NotLocated
    {
        /// UUID that was requested, if any
        uuid: Option<ModuleUuid>,
    },

    /// The object file reader rejected the file contents.
    #[error("Failed to parse object file: {0}")]
    ObjectParse(String),

    /// A build identifier string could not be parsed.
    #[error("Invalid UUID: {0}")]
    InvalidUuid(String),

    /// An architecture name is not one we know.
    #[error("Invalid architecture: {0}")]
    InvalidArchitecture(String),

    /// I/O error while reading a file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of a [`ModuleError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleErrorKind
{
    /// No file at the path.
    NotFound,
    /// The file exists but has the wrong architecture or no recognizable object.
    FormatMismatch,
    /// A build identifier was given and did not match.
    IdentityMismatch,
    /// The file exists but could not be parsed or mapped.
    OpenFailure,
    /// No path and no identifier yielded anything.
    NotLocated,
    /// The caller passed something unparseable.
    InvalidInput,
}

impl ModuleError
{
    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ModuleErrorKind
    {
        match self {
            ModuleError::FileNotFound { .. } => ModuleErrorKind::NotFound,
            ModuleError::ArchitectureMismatch { .. } => ModuleErrorKind::FormatMismatch,
            ModuleError::UuidMismatch { .. } => ModuleErrorKind::IdentityMismatch,
            ModuleError::OpenFailed { .. } | ModuleError::ObjectParse(_) | ModuleError::Io(_) => {
                ModuleErrorKind::OpenFailure
            }
            ModuleError::NotLocated { .. } => ModuleErrorKind::NotLocated,
            ModuleError::InvalidUuid(_) | ModuleError::InvalidArchitecture(_) => ModuleErrorKind::InvalidInput,
        }
    }
}

fn uuid_suffix(uuid: Option<&ModuleUuid>) -> String
{
    uuid.map(|uuid| format!(" and UUID {uuid}")).unwrap_or_default()
}

fn open_failed_message(path: &Path, arch: Option<Architecture>) -> String
{
    match arch {
        Some(arch) => format!("unable to open {arch} architecture in '{}'", path.display()),
        None => format!("unable to open '{}'", path.display()),
    }
}

fn not_located_message(uuid: Option<&ModuleUuid>) -> String
{
    match uuid {
        Some(uuid) => format!("cannot locate a module for UUID '{uuid}'"),
        None => "cannot locate a module".to_string(),
    }
}

impl fmt::Display for ModuleErrorKind
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let label = match self {
            ModuleErrorKind::NotFound => "not-found",
            ModuleErrorKind::FormatMismatch => "format-mismatch",
            ModuleErrorKind::IdentityMismatch => "identity-mismatch",
            ModuleErrorKind::OpenFailure => "open-failure",
            ModuleErrorKind::NotLocated => "not-located",
            ModuleErrorKind::InvalidInput => "invalid-input",
        };
        write!(f, "{label}")
    }
}

/// Convenience type alias for `Result<T, ModuleError>`
///
/// ```rust
/// use modcache_core::error::Result;
/// fn foo() -> Result<()>
/// {
///     Ok(())
/// }
/// ```
pub type Result<T> = std::result::Result<T, ModuleError>;
