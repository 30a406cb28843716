//! # Module Specifications
//!
//! A [`ModuleSpec`] describes the module a caller wants: where it might live,
//! which architecture it must contain and which build it must be. Every field
//! is optional, and a spec is never mutated once handed to the registry.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::types::{Architecture, ModuleUuid};

/// Criteria describing a wanted module.
///
/// A populated, valid UUID is authoritative: a cached module that matches it
/// is accepted without any modification-time staleness check.
///
/// ## Example
///
/// ```rust
/// use modcache_core::spec::ModuleSpec;
/// use modcache_core::types::Architecture;
///
/// let spec = ModuleSpec::from_path("/usr/lib/libfoo.so").with_architecture(Architecture::X86_64);
/// assert_eq!(spec.file().unwrap().file_name().unwrap(), "libfoo.so");
/// assert!(spec.uuid().is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleSpec
{
    file: Option<PathBuf>,
    platform_file: Option<PathBuf>,
    architecture: Option<Architecture>,
    uuid: Option<ModuleUuid>,
}

impl ModuleSpec
{
    /// An empty spec that matches every module.
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// A spec naming only a primary path.
    pub fn from_path(path: impl Into<PathBuf>) -> Self
    {
        Self::new().with_file(path)
    }

    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self
    {
        self.file = Some(path.into());
        self
    }

    /// Path of the module as the target platform sees it. May differ from
    /// [`ModuleSpec::file`], e.g. an on-device path versus a local copy.
    #[must_use]
    pub fn with_platform_file(mut self, path: impl Into<PathBuf>) -> Self
    {
        self.platform_file = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_architecture(mut self, architecture: Architecture) -> Self
    {
        self.architecture = Some(architecture);
        self
    }

    #[must_use]
    pub fn with_uuid(mut self, uuid: ModuleUuid) -> Self
    {
        self.uuid = Some(uuid);
        self
    }

    pub fn file(&self) -> Option<&Path>
    {
        self.file.as_deref()
    }

    pub fn platform_file(&self) -> Option<&Path>
    {
        self.platform_file.as_deref()
    }

    pub fn architecture(&self) -> Option<Architecture>
    {
        self.architecture
    }

    /// The requested build identifier. An all-zero identifier counts as absent.
    pub fn uuid(&self) -> Option<&ModuleUuid>
    {
        self.uuid.as_ref().filter(|uuid| uuid.is_valid())
    }
}

/// Current on-disk modification time of `path`, if it exists and the
/// platform reports one.
pub fn file_modification_time(path: &Path) -> Option<SystemTime>
{
    fs::metadata(path).and_then(|metadata| metadata.modified()).ok()
}

/// Compare a requested path against a module's path.
///
/// A requested path with a directory component must match exactly; a bare
/// file name matches any module with that file name.
pub(crate) fn path_matches(wanted: &Path, actual: &Path) -> bool
{
    let has_directory = wanted.parent().is_some_and(|parent| !parent.as_os_str().is_empty());
    if has_directory {
        wanted == actual
    } else {
        wanted.file_name().is_some() && wanted.file_name() == actual.file_name()
    }
}
