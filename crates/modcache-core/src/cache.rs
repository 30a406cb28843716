//! # Shared Module Cache
//!
//! A [`ModuleCache`] owns the list of modules shared between every debug
//! target in the process, and implements the lookup-or-create protocol in
//! [`ModuleCache::get_shared_module`].
//!
//! The protocol, under one hold of the list lock:
//!
//! 1. look for a cached module matching the spec, evicting stale copies
//! 2. otherwise open the requested path directly
//! 3. otherwise ask the [`ObjectLocator`] for a better path, look that up in
//!    the cache, and open it if needed
//!
//! Failures come back as data in [`SharedModuleResult::error`], never as
//! panics, so callers can report them next to whatever partial state they
//! have.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use modcache_core::cache::ModuleCache;
//! use modcache_core::spec::ModuleSpec;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>>
//! {
//!     let cache = ModuleCache::global();
//!     let (module, _old, did_create) = cache
//!         .get_shared_module(&ModuleSpec::from_path("/usr/lib/libc.so.6"), false)
//!         .into_result()?;
//!     println!("{} (created: {did_create})", module.file_spec().display());
//!     Ok(())
//! }
//! ```

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use once_cell::sync::Lazy;
use tracing::{debug, debug_span, warn};

use crate::config::CacheConfig;
use crate::error::{ModuleError, Result};
use crate::locate::{ObjectLocator, SearchPathLocator};
use crate::module::{ModuleFactory, ModuleKey, ModuleRef};
use crate::module_list::{ModuleList, Modules};
use crate::object_module::ObjectModuleFactory;
use crate::spec::{file_modification_time, ModuleSpec};

static GLOBAL_CACHE: Lazy<ModuleCache> = Lazy::new(|| ModuleCache::with_config(CacheConfig::from_env()));

/// Outcome of [`ModuleCache::get_shared_module`].
///
/// `module` and `error` are never both set. `old_module` may accompany either:
/// a stale module can be evicted even when no replacement could be loaded.
#[derive(Debug, Default)]
pub struct SharedModuleResult
{
    /// The module that satisfies the spec.
    pub module: Option<ModuleRef>,
    /// The first stale module evicted while answering.
    pub old_module: Option<ModuleRef>,
    /// Whether `module` was created by this call rather than found.
    pub did_create: bool,
    /// Why no module could be produced.
    pub error: Option<ModuleError>,
}

impl SharedModuleResult
{
    /// Convert to `(module, old_module, did_create)`.
    ///
    /// ## Errors
    ///
    /// Returns the recorded error, or [`ModuleError::NotLocated`] if neither a
    /// module nor an error was recorded.
    pub fn into_result(self) -> Result<(ModuleRef, Option<ModuleRef>, bool)>
    {
        match (self.module, self.error) {
            (Some(module), _) => Ok((module, self.old_module, self.did_create)),
            (None, Some(error)) => Err(error),
            (None, None) => Err(ModuleError::NotLocated { uuid: None }),
        }
    }
}

/// Process-wide cache of shared modules.
pub struct ModuleCache
{
    modules: ModuleList,
    factory: Box<dyn ModuleFactory>,
    locator: Box<dyn ObjectLocator>,
    config: CacheConfig,
}

impl ModuleCache
{
    /// A cache with explicit collaborators and default configuration.
    pub fn new(factory: impl ModuleFactory + 'static, locator: impl ObjectLocator + 'static) -> Self
    {
        Self {
            modules: ModuleList::new(),
            factory: Box::new(factory),
            locator: Box::new(locator),
            config: CacheConfig::default(),
        }
    }

    /// A cache that opens object files from disk and searches
    /// `config.search_paths` for them.
    pub fn with_config(config: CacheConfig) -> Self
    {
        let locator = SearchPathLocator::new(config.search_paths.clone());
        Self {
            modules: ModuleList::new(),
            factory: Box::new(ObjectModuleFactory),
            locator: Box::new(locator),
            config,
        }
    }

    /// The process-wide cache, built from the environment on first use.
    ///
    /// It lives until the process exits; [`ModuleCache::clear`] empties it
    /// but it is never rebuilt.
    pub fn global() -> &'static ModuleCache
    {
        &GLOBAL_CACHE
    }

    /// Enable or disable the external locator step.
    #[must_use]
    pub fn with_locate_externally(mut self, enabled: bool) -> Self
    {
        self.config.locate_externally = enabled;
        self
    }

    pub fn config(&self) -> &CacheConfig
    {
        &self.config
    }

    /// The underlying list, for the search operations.
    pub fn module_list(&self) -> &ModuleList
    {
        &self.modules
    }

    /// Find or load the module described by `spec`.
    ///
    /// With `always_create` the cache is not consulted first, so a fresh
    /// module is opened even if an identical one is cached. Concurrent calls
    /// on one cache are serialized; two threads asking for the same file get
    /// the same handle and only one of them reports `did_create`.
    pub fn get_shared_module(&self, spec: &ModuleSpec, always_create: bool) -> SharedModuleResult
    {
        let span = debug_span!(
            "get_shared_module",
            file = ?spec.file(),
            arch = ?spec.architecture(),
            uuid = ?spec.uuid(),
            always_create
        );
        let _enter = span.enter();

        let mut result = SharedModuleResult::default();
        let mut modules = self.modules.lock();

        if !always_create {
            if let Some(module) = find_cached(&mut modules, spec, &mut result.old_module) {
                debug!(path = %module.file_spec().display(), "cache hit");
                result.module = Some(module);
                return result;
            }
        }

        if let Some(module) = self.create_checked(spec) {
            debug!(path = %module.file_spec().display(), "created module");
            modules.append(module.clone());
            result.module = Some(module);
            result.did_create = true;
            return result;
        }

        let located = if self.config.locate_externally {
            self.locator.locate_executable_object_file(spec)
        } else {
            spec.file().map(Path::to_path_buf)
        };

        // Nothing better than the path already tried: report, never retry it
        let path = match located {
            Some(path) if spec.file() != Some(path.as_path()) => path,
            _ => return fail(result, same_path_error(spec)),
        };
        debug!(located = %path.display(), "trying located object file");

        if !path.exists() {
            return fail(result, ModuleError::FileNotFound { path });
        }

        let refined = spec.clone().with_file(&path).with_platform_file(&path);
        if let Some(found) = modules.find_first_matching(&refined) {
            let on_disk = file_modification_time(&path);
            if refined.uuid().is_none() && on_disk.is_some() && on_disk != found.modification_time() {
                log_eviction(&found, on_disk);
                modules.remove(&found);
                result.old_module.get_or_insert(found);
            } else {
                debug!(path = %path.display(), "cache hit at located path");
                result.module = Some(found);
                return result;
            }
        }

        match self.create_checked(&refined) {
            Some(module) => {
                debug!(path = %path.display(), "created module from located path");
                modules.append(module.clone());
                result.module = Some(module);
                result.did_create = true;
                result
            }
            None => fail(
                result,
                ModuleError::OpenFailed {
                    path,
                    arch: spec.architecture(),
                },
            ),
        }
    }

    /// Construct a module and accept it only if it has an object file and,
    /// when the spec names a build identifier, carries that identifier.
    fn create_checked(&self, spec: &ModuleSpec) -> Option<ModuleRef>
    {
        let module = match self.factory.create_module(spec) {
            Ok(module) => module,
            Err(err) => {
                debug!(error = %err, "module construction failed");
                return None;
            }
        };

        if !module.has_object_file() {
            debug!(path = %module.file_spec().display(), "no object file for requested architecture");
            return None;
        }

        if let Some(uuid) = spec.uuid() {
            if module.uuid() != Some(uuid) {
                debug!(wanted = %uuid, found = ?module.uuid(), "uuid mismatch");
                return None;
            }
        }

        Some(module)
    }

    /// Remove `module` from the cache.
    pub fn remove_shared_module(&self, module: &ModuleRef) -> bool
    {
        self.modules.remove(module)
    }

    /// Add every cached module matching `spec` to `matching`.
    pub fn find_shared_modules(&self, spec: &ModuleSpec, matching: &ModuleList) -> usize
    {
        self.modules.find_modules(spec, matching)
    }

    /// Drop every cached module no caller holds any more.
    pub fn remove_orphan_shared_modules(&self) -> usize
    {
        self.modules.remove_orphans()
    }

    /// Whether the module identified by `key` is still cached.
    pub fn module_is_in_cache(&self, key: ModuleKey) -> bool
    {
        self.modules.find_module(key).is_some()
    }

    pub fn clear(&self)
    {
        self.modules.clear();
    }

    /// Snapshot of every cached module.
    pub fn modules(&self) -> Vec<ModuleRef>
    {
        self.modules.modules()
    }
}

impl Default for ModuleCache
{
    fn default() -> Self
    {
        Self::with_config(CacheConfig::default())
    }
}

/// Scan cached matches in order. A uuid match or an unchanged timestamp is a
/// hit; anything else is evicted, and only the first eviction is reported.
fn find_cached(modules: &mut Modules, spec: &ModuleSpec, old_module: &mut Option<ModuleRef>) -> Option<ModuleRef>
{
    let on_disk = spec.file().and_then(file_modification_time);
    for candidate in modules.find_matching(spec) {
        if spec.uuid().is_some() {
            return Some(candidate);
        }
        if on_disk.is_some() && on_disk == candidate.modification_time() {
            return Some(candidate);
        }

        log_eviction(&candidate, on_disk);
        modules.remove(&candidate);
        if old_module.is_none() {
            *old_module = Some(candidate);
        }
    }
    None
}

fn log_eviction(module: &ModuleRef, on_disk: Option<SystemTime>)
{
    debug!(
        path = %module.file_spec().display(),
        cached = ?module.modification_time(),
        on_disk = ?on_disk,
        "evicting stale module"
    );
}

/// Error for a locator that had nothing better than the path already tried.
fn same_path_error(spec: &ModuleSpec) -> ModuleError
{
    let Some(path) = spec.file().map(PathBuf::from) else {
        return ModuleError::NotLocated {
            uuid: spec.uuid().cloned(),
        };
    };

    if !path.exists() {
        return ModuleError::FileNotFound { path };
    }

    match (spec.architecture(), spec.uuid()) {
        (Some(arch), uuid) => ModuleError::ArchitectureMismatch {
            path,
            arch,
            uuid: uuid.cloned(),
        },
        (None, Some(uuid)) => ModuleError::UuidMismatch {
            path,
            uuid: uuid.clone(),
        },
        (None, None) => ModuleError::OpenFailed { path, arch: None },
    }
}

fn fail(mut result: SharedModuleResult, error: ModuleError) -> SharedModuleResult
{
    warn!(error = %error, "failed to get shared module");
    result.error = Some(error);
    result
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::types::{Architecture, ModuleUuid};

    #[test]
    fn test_same_path_error_without_path()
    {
        let uuid = ModuleUuid::from_bytes(&[0xab; 16]).unwrap();
        let error = same_path_error(&ModuleSpec::new().with_uuid(uuid));
        assert!(matches!(error, ModuleError::NotLocated { uuid: Some(_) }));
    }

    #[test]
    fn test_same_path_error_missing_file()
    {
        let error = same_path_error(&ModuleSpec::from_path("/no/such/libmissing.so"));
        assert_eq!(error.to_string(), "'/no/such/libmissing.so' does not exist");
    }

    #[test]
    fn test_same_path_error_prefers_architecture()
    {
        let file = tempfile::NamedTempFile::new().unwrap();
        let spec = ModuleSpec::from_path(file.path())
            .with_architecture(Architecture::Arm64)
            .with_uuid(ModuleUuid::from_bytes(&[1; 16]).unwrap());
        assert!(matches!(
            same_path_error(&spec),
            ModuleError::ArchitectureMismatch { uuid: Some(_), .. }
        ));

        let spec = ModuleSpec::from_path(file.path()).with_uuid(ModuleUuid::from_bytes(&[1; 16]).unwrap());
        assert!(matches!(same_path_error(&spec), ModuleError::UuidMismatch { .. }));

        let spec = ModuleSpec::from_path(file.path());
        assert!(matches!(same_path_error(&spec), ModuleError::OpenFailed { arch: None, .. }));
    }

    #[test]
    fn test_into_result_without_module_or_error()
    {
        let result = SharedModuleResult::default();
        assert!(matches!(result.into_result(), Err(ModuleError::NotLocated { uuid: None })));
    }
}
