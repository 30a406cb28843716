//! # Modules
//!
//! The [`Module`] trait is the registry's view of a loaded binary image.
//!
//! The registry never parses anything itself. It needs identity (path,
//! architecture, build identifier, modification time) to deduplicate and
//! evict, a "matches this spec" predicate to answer lookups, and a set of
//! per-module search operations it can fan out across a list. Everything else
//! about a module belongs to the implementation.
//!
//! Modules are shared as [`ModuleRef`] (`Arc<dyn Module>`). Two handles name
//! the same registry slot only when they point at the same allocation; equal
//! identity fields are not enough. [`ModuleKey`] captures that allocation
//! identity without keeping the module alive.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use regex::Regex;

use crate::error::Result;
use crate::spec::{path_matches, ModuleSpec};
use crate::types::{
    Architecture, FunctionNameType, ModuleUuid, SectionAddress, SymbolContext, SymbolContextList, SymbolContextScope,
    SymbolType, TypeList, VariableList,
};

/// Shared handle to a loaded module.
pub type ModuleRef = Arc<dyn Module>;

/// A loaded binary image (executable or shared library).
///
/// Implementations must be shareable across threads: the process-wide cache
/// hands the same handle to every debug target that loads the file.
///
/// The search operations append into caller-supplied lists and return how
/// many results they added. They default to finding nothing, so an
/// implementation without debug information only has to provide identity.
pub trait Module: fmt::Debug + Send + Sync
{
    /// Path the module was loaded from.
    fn file_spec(&self) -> &Path;

    /// Path of the module as seen by the target platform, when it differs.
    fn platform_file_spec(&self) -> Option<&Path>
    {
        None
    }

    fn architecture(&self) -> Architecture;

    /// Unique build identifier, if the image carries one.
    fn uuid(&self) -> Option<&ModuleUuid>;

    /// Modification time of the file at the moment it was loaded.
    fn modification_time(&self) -> Option<SystemTime>;

    /// Whether an object file for the requested architecture was actually
    /// found inside the file. A path can exist and still hold nothing usable.
    fn has_object_file(&self) -> bool;

    /// Whether this module satisfies every constraint in `spec`.
    fn matches_module_spec(&self, spec: &ModuleSpec) -> bool
    {
        if let Some(uuid) = spec.uuid() {
            if self.uuid() != Some(uuid) {
                return false;
            }
        }

        if let Some(file) = spec.file() {
            if !path_matches(file, self.file_spec()) {
                return false;
            }
        }

        if let Some(platform_file) = spec.platform_file() {
            let actual = self.platform_file_spec().unwrap_or_else(|| self.file_spec());
            if !path_matches(platform_file, actual) {
                return false;
            }
        }

        if let Some(arch) = spec.architecture() {
            if !self.architecture().is_compatible_with(arch) {
                return false;
            }
        }

        true
    }

    fn find_functions(
        &self,
        _name: &str,
        _name_type: FunctionNameType,
        _include_symbols: bool,
        _include_inlines: bool,
        _sc_list: &mut SymbolContextList,
    ) -> usize
    {
        0
    }

    fn find_compile_units(&self, _path: &Path, _sc_list: &mut SymbolContextList) -> usize
    {
        0
    }

    fn find_global_variables(&self, _name: &str, _max_matches: usize, _variables: &mut VariableList) -> usize
    {
        0
    }

    fn find_global_variables_matching(&self, _regex: &Regex, _max_matches: usize, _variables: &mut VariableList) -> usize
    {
        0
    }

    fn find_symbols_with_name_and_type(
        &self,
        _name: &str,
        _symbol_type: SymbolType,
        _sc_list: &mut SymbolContextList,
    ) -> usize
    {
        0
    }

    fn find_symbols_matching_regex_and_type(
        &self,
        _regex: &Regex,
        _symbol_type: SymbolType,
        _sc_list: &mut SymbolContextList,
    ) -> usize
    {
        0
    }

    fn find_types(&self, _name: &str, _max_matches: usize, _types: &mut TypeList) -> usize
    {
        0
    }

    /// Attribute a file address to a section of this module.
    fn resolve_file_address(&self, _vm_addr: u64) -> Option<SectionAddress>
    {
        None
    }

    /// Fill `sc` with what is known about `address`; returns the parts resolved.
    fn resolve_symbol_context_for_address(
        &self,
        _address: &SectionAddress,
        _scope: SymbolContextScope,
        _sc: &mut SymbolContext,
    ) -> SymbolContextScope
    {
        SymbolContextScope::empty()
    }

    fn resolve_symbol_contexts_for_file_spec(
        &self,
        _file: &Path,
        _line: u32,
        _check_inlines: bool,
        _scope: SymbolContextScope,
        _sc_list: &mut SymbolContextList,
    ) -> usize
    {
        0
    }

    /// Find a source file referenced by this module's debug information.
    fn find_source_file(&self, _orig: &Path) -> Option<PathBuf>
    {
        None
    }
}

/// Builds modules from specs for the shared-module protocol.
///
/// Returning `Ok` only means a module object exists; the protocol still
/// checks [`Module::has_object_file`] before accepting it.
pub trait ModuleFactory: Send + Sync
{
    /// Open the module described by `spec`, reading from `spec.file()`.
    ///
    /// ## Errors
    ///
    /// Returns an error when nothing can be read at the path.
    fn create_module(&self, spec: &ModuleSpec) -> Result<ModuleRef>;
}

/// Allocation identity of a module.
///
/// Holding a key does not keep the module alive, which makes it suitable for
/// "is this module still cached?" questions that must not influence the
/// answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleKey(usize);

impl ModuleKey
{
    /// Key of the module behind a shared handle.
    pub fn of(module: &ModuleRef) -> Self
    {
        ModuleKey(Arc::as_ptr(module).cast::<()>() as usize)
    }
}

/// Handle identity: true when both handles share one allocation.
pub fn same_module(a: &ModuleRef, b: &ModuleRef) -> bool
{
    ModuleKey::of(a) == ModuleKey::of(b)
}
