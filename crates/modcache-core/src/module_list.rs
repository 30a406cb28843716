//! # Module List
//!
//! An ordered, thread-safe collection of shared module handles.
//!
//! Every public operation takes the list's mutex for its whole duration.
//! Operations that are built from other operations (bulk remove, the
//! shared-module protocol in [`crate::cache`]) call into the unlocked core
//! [`Modules`] while holding the guard, so the lock never needs to be
//! reentrant.
//!
//! No operation here fails: absence is reported as `None`, `false`, `0` or
//! [`INVALID_INDEX`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use modcache_core::module_list::ModuleList;
//! use modcache_core::spec::ModuleSpec;
//!
//! # fn example(list: &ModuleList) {
//! let matches = ModuleList::new();
//! let added = list.find_modules(&ModuleSpec::from_path("libc.so.6"), &matches);
//! assert_eq!(added, matches.len());
//! # }
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use regex::Regex;
use tracing::debug;

use crate::module::{same_module, Module, ModuleKey, ModuleRef};
use crate::spec::ModuleSpec;
use crate::types::{
    FunctionNameType, ModuleUuid, SectionAddress, SymbolContext, SymbolContextList, SymbolContextScope, SymbolType,
    TypeList, VariableList,
};

/// Returned by [`ModuleList::index_of`] when the module is not in the list.
pub const INVALID_INDEX: usize = usize::MAX;

/// Unlocked core of a [`ModuleList`].
///
/// Callers must hold the owning list's mutex.
#[derive(Default)]
pub(crate) struct Modules
{
    entries: Vec<ModuleRef>,
}

impl Modules
{
    pub(crate) fn append(&mut self, module: ModuleRef)
    {
        self.entries.push(module);
    }

    pub(crate) fn append_if_needed(&mut self, module: ModuleRef) -> bool
    {
        if self.position(ModuleKey::of(&module)).is_some() {
            return false;
        }
        self.entries.push(module);
        true
    }

    pub(crate) fn remove(&mut self, module: &ModuleRef) -> bool
    {
        match self.position(ModuleKey::of(module)) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    fn position(&self, key: ModuleKey) -> Option<usize>
    {
        self.entries.iter().position(|entry| ModuleKey::of(entry) == key)
    }

    pub(crate) fn find_matching(&self, spec: &ModuleSpec) -> Vec<ModuleRef>
    {
        self.entries
            .iter()
            .filter(|module| module.matches_module_spec(spec))
            .cloned()
            .collect()
    }

    pub(crate) fn find_first_matching(&self, spec: &ModuleSpec) -> Option<ModuleRef>
    {
        self.entries.iter().find(|module| module.matches_module_spec(spec)).cloned()
    }

    /// Drop every entry this collection is the sole owner of.
    ///
    /// `retain` erases in place and only advances past kept entries. The
    /// strong count is atomic, so a handle cloned elsewhere concurrently is
    /// either seen (and kept) or was not yet cloned.
    fn remove_orphans(&mut self) -> usize
    {
        let before = self.entries.len();
        self.entries.retain(|module| Arc::strong_count(module) > 1);
        before - self.entries.len()
    }
}

/// Thread-safe ordered list of modules.
///
/// Insertion order is preserved and observable through index access, but it
/// carries no meaning beyond "most recently appended last".
#[derive(Default)]
pub struct ModuleList
{
    modules: Mutex<Modules>,
}

impl ModuleList
{
    /// Create a new empty list.
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Lock the list. A poisoned lock only means another thread panicked
    /// mid-operation; every core operation leaves the vector consistent.
    pub(crate) fn lock(&self) -> MutexGuard<'_, Modules>
    {
        self.modules.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append unconditionally, even if the handle is already present.
    pub fn append(&self, module: ModuleRef)
    {
        self.lock().append(module);
    }

    /// Append only if this exact handle is not already present.
    ///
    /// Returns `true` if the module was inserted.
    pub fn append_if_needed(&self, module: ModuleRef) -> bool
    {
        self.lock().append_if_needed(module)
    }

    /// Append every module of `other`.
    pub fn append_list(&self, other: &ModuleList)
    {
        let snapshot = other.modules();
        let mut modules = self.lock();
        for module in snapshot {
            modules.append(module);
        }
    }

    /// Append every module of `other` not already present; returns the count added.
    pub fn append_list_if_needed(&self, other: &ModuleList) -> usize
    {
        let snapshot = other.modules();
        let mut modules = self.lock();
        snapshot
            .into_iter()
            .filter(|module| modules.append_if_needed(module.clone()))
            .count()
    }

    /// Remove the first entry that is this exact handle.
    pub fn remove(&self, module: &ModuleRef) -> bool
    {
        self.lock().remove(module)
    }

    /// Remove every module of `other` from this list; returns the count removed.
    ///
    /// `other` is snapshotted before this list is locked, so the two locks are
    /// never held together and `list.remove_list(&list)` is well defined.
    pub fn remove_list(&self, other: &ModuleList) -> usize
    {
        let snapshot = other.modules();
        let mut modules = self.lock();
        snapshot.iter().filter(|module| modules.remove(module)).count()
    }

    /// Remove every module nobody outside this list holds.
    ///
    /// Never called implicitly; the owner decides when to sweep.
    pub fn remove_orphans(&self) -> usize
    {
        let removed = self.lock().remove_orphans();
        if removed > 0 {
            debug!(removed, "removed orphaned modules");
        }
        removed
    }

    /// Drop all entries.
    pub fn clear(&self)
    {
        self.lock().entries.clear();
    }

    /// Drop all entries and release the backing storage.
    pub fn destroy(&self)
    {
        let released = std::mem::take(&mut self.lock().entries);
        drop(released);
    }

    /// Number of entries.
    pub fn len(&self) -> usize
    {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.lock().entries.is_empty()
    }

    /// Capacity of the backing storage.
    pub fn capacity(&self) -> usize
    {
        self.lock().entries.capacity()
    }

    /// Non-owning reference to the module at `index`.
    pub fn module_pointer_at_index(&self, index: usize) -> Option<Weak<dyn Module>>
    {
        self.lock().entries.get(index).map(Arc::downgrade)
    }

    /// Owning handle to the module at `index`.
    pub fn module_at_index(&self, index: usize) -> Option<ModuleRef>
    {
        self.lock().entries.get(index).cloned()
    }

    /// Snapshot of every handle, in order.
    pub fn modules(&self) -> Vec<ModuleRef>
    {
        self.lock().entries.clone()
    }

    /// Find the module with the given allocation identity.
    pub fn find_module(&self, key: ModuleKey) -> Option<ModuleRef>
    {
        let modules = self.lock();
        modules.position(key).map(|index| modules.entries[index].clone())
    }

    /// First module whose build identifier equals `uuid`.
    pub fn find_module_by_uuid(&self, uuid: &ModuleUuid) -> Option<ModuleRef>
    {
        if !uuid.is_valid() {
            return None;
        }
        self.lock()
            .entries
            .iter()
            .find(|module| module.uuid() == Some(uuid))
            .cloned()
    }

    /// Add every module matching `spec` to `matching`.
    ///
    /// Matches are added with [`ModuleList::append_if_needed`], so repeated
    /// calls against several lists build a duplicate-free union in first-seen
    /// order. Returns the number of handles this call added.
    pub fn find_modules(&self, spec: &ModuleSpec, matching: &ModuleList) -> usize
    {
        let found = self.lock().find_matching(spec);
        let mut accumulator = matching.lock();
        found
            .into_iter()
            .filter(|module| accumulator.append_if_needed(module.clone()))
            .count()
    }

    /// First module matching `spec`.
    pub fn find_first_module(&self, spec: &ModuleSpec) -> Option<ModuleRef>
    {
        self.lock().find_first_matching(spec)
    }

    /// Position of this exact handle, or [`INVALID_INDEX`].
    pub fn index_of(&self, module: &ModuleRef) -> usize
    {
        self.lock().position(ModuleKey::of(module)).unwrap_or(INVALID_INDEX)
    }

    pub fn contains(&self, module: &ModuleRef) -> bool
    {
        self.lock().position(ModuleKey::of(module)).is_some()
    }

    /// Find functions named `name` in every module.
    ///
    /// Like every bulk search, clears `sc_list` first unless `append` is set
    /// and returns only the number of results this call added.
    pub fn find_functions(
        &self,
        name: &str,
        name_type: FunctionNameType,
        include_symbols: bool,
        include_inlines: bool,
        append: bool,
        sc_list: &mut SymbolContextList,
    ) -> usize
    {
        if !append {
            sc_list.clear();
        }
        let initial_size = sc_list.len();
        let modules = self.lock();
        for module in &modules.entries {
            let before = sc_list.len();
            module.find_functions(name, name_type, include_symbols, include_inlines, sc_list);
            stamp_contexts(module, &mut sc_list[before..]);
        }
        sc_list.len() - initial_size
    }

    /// Find compile units whose name matches `path`.
    pub fn find_compile_units(&self, path: &Path, append: bool, sc_list: &mut SymbolContextList) -> usize
    {
        if !append {
            sc_list.clear();
        }
        let initial_size = sc_list.len();
        let modules = self.lock();
        for module in &modules.entries {
            let before = sc_list.len();
            module.find_compile_units(path, sc_list);
            stamp_contexts(module, &mut sc_list[before..]);
        }
        sc_list.len() - initial_size
    }

    /// Find global variables named `name`; `max_matches` applies per module.
    pub fn find_global_variables(
        &self,
        name: &str,
        append: bool,
        max_matches: usize,
        variables: &mut VariableList,
    ) -> usize
    {
        if !append {
            variables.clear();
        }
        let initial_size = variables.len();
        let modules = self.lock();
        for module in &modules.entries {
            let before = variables.len();
            module.find_global_variables(name, max_matches, variables);
            for variable in &mut variables[before..] {
                variable.module.get_or_insert_with(|| module.clone());
            }
        }
        variables.len() - initial_size
    }

    /// Find global variables whose name matches `regex`.
    pub fn find_global_variables_matching(
        &self,
        regex: &Regex,
        append: bool,
        max_matches: usize,
        variables: &mut VariableList,
    ) -> usize
    {
        if !append {
            variables.clear();
        }
        let initial_size = variables.len();
        let modules = self.lock();
        for module in &modules.entries {
            let before = variables.len();
            module.find_global_variables_matching(regex, max_matches, variables);
            for variable in &mut variables[before..] {
                variable.module.get_or_insert_with(|| module.clone());
            }
        }
        variables.len() - initial_size
    }

    pub fn find_symbols_with_name_and_type(
        &self,
        name: &str,
        symbol_type: SymbolType,
        sc_list: &mut SymbolContextList,
        append: bool,
    ) -> usize
    {
        if !append {
            sc_list.clear();
        }
        let initial_size = sc_list.len();
        let modules = self.lock();
        for module in &modules.entries {
            let before = sc_list.len();
            module.find_symbols_with_name_and_type(name, symbol_type, sc_list);
            stamp_contexts(module, &mut sc_list[before..]);
        }
        sc_list.len() - initial_size
    }

    pub fn find_symbols_matching_regex_and_type(
        &self,
        regex: &Regex,
        symbol_type: SymbolType,
        sc_list: &mut SymbolContextList,
        append: bool,
    ) -> usize
    {
        if !append {
            sc_list.clear();
        }
        let initial_size = sc_list.len();
        let modules = self.lock();
        for module in &modules.entries {
            let before = sc_list.len();
            module.find_symbols_matching_regex_and_type(regex, symbol_type, sc_list);
            stamp_contexts(module, &mut sc_list[before..]);
        }
        sc_list.len() - initial_size
    }

    /// Find types named `name`, stopping once `max_matches` have been found.
    ///
    /// When `sc` already names a module only that module is searched, provided
    /// it belongs to this list.
    pub fn find_types(
        &self,
        sc: &SymbolContext,
        name: &str,
        append: bool,
        max_matches: usize,
        types: &mut TypeList,
    ) -> usize
    {
        if !append {
            types.clear();
        }
        let initial_size = types.len();
        let modules = self.lock();

        let scoped: Vec<&ModuleRef> = match &sc.module {
            Some(wanted) => modules.entries.iter().filter(|module| same_module(module, wanted)).take(1).collect(),
            None => modules.entries.iter().collect(),
        };

        for module in scoped {
            let found = types.len() - initial_size;
            if found >= max_matches {
                break;
            }
            let before = types.len();
            module.find_types(name, max_matches - found, types);
            for ty in &mut types[before..] {
                ty.module.get_or_insert_with(|| module.clone());
            }
        }
        types.len() - initial_size
    }

    /// Attribute a file address to the first module that recognises it.
    pub fn resolve_file_address(&self, vm_addr: u64) -> Option<SectionAddress>
    {
        let modules = self.lock();
        modules.entries.iter().find_map(|module| {
            module.resolve_file_address(vm_addr).map(|mut address| {
                address.module.get_or_insert_with(|| module.clone());
                address
            })
        })
    }

    /// Resolve a symbol context for `address`.
    ///
    /// An address that already names its module is resolved by that module
    /// alone, without taking the list lock. Otherwise the first module that
    /// resolves anything wins.
    pub fn resolve_symbol_context_for_address(
        &self,
        address: &SectionAddress,
        scope: SymbolContextScope,
        sc: &mut SymbolContext,
    ) -> SymbolContextScope
    {
        if let Some(module) = &address.module {
            let resolved = module.resolve_symbol_context_for_address(address, scope, sc);
            if !resolved.is_empty() {
                sc.module.get_or_insert_with(|| module.clone());
            }
            return resolved;
        }

        let modules = self.lock();
        for module in &modules.entries {
            let resolved = module.resolve_symbol_context_for_address(address, scope, sc);
            if !resolved.is_empty() {
                sc.module.get_or_insert_with(|| module.clone());
                return resolved;
            }
        }
        SymbolContextScope::empty()
    }

    /// Collect a context for every line table row at `file:line`.
    pub fn resolve_symbol_contexts_for_file_spec(
        &self,
        file: &Path,
        line: u32,
        check_inlines: bool,
        scope: SymbolContextScope,
        sc_list: &mut SymbolContextList,
    ) -> usize
    {
        let initial_size = sc_list.len();
        let modules = self.lock();
        for module in &modules.entries {
            let before = sc_list.len();
            module.resolve_symbol_contexts_for_file_spec(file, line, check_inlines, scope, sc_list);
            stamp_contexts(module, &mut sc_list[before..]);
        }
        sc_list.len() - initial_size
    }

    /// String-path form of [`ModuleList::resolve_symbol_contexts_for_file_spec`].
    pub fn resolve_symbol_context_for_file_path(
        &self,
        file_path: &str,
        line: u32,
        check_inlines: bool,
        scope: SymbolContextScope,
        sc_list: &mut SymbolContextList,
    ) -> usize
    {
        self.resolve_symbol_contexts_for_file_spec(Path::new(file_path), line, check_inlines, scope, sc_list)
    }

    /// Ask each module in turn to find a source file.
    pub fn find_source_file(&self, orig: &Path) -> Option<PathBuf>
    {
        let modules = self.lock();
        modules.entries.iter().find_map(|module| module.find_source_file(orig))
    }

    /// Write one diagnostic line per module:
    /// `[index] uuid (arch) "directory/filename"`.
    ///
    /// ## Errors
    ///
    /// Propagates errors from the writer.
    pub fn dump(&self, out: &mut impl fmt::Write) -> fmt::Result
    {
        let modules = self.lock();
        for (index, module) in modules.entries.iter().enumerate() {
            writeln!(out, "{}", describe(index, module))?;
        }
        Ok(())
    }

    /// Emit the same lines as [`ModuleList::dump`] at `debug` level.
    pub fn log_uuid_and_paths(&self, prefix: &str)
    {
        let modules = self.lock();
        for (index, module) in modules.entries.iter().enumerate() {
            debug!("{prefix}{}", describe(index, module));
        }
    }
}

impl Clone for ModuleList
{
    fn clone(&self) -> Self
    {
        Self {
            modules: Mutex::new(Modules {
                entries: self.modules(),
            }),
        }
    }
}

impl fmt::Debug for ModuleList
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("ModuleList").field("len", &self.len()).finish()
    }
}

fn stamp_contexts(module: &ModuleRef, contexts: &mut [SymbolContext])
{
    for sc in contexts {
        sc.module.get_or_insert_with(|| module.clone());
    }
}

fn describe(index: usize, module: &ModuleRef) -> String
{
    let uuid = module.uuid().map(ToString::to_string).unwrap_or_default();
    let path = module.file_spec();
    let directory = path.parent().map(|dir| dir.display().to_string()).unwrap_or_default();
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("[{index}] {uuid} ({}) \"{directory}/{filename}\"", module.architecture())
}
