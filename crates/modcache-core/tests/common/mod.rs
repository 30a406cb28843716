//! Fake collaborators shared by the integration tests.

#![allow(dead_code)]

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use modcache_core::module::{Module, ModuleFactory, ModuleRef};
use modcache_core::spec::{file_modification_time, ModuleSpec};
use modcache_core::types::{
    Address, Architecture, FunctionNameType, ModuleUuid, SectionAddress, SourceLocation, Symbol, SymbolContext,
    SymbolContextList, SymbolContextScope, SymbolLanguage, SymbolName, SymbolType, TypeKind, TypeList, TypeMatch,
    Variable, VariableList,
};
use modcache_core::{ModuleError, ObjectLocator};
use regex::Regex;

/// In-memory module with fixed identity and canned search results.
#[derive(Debug, Clone)]
pub struct FakeModule
{
    pub path: PathBuf,
    pub platform_path: Option<PathBuf>,
    pub arch: Architecture,
    pub uuid: Option<ModuleUuid>,
    pub mtime: Option<SystemTime>,
    pub has_object: bool,
    pub functions: Vec<String>,
    pub types: Vec<String>,
    pub variables: Vec<String>,
    pub compile_units: Vec<PathBuf>,
    pub symbols: Vec<(String, SymbolType)>,
    /// Line table rows as `(source file, line)`.
    pub lines: Vec<(PathBuf, u32)>,
    /// `[start, end)` of the single fake `.text` section.
    pub text: (u64, u64),
}

impl FakeModule
{
    pub fn new(path: impl Into<PathBuf>) -> Self
    {
        let path = path.into();
        Self {
            mtime: file_modification_time(&path),
            path,
            platform_path: None,
            arch: Architecture::X86_64,
            uuid: None,
            has_object: true,
            functions: Vec::new(),
            types: Vec::new(),
            variables: Vec::new(),
            compile_units: Vec::new(),
            symbols: Vec::new(),
            lines: Vec::new(),
            text: (0x1000, 0x2000),
        }
    }

    pub fn with_uuid(mut self, uuid: ModuleUuid) -> Self
    {
        self.uuid = Some(uuid);
        self
    }

    pub fn with_arch(mut self, arch: Architecture) -> Self
    {
        self.arch = arch;
        self
    }

    pub fn with_functions(mut self, names: &[&str]) -> Self
    {
        self.functions = names.iter().map(ToString::to_string).collect();
        self
    }

    pub fn with_types(mut self, names: &[&str]) -> Self
    {
        self.types = names.iter().map(ToString::to_string).collect();
        self
    }

    pub fn with_variables(mut self, names: &[&str]) -> Self
    {
        self.variables = names.iter().map(ToString::to_string).collect();
        self
    }

    pub fn with_compile_units(mut self, paths: &[&str]) -> Self
    {
        self.compile_units = paths.iter().map(PathBuf::from).collect();
        self
    }

    pub fn with_symbols(mut self, symbols: &[(&str, SymbolType)]) -> Self
    {
        self.symbols = symbols.iter().map(|(name, kind)| ((*name).to_string(), *kind)).collect();
        self
    }

    pub fn with_lines(mut self, lines: &[(&str, u32)]) -> Self
    {
        self.lines = lines.iter().map(|(file, line)| (PathBuf::from(file), *line)).collect();
        self
    }

    pub fn with_text(mut self, start: u64, end: u64) -> Self
    {
        self.text = (start, end);
        self
    }

    pub fn into_ref(self) -> ModuleRef
    {
        Arc::new(self)
    }

    fn in_text(&self, address: u64) -> bool
    {
        address >= self.text.0 && address < self.text.1
    }

    fn symbol_contexts(&self, predicate: impl Fn(&str, SymbolType) -> bool, sc_list: &mut SymbolContextList) -> usize
    {
        let before = sc_list.len();
        for (offset, (name, kind)) in (0u64..).zip(&self.symbols) {
            if !predicate(name, *kind) {
                continue;
            }
            let address = Address::from(self.text.0 + offset * 0x10);
            sc_list.push(SymbolContext {
                symbol: Some(Symbol {
                    name: c_name(name),
                    address,
                    size: 0x10,
                    kind: *kind,
                }),
                address: Some(address),
                ..SymbolContext::default()
            });
        }
        sc_list.len() - before
    }
}

/// File-name comparison, enough for the fake tables.
fn same_file_name(a: &Path, b: &Path) -> bool
{
    a.file_name().is_some() && a.file_name() == b.file_name()
}

fn c_name(name: &str) -> SymbolName
{
    SymbolName::new(name.to_string(), None, SymbolLanguage::C)
}

impl Module for FakeModule
{
    fn file_spec(&self) -> &Path
    {
        &self.path
    }

    fn platform_file_spec(&self) -> Option<&Path>
    {
        self.platform_path.as_deref()
    }

    fn architecture(&self) -> Architecture
    {
        self.arch
    }

    fn uuid(&self) -> Option<&ModuleUuid>
    {
        self.uuid.as_ref()
    }

    fn modification_time(&self) -> Option<SystemTime>
    {
        self.mtime
    }

    fn has_object_file(&self) -> bool
    {
        self.has_object
    }

    fn find_functions(
        &self,
        name: &str,
        _name_type: FunctionNameType,
        _include_symbols: bool,
        _include_inlines: bool,
        sc_list: &mut SymbolContextList,
    ) -> usize
    {
        let before = sc_list.len();
        sc_list.extend(self.functions.iter().filter(|f| f.as_str() == name).map(|f| SymbolContext {
            function: Some(c_name(f)),
            ..SymbolContext::default()
        }));
        sc_list.len() - before
    }

    fn find_compile_units(&self, path: &Path, sc_list: &mut SymbolContextList) -> usize
    {
        let before = sc_list.len();
        sc_list.extend(
            self.compile_units
                .iter()
                .filter(|unit| same_file_name(path, unit))
                .map(|unit| SymbolContext {
                    compile_unit: Some(unit.display().to_string()),
                    ..SymbolContext::default()
                }),
        );
        sc_list.len() - before
    }

    fn find_global_variables_matching(&self, regex: &Regex, max_matches: usize, variables: &mut VariableList) -> usize
    {
        let before = variables.len();
        variables.extend(
            self.variables
                .iter()
                .filter(|v| regex.is_match(v))
                .take(max_matches)
                .map(|v| Variable {
                    name: c_name(v),
                    address: Address::from(self.text.0),
                    size: 8,
                    module: None,
                }),
        );
        variables.len() - before
    }

    fn find_symbols_with_name_and_type(
        &self,
        name: &str,
        symbol_type: SymbolType,
        sc_list: &mut SymbolContextList,
    ) -> usize
    {
        self.symbol_contexts(|candidate, kind| candidate == name && symbol_type.matches(kind), sc_list)
    }

    fn find_symbols_matching_regex_and_type(
        &self,
        regex: &Regex,
        symbol_type: SymbolType,
        sc_list: &mut SymbolContextList,
    ) -> usize
    {
        self.symbol_contexts(|candidate, kind| regex.is_match(candidate) && symbol_type.matches(kind), sc_list)
    }

    fn resolve_symbol_contexts_for_file_spec(
        &self,
        file: &Path,
        line: u32,
        _check_inlines: bool,
        _scope: SymbolContextScope,
        sc_list: &mut SymbolContextList,
    ) -> usize
    {
        let before = sc_list.len();
        sc_list.extend(
            self.lines
                .iter()
                .filter(|(source, row)| *row == line && same_file_name(file, source))
                .map(|(source, row)| SymbolContext {
                    line_entry: Some(SourceLocation {
                        file: source.display().to_string(),
                        line: Some(*row),
                        column: None,
                    }),
                    ..SymbolContext::default()
                }),
        );
        sc_list.len() - before
    }

    fn find_source_file(&self, orig: &Path) -> Option<PathBuf>
    {
        self.lines
            .iter()
            .map(|(source, _)| source)
            .find(|source| same_file_name(orig, source))
            .cloned()
    }

    fn find_global_variables(&self, name: &str, max_matches: usize, variables: &mut VariableList) -> usize
    {
        let before = variables.len();
        variables.extend(
            self.variables
                .iter()
                .filter(|v| v.as_str() == name)
                .take(max_matches)
                .map(|v| Variable {
                    name: c_name(v),
                    address: Address::from(self.text.0),
                    size: 8,
                    module: None,
                }),
        );
        variables.len() - before
    }

    fn find_types(&self, name: &str, max_matches: usize, types: &mut TypeList) -> usize
    {
        let before = types.len();
        types.extend(
            self.types
                .iter()
                .filter(|t| t.as_str() == name)
                .take(max_matches)
                .map(|t| TypeMatch {
                    name: t.clone(),
                    kind: TypeKind::Struct,
                    size_bits: Some(64),
                    module: None,
                }),
        );
        types.len() - before
    }

    fn resolve_file_address(&self, vm_addr: u64) -> Option<SectionAddress>
    {
        self.in_text(vm_addr).then(|| SectionAddress {
            module: None,
            section: Some(".text".to_string()),
            file_address: Address::from(vm_addr),
        })
    }

    fn resolve_symbol_context_for_address(
        &self,
        address: &SectionAddress,
        scope: SymbolContextScope,
        sc: &mut SymbolContext,
    ) -> SymbolContextScope
    {
        if !self.in_text(address.file_address.value()) {
            return SymbolContextScope::empty();
        }
        sc.address = Some(address.file_address);
        scope & SymbolContextScope::MODULE
    }
}

/// Factory producing [`FakeModule`]s for files that exist on disk.
///
/// Modules get the factory's architecture and uuid, and only have an object
/// file when the requested architecture (if any) is the factory's.
#[derive(Debug, Clone)]
pub struct FakeFactory
{
    pub calls: Arc<AtomicUsize>,
    pub arch: Architecture,
    pub uuid: Option<ModuleUuid>,
    pub has_object: bool,
}

impl Default for FakeFactory
{
    fn default() -> Self
    {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            arch: Architecture::X86_64,
            uuid: None,
            has_object: true,
        }
    }
}

impl FakeFactory
{
    pub fn with_uuid(mut self, uuid: ModuleUuid) -> Self
    {
        self.uuid = Some(uuid);
        self
    }

    pub fn call_count(&self) -> usize
    {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ModuleFactory for FakeFactory
{
    fn create_module(&self, spec: &ModuleSpec) -> modcache_core::Result<ModuleRef>
    {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let path = spec.file().ok_or(ModuleError::NotLocated { uuid: None })?;
        if !path.exists() {
            return Err(ModuleError::Io(io::Error::new(io::ErrorKind::NotFound, "missing")));
        }

        let arch_ok = spec.architecture().is_none_or(|arch| arch == self.arch);
        Ok(Arc::new(FakeModule {
            platform_path: spec.platform_file().map(Path::to_path_buf),
            arch: self.arch,
            uuid: self.uuid.clone(),
            has_object: self.has_object && arch_ok,
            ..FakeModule::new(path)
        }))
    }
}

/// Locator with a scripted answer.
#[derive(Debug, Clone)]
pub enum FakeLocator
{
    /// Return the spec's own file.
    Echo,
    /// Always return this path.
    Fixed(PathBuf),
    /// Locate nothing.
    Nothing,
}

impl ObjectLocator for FakeLocator
{
    fn locate_executable_object_file(&self, spec: &ModuleSpec) -> Option<PathBuf>
    {
        match self {
            FakeLocator::Echo => spec.file().map(Path::to_path_buf),
            FakeLocator::Fixed(path) => Some(path.clone()),
            FakeLocator::Nothing => None,
        }
    }
}

/// A 16-byte uuid filled with `byte`.
pub fn uuid(byte: u8) -> ModuleUuid
{
    ModuleUuid::from_bytes(&[byte; 16]).unwrap()
}

/// Create a file with some content inside `dir`.
pub fn write_file(dir: &Path, name: &str) -> PathBuf
{
    let path = dir.join(name);
    std::fs::write(&path, b"\x7fFAKE").unwrap();
    path
}

/// Move a file's modification time an hour into the future.
pub fn touch_later(path: &Path)
{
    let file = File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() + Duration::from_secs(3600)).unwrap();
}
