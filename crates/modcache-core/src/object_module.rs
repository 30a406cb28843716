//! Object-file backed modules.
//!
//! [`ObjectModule`] reads an ELF, Mach-O (thin or universal) or PE image with
//! `object`, keeps its symbol table and section layout in memory, and answers
//! the [`Module`] search operations from the symbol table and DWARF.
//!
//! DWARF sections are copied into shared `Arc<[u8]>` buffers at open time.
//! A `gimli::Dwarf` over those buffers is assembled per query (the buffers are
//! only reference-counted, not copied) because neither it nor an
//! `addr2line::Context` can be shared between threads. What is expensive to
//! derive (function, type and compile unit tables) is computed once into a
//! plain-data index.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use addr2line::Context;
use gimli::{constants, AttributeValue, DebuggingInformationEntry, Dwarf, EndianArcSlice, Reader, RunTimeEndian, Unit};
use object::read::macho::{FatArch, MachOFatFile32, MachOFatFile64};
use object::{BinaryFormat, FileKind, Object, ObjectSection, ObjectSymbol};
use once_cell::sync::OnceCell;
use regex::Regex;
use tracing::{debug, trace};

use crate::demangle::{is_trait_object, make_symbol_name, map_dwarf_error};
use crate::error::{ModuleError, Result};
use crate::module::{Module, ModuleFactory, ModuleRef};
use crate::spec::{file_modification_time, path_matches, ModuleSpec};
use crate::types::{
    Address, Architecture, FunctionNameType, ModuleUuid, SectionAddress, SourceLocation, Symbol, SymbolContext,
    SymbolContextList, SymbolContextScope, SymbolName, SymbolType, TypeKind, TypeList, TypeMatch, Variable,
    VariableList,
};

type OwnedReader = EndianArcSlice<RunTimeEndian>;
type OwnedDwarf = Dwarf<OwnedReader>;

/// Canonical DWARF section names and the spellings used by each format.
const DWARF_SECTIONS: &[(&str, &[&str])] = &[
    (".debug_abbrev", &[".debug_abbrev", "__debug_abbrev"]),
    (".debug_addr", &[".debug_addr", "__debug_addr"]),
    (".debug_aranges", &[".debug_aranges", "__debug_aranges"]),
    (".debug_info", &[".debug_info", "__debug_info"]),
    (".debug_line", &[".debug_line", "__debug_line"]),
    (".debug_line_str", &[".debug_line_str", "__debug_line_str"]),
    (".debug_ranges", &[".debug_ranges", "__debug_ranges"]),
    (".debug_rnglists", &[".debug_rnglists", "__debug_rnglists"]),
    (".debug_str", &[".debug_str", "__debug_str"]),
    (".debug_str_offsets", &[".debug_str_offsets", "__debug_str_offs", "__debug_str_offsets"]),
    (".debug_types", &[".debug_types", "__debug_types"]),
    (".debug_loc", &[".debug_loc", "__debug_loc"]),
    (".debug_loclists", &[".debug_loclists", "__debug_loclists"]),
];

/// Build identity of a file, as read without keeping anything else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectIdentity
{
    pub architecture: Architecture,
    pub uuid: Option<ModuleUuid>,
}

/// Read just enough of `path` to learn its architecture and build identifier.
///
/// For universal binaries the slice for `architecture` is examined. Returns
/// `None` when the file cannot be read or holds no matching object.
pub fn read_identity(path: &Path, architecture: Option<Architecture>) -> Option<ObjectIdentity>
{
    let bytes = fs::read(path).ok()?;
    let file = select_object(&bytes, architecture)?;
    Some(ObjectIdentity {
        architecture: Architecture::from(file.architecture()),
        uuid: object_uuid(&file),
    })
}

/// Pick the object inside `data` that satisfies `wanted`.
///
/// Universal Mach-O files are searched slice by slice. Without a requested
/// architecture the slice for the running host is preferred, then the first.
fn select_object(data: &[u8], wanted: Option<Architecture>) -> Option<object::File<'_>>
{
    let slice = match FileKind::parse(data).ok()? {
        FileKind::MachOFat32 => fat_slice(MachOFatFile32::parse(data).ok()?.arches(), data, wanted)?,
        FileKind::MachOFat64 => fat_slice(MachOFatFile64::parse(data).ok()?.arches(), data, wanted)?,
        _ => data,
    };

    let file = object::File::parse(slice).ok()?;
    match wanted {
        Some(arch) if !Architecture::from(file.architecture()).is_compatible_with(arch) => None,
        _ => Some(file),
    }
}

fn fat_slice<'data, A: FatArch>(arches: &[A], data: &'data [u8], wanted: Option<Architecture>) -> Option<&'data [u8]>
{
    let preferred = wanted.unwrap_or_else(Architecture::current);
    let chosen = arches
        .iter()
        .find(|arch| Architecture::from(arch.architecture()) == preferred)
        .or_else(|| if wanted.is_none() { arches.first() } else { None })?;
    chosen.data(data).ok()
}

fn object_uuid(file: &object::File<'_>) -> Option<ModuleUuid>
{
    if let Ok(Some(uuid)) = file.mach_uuid() {
        return ModuleUuid::from_bytes(&uuid);
    }
    if let Ok(Some(build_id)) = file.build_id() {
        return ModuleUuid::from_bytes(build_id);
    }
    None
}

fn load_section_bytes(file: &object::File<'_>, names: &[&str]) -> Result<Option<Arc<[u8]>>>
{
    for name in names {
        if let Some(section) = file.section_by_name(name) {
            let data = section
                .uncompressed_data()
                .map_err(|err| ModuleError::ObjectParse(format!("failed to read {name}: {err}")))?;
            return Ok(Some(match data {
                Cow::Borrowed(bytes) => Arc::<[u8]>::from(bytes),
                Cow::Owned(vec) => vec.into(),
            }));
        }
    }

    Ok(None)
}

#[derive(Debug, Clone)]
struct SectionInfo
{
    name: String,
    address: u64,
    size: u64,
}

impl SectionInfo
{
    fn contains(&self, address: u64) -> bool
    {
        address >= self.address && address - self.address < self.size
    }
}

/// Everything kept from a successfully parsed object.
struct ObjectData
{
    endian: RunTimeEndian,
    sections: Vec<SectionInfo>,
    /// Sorted by address.
    symbols: Vec<Symbol>,
    debug_sections: HashMap<&'static str, Arc<[u8]>>,
}

impl ObjectData
{
    fn parse(file: &object::File<'_>) -> Result<Self>
    {
        let endian = if file.is_little_endian() {
            RunTimeEndian::Little
        } else {
            RunTimeEndian::Big
        };

        let sections = file
            .sections()
            .filter(|section| section.size() > 0)
            .filter_map(|section| {
                Some(SectionInfo {
                    name: section.name().ok()?.to_string(),
                    address: section.address(),
                    size: section.size(),
                })
            })
            .collect();

        let mut debug_sections = HashMap::new();
        for (canonical, aliases) in DWARF_SECTIONS {
            if let Some(data) = load_section_bytes(file, aliases)? {
                debug_sections.insert(*canonical, data);
            }
        }

        Ok(Self {
            endian,
            sections,
            symbols: collect_symbols(file),
            debug_sections,
        })
    }

    fn has_dwarf(&self) -> bool
    {
        self.debug_sections.contains_key(".debug_info")
    }

    fn dwarf(&self) -> Result<OwnedDwarf>
    {
        Dwarf::load(|id| {
            let data = self
                .debug_sections
                .get(id.name())
                .cloned()
                .unwrap_or_else(|| Arc::<[u8]>::from(Vec::new()));
            Ok::<_, gimli::Error>(EndianArcSlice::new(data, self.endian))
        })
        .map_err(|err| map_dwarf_error("loading DWARF", err))
    }

    fn symbol_containing(&self, address: u64) -> Option<&Symbol>
    {
        let address = Address::from(address);
        let end = self.symbols.partition_point(|symbol| symbol.address <= address);
        self.symbols[..end]
            .iter()
            .rev()
            .filter(|symbol| matches!(symbol.kind, SymbolType::Code | SymbolType::Data))
            .find(|symbol| symbol.contains(address))
    }
}

fn collect_symbols(file: &object::File<'_>) -> Vec<Symbol>
{
    let strip_underscore = file.format() == BinaryFormat::MachO;
    let mut symbols: Vec<Symbol> = file
        .symbols()
        .chain(file.dynamic_symbols())
        .filter(|symbol| symbol.is_definition())
        .filter_map(|symbol| {
            let raw = symbol.name().ok()?;
            let raw = if strip_underscore {
                raw.strip_prefix('_').unwrap_or(raw)
            } else {
                raw
            };
            if raw.is_empty() {
                return None;
            }
            Some(Symbol {
                name: make_symbol_name(raw.to_string()),
                address: Address::from(symbol.address()),
                size: symbol.size(),
                kind: SymbolType::from(symbol.kind()),
            })
        })
        .collect();

    symbols.sort_by_key(|symbol| symbol.address);
    symbols.dedup_by(|a, b| a.address == b.address && a.name.raw() == b.name.raw());
    symbols
}

/// A function (or inlined call site) found in DWARF.
#[derive(Debug, Clone)]
struct FunctionEntry
{
    name: SymbolName,
    low_pc: u64,
    high_pc: Option<u64>,
    compile_unit: Option<String>,
    inlined: bool,
}

impl FunctionEntry
{
    fn contains(&self, address: u64) -> bool
    {
        match self.high_pc {
            Some(high_pc) => address >= self.low_pc && address < high_pc,
            None => address == self.low_pc,
        }
    }
}

#[derive(Debug, Default)]
struct DebugIndex
{
    compile_units: Vec<String>,
    functions: Vec<FunctionEntry>,
    types: Vec<TypeMatch>,
    source_files: Vec<String>,
}

fn build_debug_index(dwarf: &OwnedDwarf) -> Result<DebugIndex>
{
    let mut index = DebugIndex::default();
    let mut headers = dwarf.units();
    while let Some(header) = headers
        .next()
        .map_err(|err| map_dwarf_error("reading .debug_info unit header", err))?
    {
        let unit = dwarf
            .unit(header)
            .map_err(|err| map_dwarf_error("parsing compilation unit", err))?;
        let unit_name = unit_name(&unit);
        if let Some(name) = &unit_name {
            index.compile_units.push(name.clone());
        }

        let mut cursor = unit.entries();
        while let Some((_delta, entry)) = cursor.next_dfs().map_err(|err| map_dwarf_error("traversing DIE tree", err))? {
            match entry.tag() {
                constants::DW_TAG_subprogram | constants::DW_TAG_inlined_subroutine => {
                    if let Some(function) = function_entry(dwarf, &unit, entry, unit_name.as_ref())? {
                        index.functions.push(function);
                    }
                }
                constants::DW_TAG_structure_type
                | constants::DW_TAG_class_type
                | constants::DW_TAG_union_type
                | constants::DW_TAG_enumeration_type
                | constants::DW_TAG_typedef => {
                    if let Some(ty) = type_entry(dwarf, &unit, entry)? {
                        index.types.push(ty);
                    }
                }
                _ => {}
            }
        }

        if let Some(program) = &unit.line_program {
            let header = program.header();
            for file in header.file_names() {
                if let Some(path) = file_entry_path(dwarf, &unit, header, file) {
                    index.source_files.push(path);
                }
            }
        }
    }

    index.source_files.sort();
    index.source_files.dedup();
    Ok(index)
}

fn unit_name(unit: &Unit<OwnedReader>) -> Option<String>
{
    let name = unit.name.as_ref()?.to_string_lossy().ok()?;
    Some(name.into_owned())
}

fn attr_to_string(dwarf: &OwnedDwarf, unit: &Unit<OwnedReader>, value: AttributeValue<OwnedReader>) -> Result<String>
{
    let reader = dwarf
        .attr_string(unit, value)
        .map_err(|err| map_dwarf_error("resolving DWARF string", err))?;
    let owned = reader
        .to_string_lossy()
        .map_err(|err| map_dwarf_error("decoding DWARF string", err))?
        .into_owned();
    Ok(owned)
}

/// Linkage name if present (it demangles to the full path), else `DW_AT_name`.
fn entry_name(
    dwarf: &OwnedDwarf,
    unit: &Unit<OwnedReader>,
    entry: &DebuggingInformationEntry<'_, '_, OwnedReader>,
) -> Result<Option<String>>
{
    for at in [constants::DW_AT_linkage_name, constants::DW_AT_MIPS_linkage_name, constants::DW_AT_name] {
        if let Some(attr) = entry.attr(at).map_err(|err| map_dwarf_error("reading name attribute", err))? {
            return Ok(Some(attr_to_string(dwarf, unit, attr.value())?));
        }
    }
    Ok(None)
}

/// Name of a function entry, following abstract origins and specifications.
fn function_name(
    dwarf: &OwnedDwarf,
    unit: &Unit<OwnedReader>,
    entry: &DebuggingInformationEntry<'_, '_, OwnedReader>,
    depth: usize,
) -> Result<Option<String>>
{
    if let Some(name) = entry_name(dwarf, unit, entry)? {
        return Ok(Some(name));
    }
    if depth >= 4 {
        return Ok(None);
    }
    for at in [constants::DW_AT_abstract_origin, constants::DW_AT_specification] {
        let Some(attr) = entry.attr(at).map_err(|err| map_dwarf_error("reading origin attribute", err))? else {
            continue;
        };
        if let AttributeValue::UnitRef(offset) = attr.value() {
            let origin = unit.entry(offset).map_err(|err| map_dwarf_error("reading origin entry", err))?;
            return function_name(dwarf, unit, &origin, depth + 1);
        }
    }
    Ok(None)
}

fn function_entry(
    dwarf: &OwnedDwarf,
    unit: &Unit<OwnedReader>,
    entry: &DebuggingInformationEntry<'_, '_, OwnedReader>,
    compile_unit: Option<&String>,
) -> Result<Option<FunctionEntry>>
{
    let Some(low_attr) = entry
        .attr(constants::DW_AT_low_pc)
        .map_err(|err| map_dwarf_error("reading DW_AT_low_pc", err))?
    else {
        return Ok(None);
    };
    let Some(low_pc) = dwarf
        .attr_address(unit, low_attr.value())
        .map_err(|err| map_dwarf_error("resolving DW_AT_low_pc", err))?
    else {
        return Ok(None);
    };

    let high_pc = match entry
        .attr(constants::DW_AT_high_pc)
        .map_err(|err| map_dwarf_error("reading DW_AT_high_pc", err))?
    {
        Some(attr) => match dwarf
            .attr_address(unit, attr.value())
            .map_err(|err| map_dwarf_error("resolving DW_AT_high_pc", err))?
        {
            Some(address) => Some(address),
            None => attr.udata_value().map(|length| low_pc.saturating_add(length)),
        },
        None => None,
    };

    let Some(name) = function_name(dwarf, unit, entry, 0)? else {
        return Ok(None);
    };

    Ok(Some(FunctionEntry {
        name: make_symbol_name(name),
        low_pc,
        high_pc,
        compile_unit: compile_unit.cloned(),
        inlined: entry.tag() == constants::DW_TAG_inlined_subroutine,
    }))
}

fn type_entry(
    dwarf: &OwnedDwarf,
    unit: &Unit<OwnedReader>,
    entry: &DebuggingInformationEntry<'_, '_, OwnedReader>,
) -> Result<Option<TypeMatch>>
{
    if entry
        .attr(constants::DW_AT_declaration)
        .map_err(|err| map_dwarf_error("reading DW_AT_declaration", err))?
        .is_some()
    {
        return Ok(None);
    }
    let Some(attr) = entry
        .attr(constants::DW_AT_name)
        .map_err(|err| map_dwarf_error("reading DW_AT_name", err))?
    else {
        return Ok(None);
    };
    let name = attr_to_string(dwarf, unit, attr.value())?;

    let kind = match entry.tag() {
        constants::DW_TAG_structure_type | constants::DW_TAG_class_type if is_trait_object(&name) => {
            TypeKind::TraitObject
        }
        constants::DW_TAG_structure_type | constants::DW_TAG_class_type => TypeKind::Struct,
        constants::DW_TAG_union_type => TypeKind::Union,
        constants::DW_TAG_enumeration_type => TypeKind::Enum,
        constants::DW_TAG_typedef => TypeKind::Typedef,
        _ => TypeKind::Unknown,
    };

    let size_bits = entry
        .attr(constants::DW_AT_byte_size)
        .map_err(|err| map_dwarf_error("reading DW_AT_byte_size", err))?
        .and_then(|attr| attr.udata_value())
        .map(|bytes| bytes * 8);

    Ok(Some(TypeMatch {
        name,
        kind,
        size_bits,
        module: None,
    }))
}

fn file_entry_path(
    dwarf: &OwnedDwarf,
    unit: &Unit<OwnedReader>,
    header: &gimli::LineProgramHeader<OwnedReader>,
    file: &gimli::FileEntry<OwnedReader>,
) -> Option<String>
{
    let mut path = PathBuf::new();
    if let Some(comp_dir) = &unit.comp_dir {
        path.push(&*comp_dir.to_string_lossy().ok()?);
    }
    if let Some(directory) = file.directory(header) {
        path.push(attr_to_string(dwarf, unit, directory).ok()?);
    }
    path.push(attr_to_string(dwarf, unit, file.path_name()).ok()?);
    Some(path.to_string_lossy().into_owned())
}

fn type_names_match(candidate: &str, wanted: &str) -> bool
{
    candidate == wanted
        || candidate.strip_prefix("::") == Some(wanted)
        || candidate.rsplit("::").next() == Some(wanted)
}

/// A module read from an object file on disk.
pub struct ObjectModule
{
    path: PathBuf,
    platform_path: Option<PathBuf>,
    architecture: Architecture,
    uuid: Option<ModuleUuid>,
    modification_time: Option<SystemTime>,
    object: Option<ObjectData>,
    debug_index: OnceCell<DebugIndex>,
}

impl ObjectModule
{
    /// Open the file named by `spec.file()`.
    ///
    /// A readable file that is not an object file, or holds no object for the
    /// requested architecture, still yields a module; it just has no object
    /// file. Callers must check [`Module::has_object_file`].
    ///
    /// ## Errors
    ///
    /// - [`ModuleError::NotLocated`] if the spec names no file
    /// - [`ModuleError::Io`] if the file cannot be read
    /// - [`ModuleError::ObjectParse`] if a DWARF section is corrupt
    pub fn open(spec: &ModuleSpec) -> Result<Self>
    {
        let Some(path) = spec.file() else {
            return Err(ModuleError::NotLocated {
                uuid: spec.uuid().cloned(),
            });
        };

        let bytes = fs::read(path)?;
        let modification_time = file_modification_time(path);

        let (architecture, uuid, object) = match select_object(&bytes, spec.architecture()) {
            Some(file) => {
                let data = ObjectData::parse(&file)?;
                (Architecture::from(file.architecture()), object_uuid(&file), Some(data))
            }
            None => {
                debug!(path = %path.display(), "no usable object in file");
                (spec.architecture().unwrap_or(Architecture::Unknown("unknown")), None, None)
            }
        };

        trace!(
            path = %path.display(),
            %architecture,
            symbols = object.as_ref().map_or(0, |data| data.symbols.len()),
            "opened object module"
        );

        Ok(Self {
            path: path.to_path_buf(),
            platform_path: spec.platform_file().map(Path::to_path_buf),
            architecture,
            uuid,
            modification_time,
            object,
            debug_index: OnceCell::new(),
        })
    }

    /// Symbol table entries, sorted by address.
    pub fn symbols(&self) -> &[Symbol]
    {
        self.object.as_ref().map(|data| data.symbols.as_slice()).unwrap_or_default()
    }

    fn debug_index(&self) -> Option<&DebugIndex>
    {
        let data = self.object.as_ref().filter(|data| data.has_dwarf())?;
        Some(self.debug_index.get_or_init(|| {
            match data.dwarf().and_then(|dwarf| build_debug_index(&dwarf)) {
                Ok(index) => index,
                Err(err) => {
                    debug!(path = %self.path.display(), error = %err, "failed to index DWARF");
                    DebugIndex::default()
                }
            }
        }))
    }

    fn with_context<T>(&self, f: impl FnOnce(&Context<OwnedReader>) -> Option<T>) -> Option<T>
    {
        let data = self.object.as_ref().filter(|data| data.has_dwarf())?;
        let dwarf = data.dwarf().ok()?;
        let context = Context::from_dwarf(dwarf).ok()?;
        f(&context)
    }

    fn line_entries(
        &self,
        file: &Path,
        line: u32,
        check_inlines: bool,
        scope: SymbolContextScope,
        sc_list: &mut SymbolContextList,
    ) -> Result<()>
    {
        let Some(data) = self.object.as_ref().filter(|data| data.has_dwarf()) else {
            return Ok(());
        };
        let dwarf = data.dwarf()?;

        let mut headers = dwarf.units();
        while let Some(header) = headers
            .next()
            .map_err(|err| map_dwarf_error("reading .debug_info unit header", err))?
        {
            let unit = dwarf
                .unit(header)
                .map_err(|err| map_dwarf_error("parsing compilation unit", err))?;
            let compile_unit = unit_name(&unit);
            if !check_inlines && !compile_unit.as_deref().is_some_and(|name| path_matches(file, Path::new(name))) {
                continue;
            }
            let Some(program) = unit.line_program.clone() else {
                continue;
            };

            let mut last_address = None;
            let mut rows = program.rows();
            while let Some((header, row)) = rows.next_row().map_err(|err| map_dwarf_error("reading line table", err))? {
                if row.end_sequence() || !row.is_stmt() {
                    continue;
                }
                if row.line().map(|l| l.get()) != Some(u64::from(line)) {
                    continue;
                }
                let Some(path) = row.file(header).and_then(|entry| file_entry_path(&dwarf, &unit, header, entry)) else {
                    continue;
                };
                if !path_matches(file, Path::new(&path)) || last_address == Some(row.address()) {
                    continue;
                }
                last_address = Some(row.address());

                let column = match row.column() {
                    gimli::ColumnType::LeftEdge => None,
                    gimli::ColumnType::Column(column) => u32::try_from(column.get()).ok(),
                };
                let mut sc = SymbolContext {
                    compile_unit: compile_unit.clone(),
                    line_entry: Some(SourceLocation {
                        file: path,
                        line: Some(line),
                        column,
                    }),
                    address: Some(Address::from(row.address())),
                    ..SymbolContext::default()
                };
                if scope.contains(SymbolContextScope::FUNCTION) {
                    sc.function = self.function_at(row.address()).map(|function| function.name.clone());
                }
                if scope.contains(SymbolContextScope::SYMBOL) {
                    sc.symbol = data.symbol_containing(row.address()).cloned();
                }
                sc_list.push(sc);
            }
        }

        Ok(())
    }

    /// Innermost concrete function covering `address`.
    fn function_at(&self, address: u64) -> Option<&FunctionEntry>
    {
        self.debug_index()?
            .functions
            .iter()
            .filter(|function| !function.inlined && function.contains(address))
            .min_by_key(|function| function.high_pc.unwrap_or(function.low_pc).saturating_sub(function.low_pc))
    }
}

impl fmt::Debug for ObjectModule
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("ObjectModule")
            .field("path", &self.path)
            .field("architecture", &self.architecture)
            .field("uuid", &self.uuid)
            .field("has_object_file", &self.object.is_some())
            .finish_non_exhaustive()
    }
}

impl Module for ObjectModule
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
        self.architecture
    }

    fn uuid(&self) -> Option<&ModuleUuid>
    {
        self.uuid.as_ref()
    }

    fn modification_time(&self) -> Option<SystemTime>
    {
        self.modification_time
    }

    fn has_object_file(&self) -> bool
    {
        self.object.is_some()
    }

    fn find_functions(
        &self,
        name: &str,
        name_type: FunctionNameType,
        include_symbols: bool,
        include_inlines: bool,
        sc_list: &mut SymbolContextList,
    ) -> usize
    {
        let name_matches = |candidate: &SymbolName| {
            (name_type.contains(FunctionNameType::FULL) && candidate.matches(name))
                || (name_type.contains(FunctionNameType::BASE) && candidate.base_name() == name)
        };
        let initial_size = sc_list.len();
        let mut seen = Vec::new();

        if let Some(index) = self.debug_index() {
            for function in &index.functions {
                if (function.inlined && !include_inlines) || !name_matches(&function.name) {
                    continue;
                }
                seen.push(function.low_pc);
                sc_list.push(SymbolContext {
                    compile_unit: function.compile_unit.clone(),
                    function: Some(function.name.clone()),
                    address: Some(Address::from(function.low_pc)),
                    ..SymbolContext::default()
                });
            }
        }

        if include_symbols {
            for symbol in self.symbols() {
                if symbol.kind != SymbolType::Code
                    || !name_matches(&symbol.name)
                    || seen.contains(&symbol.address.value())
                {
                    continue;
                }
                sc_list.push(SymbolContext {
                    symbol: Some(symbol.clone()),
                    address: Some(symbol.address),
                    ..SymbolContext::default()
                });
            }
        }

        sc_list.len() - initial_size
    }

    fn find_compile_units(&self, path: &Path, sc_list: &mut SymbolContextList) -> usize
    {
        let Some(index) = self.debug_index() else {
            return 0;
        };
        let initial_size = sc_list.len();
        for name in &index.compile_units {
            if path_matches(path, Path::new(name)) {
                sc_list.push(SymbolContext {
                    compile_unit: Some(name.clone()),
                    ..SymbolContext::default()
                });
            }
        }
        sc_list.len() - initial_size
    }

    fn find_global_variables(&self, name: &str, max_matches: usize, variables: &mut VariableList) -> usize
    {
        collect_variables(self.symbols(), |symbol| symbol.name.matches(name), max_matches, variables)
    }

    fn find_global_variables_matching(&self, regex: &Regex, max_matches: usize, variables: &mut VariableList) -> usize
    {
        collect_variables(
            self.symbols(),
            |symbol| regex.is_match(symbol.name.display_name()),
            max_matches,
            variables,
        )
    }

    fn find_symbols_with_name_and_type(&self, name: &str, symbol_type: SymbolType, sc_list: &mut SymbolContextList) -> usize
    {
        collect_symbol_contexts(
            self.symbols(),
            |symbol| symbol_type.matches(symbol.kind) && symbol.name.matches(name),
            sc_list,
        )
    }

    fn find_symbols_matching_regex_and_type(
        &self,
        regex: &Regex,
        symbol_type: SymbolType,
        sc_list: &mut SymbolContextList,
    ) -> usize
    {
        collect_symbol_contexts(
            self.symbols(),
            |symbol| symbol_type.matches(symbol.kind) && regex.is_match(symbol.name.display_name()),
            sc_list,
        )
    }

    fn find_types(&self, name: &str, max_matches: usize, types: &mut TypeList) -> usize
    {
        let Some(index) = self.debug_index() else {
            return 0;
        };
        let initial_size = types.len();
        types.extend(
            index
                .types
                .iter()
                .filter(|ty| type_names_match(&ty.name, name))
                .take(max_matches)
                .cloned(),
        );
        types.len() - initial_size
    }

    fn resolve_file_address(&self, vm_addr: u64) -> Option<SectionAddress>
    {
        let section = self.object.as_ref()?.sections.iter().find(|section| section.contains(vm_addr))?;
        Some(SectionAddress {
            module: None,
            section: Some(section.name.clone()),
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
        let Some(data) = self.object.as_ref() else {
            return SymbolContextScope::empty();
        };
        let vm_addr = address.file_address.value();
        if !data.sections.iter().any(|section| section.contains(vm_addr)) {
            return SymbolContextScope::empty();
        }

        let mut resolved = scope & SymbolContextScope::MODULE;
        sc.address = Some(address.file_address);

        if scope.contains(SymbolContextScope::SYMBOL) {
            if let Some(symbol) = data.symbol_containing(vm_addr) {
                sc.symbol = Some(symbol.clone());
                resolved |= SymbolContextScope::SYMBOL;
            }
        }

        if scope.contains(SymbolContextScope::COMPILE_UNIT) {
            if let Some(compile_unit) = self.function_at(vm_addr).and_then(|function| function.compile_unit.clone()) {
                sc.compile_unit = Some(compile_unit);
                resolved |= SymbolContextScope::COMPILE_UNIT;
            }
        }

        if scope.intersects(SymbolContextScope::FUNCTION | SymbolContextScope::LINE_ENTRY) {
            let found = self.with_context(|context| {
                let function = if scope.contains(SymbolContextScope::FUNCTION) {
                    let mut frames = context.find_frames(vm_addr).skip_all_loads().ok()?;
                    let mut innermost = None;
                    while let Ok(Some(frame)) = frames.next() {
                        if let Some(raw) = frame.function.as_ref().and_then(|function| function.raw_name().ok()) {
                            innermost = Some(make_symbol_name(raw.to_string()));
                            break;
                        }
                    }
                    innermost
                } else {
                    None
                };
                let line_entry = if scope.contains(SymbolContextScope::LINE_ENTRY) {
                    context.find_location(vm_addr).ok().flatten().and_then(|location| {
                        location.file.map(|file| SourceLocation {
                            file: file.to_string(),
                            line: location.line,
                            column: location.column,
                        })
                    })
                } else {
                    None
                };
                Some((function, line_entry))
            });

            if let Some((function, line_entry)) = found {
                if let Some(function) = function {
                    sc.function = Some(function);
                    resolved |= SymbolContextScope::FUNCTION;
                }
                if let Some(line_entry) = line_entry {
                    sc.line_entry = Some(line_entry);
                    resolved |= SymbolContextScope::LINE_ENTRY;
                }
            }
        }

        resolved
    }

    fn resolve_symbol_contexts_for_file_spec(
        &self,
        file: &Path,
        line: u32,
        check_inlines: bool,
        scope: SymbolContextScope,
        sc_list: &mut SymbolContextList,
    ) -> usize
    {
        let initial_size = sc_list.len();
        if let Err(err) = self.line_entries(file, line, check_inlines, scope, sc_list) {
            debug!(path = %self.path.display(), error = %err, "failed to read line tables");
        }
        // Rows collected before a failure are kept
        sc_list.len() - initial_size
    }

    fn find_source_file(&self, orig: &Path) -> Option<PathBuf>
    {
        self.debug_index()?
            .source_files
            .iter()
            .map(PathBuf::from)
            .find(|candidate| path_matches(orig, candidate) && candidate.is_file())
    }
}

fn collect_variables(
    symbols: &[Symbol],
    predicate: impl Fn(&Symbol) -> bool,
    max_matches: usize,
    variables: &mut VariableList,
) -> usize
{
    let initial_size = variables.len();
    variables.extend(
        symbols
            .iter()
            .filter(|symbol| matches!(symbol.kind, SymbolType::Data | SymbolType::ThreadLocal))
            .filter(|symbol| predicate(symbol))
            .take(max_matches)
            .map(|symbol| Variable {
                name: symbol.name.clone(),
                address: symbol.address,
                size: symbol.size,
                module: None,
            }),
    );
    variables.len() - initial_size
}

fn collect_symbol_contexts(
    symbols: &[Symbol],
    predicate: impl Fn(&Symbol) -> bool,
    sc_list: &mut SymbolContextList,
) -> usize
{
    let initial_size = sc_list.len();
    sc_list.extend(symbols.iter().filter(|symbol| predicate(symbol)).map(|symbol| SymbolContext {
        symbol: Some(symbol.clone()),
        address: Some(symbol.address),
        ..SymbolContext::default()
    }));
    sc_list.len() - initial_size
}

/// Factory that opens [`ObjectModule`]s from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectModuleFactory;

impl ModuleFactory for ObjectModuleFactory
{
    fn create_module(&self, spec: &ModuleSpec) -> Result<ModuleRef>
    {
        Ok(Arc::new(ObjectModule::open(spec)?))
    }
}
