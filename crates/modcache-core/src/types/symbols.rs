//! Symbol, source location and search result types.

use std::fmt;

use bitflags::bitflags;

use super::address::Address;
use crate::module::ModuleRef;

/// Programming language associated with a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolLanguage
{
    /// Rust symbol (detected via mangling or namespace patterns).
    Rust,
    /// C++ symbol (Itanium mangling without Rust extensions).
    Cpp,
    /// C symbol or unmangled global.
    C,
    /// Unknown or mixed language.
    Unknown,
}

impl fmt::Display for SymbolLanguage
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let label = match self {
            SymbolLanguage::Rust => "rust",
            SymbolLanguage::Cpp => "c++",
            SymbolLanguage::C => "c",
            SymbolLanguage::Unknown => "unknown",
        };
        write!(f, "{label}")
    }
}

/// A function or data name with demangling metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolName
{
    raw: String,
    demangled: Option<String>,
    language: SymbolLanguage,
}

impl SymbolName
{
    /// Construct from a raw linkage name.
    pub fn new(raw: String, demangled: Option<String>, language: SymbolLanguage) -> Self
    {
        Self {
            raw,
            demangled,
            language,
        }
    }

    /// Raw (mangled) name emitted in the object file.
    pub fn raw(&self) -> &str
    {
        &self.raw
    }

    /// Demangled human-friendly name if available.
    pub fn demangled(&self) -> Option<&str>
    {
        self.demangled.as_deref()
    }

    /// Preferred presentation (demangled fallback to raw).
    pub fn display_name(&self) -> &str
    {
        self.demangled.as_deref().unwrap_or(&self.raw)
    }

    /// Last `::` component of the display name.
    pub fn base_name(&self) -> &str
    {
        let display = self.display_name();
        display.rsplit("::").next().unwrap_or(display)
    }

    /// Language classification for the symbol.
    pub fn language(&self) -> SymbolLanguage
    {
        self.language
    }

    /// Exact match against either the raw or the demangled spelling.
    pub fn matches(&self, name: &str) -> bool
    {
        self.raw == name || self.demangled.as_deref() == Some(name)
    }
}

impl fmt::Display for SymbolName
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.display_name())
    }
}

/// Source code location for a symbol or line table row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation
{
    /// Absolute or compilation-directory-relative path.
    pub file: String,
    /// Line number, if known.
    pub line: Option<u32>,
    /// Column number, if known.
    pub column: Option<u32>,
}

impl SourceLocation
{
    /// Helper to build a location when only a file is known.
    pub fn from_file(file: impl Into<String>) -> Self
    {
        Self {
            file: file.into(),
            line: None,
            column: None,
        }
    }
}

/// Classification of a symbol table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolType
{
    /// Matches every other type when used as a search filter.
    Any,
    /// Executable code.
    Code,
    /// Initialized or uninitialized data.
    Data,
    /// Thread-local storage.
    ThreadLocal,
    /// Section marker.
    Section,
    /// Source file marker.
    File,
    /// Anything the object reader could not classify.
    Unknown,
}

impl SymbolType
{
    /// Whether a symbol of type `other` satisfies a search for `self`.
    pub fn matches(self, other: SymbolType) -> bool
    {
        self == SymbolType::Any || self == other
    }
}

impl From<object::SymbolKind> for SymbolType
{
    fn from(kind: object::SymbolKind) -> Self
    {
        match kind {
            object::SymbolKind::Text => SymbolType::Code,
            object::SymbolKind::Data => SymbolType::Data,
            object::SymbolKind::Tls => SymbolType::ThreadLocal,
            object::SymbolKind::Section => SymbolType::Section,
            object::SymbolKind::File => SymbolType::File,
            _ => SymbolType::Unknown,
        }
    }
}

/// One symbol table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol
{
    pub name: SymbolName,
    pub address: Address,
    pub size: u64,
    pub kind: SymbolType,
}

impl Symbol
{
    /// Whether `address` falls inside this symbol. Zero-sized symbols only
    /// contain their own address.
    pub fn contains(&self, address: Address) -> bool
    {
        match address.offset_from(self.address) {
            Some(0) => true,
            Some(offset) => offset < self.size,
            None => false,
        }
    }
}

bitflags! {
    /// How function names are compared in `find_functions`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FunctionNameType: u32 {
        /// Compare the full (raw or demangled) name.
        const FULL = 1 << 0;
        /// Compare only the last path component.
        const BASE = 1 << 1;
        /// Full or base name, whichever matches.
        const AUTO = Self::FULL.bits() | Self::BASE.bits();
    }
}

bitflags! {
    /// Which parts of a [`SymbolContext`] to resolve, and which were resolved.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SymbolContextScope: u32 {
        const MODULE = 1 << 0;
        const COMPILE_UNIT = 1 << 1;
        const FUNCTION = 1 << 2;
        const LINE_ENTRY = 1 << 3;
        const SYMBOL = 1 << 4;
        const EVERYTHING = Self::MODULE.bits()
            | Self::COMPILE_UNIT.bits()
            | Self::FUNCTION.bits()
            | Self::LINE_ENTRY.bits()
            | Self::SYMBOL.bits();
    }
}

/// Result of a symbol lookup: what is known about one code or data location.
///
/// Every field is optional; which ones are filled depends on the lookup and on
/// the debug information available in the module.
#[derive(Debug, Clone, Default)]
pub struct SymbolContext
{
    /// Module the result came from.
    pub module: Option<ModuleRef>,
    /// Compile unit name (`DW_AT_name`).
    pub compile_unit: Option<String>,
    /// Function from debug information.
    pub function: Option<SymbolName>,
    /// Symbol table entry.
    pub symbol: Option<Symbol>,
    /// Source line.
    pub line_entry: Option<SourceLocation>,
    /// File address the context describes.
    pub address: Option<Address>,
}

impl SymbolContext
{
    /// A context scoped to one module, as used by `ModuleList::find_types`.
    pub fn for_module(module: ModuleRef) -> Self
    {
        Self {
            module: Some(module),
            ..Self::default()
        }
    }
}

pub type SymbolContextList = Vec<SymbolContext>;

/// A global variable found by name or pattern.
#[derive(Debug, Clone)]
pub struct Variable
{
    pub name: SymbolName,
    pub address: Address,
    pub size: u64,
    pub module: Option<ModuleRef>,
}

pub type VariableList = Vec<Variable>;

/// Kind of a type found in debug information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind
{
    Struct,
    Enum,
    Union,
    TraitObject,
    Typedef,
    Unknown,
}

/// A type definition found by name.
#[derive(Debug, Clone)]
pub struct TypeMatch
{
    pub name: String,
    pub kind: TypeKind,
    pub size_bits: Option<u64>,
    pub module: Option<ModuleRef>,
}

pub type TypeList = Vec<TypeMatch>;

#[cfg(test)]
mod tests
{
    use super::*;

    fn name(raw: &str, demangled: Option<&str>) -> SymbolName
    {
        SymbolName::new(raw.to_string(), demangled.map(str::to_string), SymbolLanguage::Unknown)
    }

    #[test]
    fn test_base_name()
    {
        assert_eq!(name("_ZN3foo3barE", Some("foo::bar")).base_name(), "bar");
        assert_eq!(name("main", None).base_name(), "main");
    }

    #[test]
    fn test_symbol_contains()
    {
        let symbol = Symbol {
            name: name("f", None),
            address: Address::from(0x1000),
            size: 0x10,
            kind: SymbolType::Code,
        };
        assert!(symbol.contains(Address::from(0x1000)));
        assert!(symbol.contains(Address::from(0x100f)));
        assert!(!symbol.contains(Address::from(0x1010)));
        assert!(!symbol.contains(Address::from(0xfff)));
    }

    #[test]
    fn test_symbol_type_any_matches_everything()
    {
        assert!(SymbolType::Any.matches(SymbolType::Data));
        assert!(SymbolType::Code.matches(SymbolType::Code));
        assert!(!SymbolType::Code.matches(SymbolType::Data));
    }
}
