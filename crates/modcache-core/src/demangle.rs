//! Symbol demangling utilities.
//!
//! Object files store linkage names. Searches accept either spelling, so each
//! name is kept in both forms together with a guess at its language:
//!
//! - **Rust**: legacy `_ZN...17h<hash>E` or v0 `_R...`
//! - **C++**: Itanium `_Z...` that `rustc-demangle` rejects
//! - **C**: everything else

use rustc_demangle::try_demangle;

use crate::error::ModuleError;
use crate::types::{SymbolLanguage, SymbolName};

/// Build a [`SymbolName`] from a raw linkage name.
///
/// The alternate demangle format drops the trailing `::h<hash>` so that
/// `find_functions("my_crate::run")` matches without the caller knowing it.
pub(crate) fn make_symbol_name(raw: String) -> SymbolName
{
    let (demangled, language) = match try_demangle(&raw) {
        Ok(demangled) => (Some(format!("{demangled:#}")), SymbolLanguage::Rust),
        Err(_) if raw.starts_with("_Z") || raw.starts_with("__Z") => (None, SymbolLanguage::Cpp),
        Err(_) if raw.contains("::") => (None, SymbolLanguage::Rust),
        Err(_) => (None, SymbolLanguage::C),
    };

    SymbolName::new(raw, demangled, language)
}

/// Heuristic for Rust trait object type names (`dyn Trait`, `Box<dyn Trait>`).
pub(crate) fn is_trait_object(name: &str) -> bool
{
    let trimmed = name.trim();
    trimmed.starts_with("dyn ") || trimmed.starts_with("(dyn ") || trimmed.contains("<dyn ") || trimmed.contains(" dyn ")
}

/// Wrap a gimli error with what we were doing when it happened.
pub(crate) fn map_dwarf_error(context: &str, err: gimli::Error) -> ModuleError
{
    ModuleError::ObjectParse(format!("{context}: {err}"))
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_legacy_rust_symbol_drops_hash()
    {
        let name = make_symbol_name("_ZN4test4main17h0123456789abcdefE".to_string());
        assert_eq!(name.language(), SymbolLanguage::Rust);
        assert_eq!(name.demangled(), Some("test::main"));
        assert_eq!(name.base_name(), "main");
        assert!(name.matches("test::main"));
    }

    #[test]
    fn test_c_symbol_is_left_alone()
    {
        let name = make_symbol_name("malloc".to_string());
        assert_eq!(name.language(), SymbolLanguage::C);
        assert_eq!(name.demangled(), None);
        assert_eq!(name.display_name(), "malloc");
    }

    #[test]
    fn test_trait_object_detection()
    {
        assert!(is_trait_object("dyn core::fmt::Debug"));
        assert!(is_trait_object("alloc::boxed::Box<dyn core::any::Any>"));
        assert!(!is_trait_object("alloc::string::String"));
    }
}
