//! # Types
//!
//! Value types shared by the registry, the shared-module protocol and the
//! per-module search operations.

pub mod address;
pub mod arch;
pub mod symbols;
pub mod uuid;

// Re-export all public types
pub use address::{Address, SectionAddress};
pub use arch::Architecture;
pub use symbols::{
    FunctionNameType, SourceLocation, Symbol, SymbolContext, SymbolContextList, SymbolContextScope, SymbolLanguage,
    SymbolName, SymbolType, TypeKind, TypeList, TypeMatch, Variable, VariableList,
};
pub use uuid::ModuleUuid;
