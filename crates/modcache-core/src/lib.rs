//! # modcache-core
//!
//! Shared module registry for a native debugger.
//!
//! Every binary image (executable or shared library) a debugger loads is a
//! [`Module`]. Debug targets that load the same file share one in-memory
//! module through the process-wide [`ModuleCache`], which deduplicates loads,
//! notices when a file changed on disk, and finds files elsewhere when the
//! requested path does not hold the wanted build.
//!
//! - [`ModuleList`]: thread-safe ordered list of module handles, with
//!   spec-based lookup and search operations fanned out across its modules
//! - [`ModuleCache`]: the shared list plus the lookup-or-create protocol
//! - [`ModuleSpec`]: what a caller is looking for
//! - [`ObjectModule`]: a module read from disk with `object`, `gimli` and
//!   `addr2line`
//! - [`SearchPathLocator`]: finds object files in a list of directories
//!
//! The core never parses files itself; module construction and location sit
//! behind the [`ModuleFactory`] and [`ObjectLocator`] traits.

pub mod cache;
pub mod config;
pub(crate) mod demangle;
pub mod error;
pub mod locate;
pub mod module;
pub mod module_list;
pub mod object_module;
pub mod spec;
pub mod types;

pub use cache::{ModuleCache, SharedModuleResult};
pub use config::CacheConfig;
// Re-export commonly used types
pub use error::{ModuleError, ModuleErrorKind, Result};
pub use locate::{ObjectLocator, SearchPathLocator};
pub use module::{Module, ModuleFactory, ModuleKey, ModuleRef};
pub use module_list::{ModuleList, INVALID_INDEX};
pub use object_module::{ObjectModule, ObjectModuleFactory};
pub use spec::ModuleSpec;
pub use types::{Address, Architecture, ModuleUuid, SectionAddress};
