//! Tests for object-file backed modules, using the running test executable

use std::env;
use std::fs;

use modcache_core::cache::ModuleCache;
use modcache_core::config::CacheConfig;
use modcache_core::module::{same_module, Module, ModuleFactory};
use modcache_core::object_module::{read_identity, ObjectModule, ObjectModuleFactory};
use modcache_core::spec::ModuleSpec;
use modcache_core::types::{Architecture, SymbolType};
use modcache_core::ModuleError;

#[test]
fn test_opens_running_executable()
{
    let exe = env::current_exe().unwrap();
    let module = ObjectModule::open(&ModuleSpec::from_path(&exe)).unwrap();

    assert!(module.has_object_file());
    assert_eq!(module.architecture(), Architecture::current());
    assert_eq!(module.file_spec(), exe.as_path());
    assert!(module.modification_time().is_some());
    assert!(!module.symbols().is_empty());
}

#[test]
fn test_main_symbol_resolves_to_a_section()
{
    let exe = env::current_exe().unwrap();
    let module = ObjectModule::open(&ModuleSpec::from_path(&exe)).unwrap();

    let mut sc_list = Vec::new();
    assert!(module.find_symbols_with_name_and_type("main", SymbolType::Code, &mut sc_list) >= 1);
    let address = sc_list[0].address.unwrap();
    let resolved = module.resolve_file_address(address.value()).unwrap();
    assert!(resolved.section.is_some());
}

#[test]
fn test_wrong_architecture_has_no_object_file()
{
    let exe = env::current_exe().unwrap();
    let other = if Architecture::current() == Architecture::Arm64 {
        Architecture::X86
    } else {
        Architecture::Arm64
    };
    let module = ObjectModule::open(&ModuleSpec::from_path(&exe).with_architecture(other)).unwrap();
    assert!(!module.has_object_file());
    assert_eq!(module.architecture(), other);
}

#[test]
fn test_text_file_has_no_object_file()
{
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    fs::write(&path, "just some text").unwrap();

    let module = ObjectModuleFactory.create_module(&ModuleSpec::from_path(&path)).unwrap();
    assert!(!module.has_object_file());
    assert!(module.uuid().is_none());
    assert!(read_identity(&path, None).is_none());
}

#[test]
fn test_missing_file_is_an_error()
{
    let dir = tempfile::tempdir().unwrap();
    let result = ObjectModule::open(&ModuleSpec::from_path(dir.path().join("missing")));
    assert!(matches!(result, Err(ModuleError::Io(_))));

    let result = ObjectModule::open(&ModuleSpec::new());
    assert!(matches!(result, Err(ModuleError::NotLocated { .. })));
}

#[test]
fn test_read_identity_matches_open()
{
    let exe = env::current_exe().unwrap();
    let module = ObjectModule::open(&ModuleSpec::from_path(&exe)).unwrap();
    let identity = read_identity(&exe, None).unwrap();
    assert_eq!(identity.architecture, module.architecture());
    assert_eq!(identity.uuid.as_ref(), module.uuid());
}

#[test]
fn test_shared_cache_loads_executable_once()
{
    let exe = env::current_exe().unwrap();
    let cache = ModuleCache::with_config(CacheConfig::default());
    let spec = ModuleSpec::from_path(&exe);

    let first = cache.get_shared_module(&spec, false);
    assert!(first.error.is_none(), "{:?}", first.error);
    assert!(first.did_create);

    let second = cache.get_shared_module(&spec, false);
    assert!(!second.did_create);
    assert!(same_module(&first.module.unwrap(), &second.module.unwrap()));
}
