use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use modcache_core::types::{FunctionNameType, SectionAddress, SymbolContext, SymbolContextScope};
use modcache_core::{Architecture, CacheConfig, Module, ModuleCache, ModuleList, ModuleSpec, ModuleUuid, Result};
use modcache_utils::{info, init_logging, init_logging_to_file, LoggingGuard};

/// Load binary images through a shared module cache and query them.
#[derive(Parser, Debug)]
#[command(name = "modcache")]
#[command(version)]
#[command(about = "Load binary images through a shared module cache and query them", long_about = None)]
struct Cli
{
    #[command(subcommand)]
    command: Commands,
    /// Extra directory to search when a requested file does not match (repeatable)
    #[arg(long = "search-path", global = true)]
    search_paths: Vec<PathBuf>,
    /// Write logs to ~/.modcache/ instead of stderr
    #[arg(long, global = true, default_value_t = false)]
    log_to_file: bool,
}

#[derive(Subcommand, Debug)]
enum Commands
{
    /// Load one or more images and print the resulting module list
    Load
    {
        /// Paths of the images to load
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Architecture to select (x86_64, arm64, ...)
        #[arg(long)]
        arch: Option<Architecture>,
        /// UUID or build ID the image must carry
        #[arg(long)]
        uuid: Option<ModuleUuid>,
        /// Load a fresh copy even if the cache already holds one
        #[arg(long, default_value_t = false)]
        always_create: bool,
    },
    /// Find functions by name across the given images
    FindFunction
    {
        /// Function name (full or base name)
        name: String,
        /// Images to search (repeatable)
        #[arg(short, long = "module", required = true)]
        modules: Vec<PathBuf>,
    },
    /// Resolve a file address to its module, function and source line
    Resolve
    {
        /// File address (hex format: 0x1000 or decimal)
        #[arg(value_parser = parse_address)]
        address: u64,
        /// Images to search (repeatable)
        #[arg(short, long = "module", required = true)]
        modules: Vec<PathBuf>,
    },
}

fn main()
{
    let cli = Cli::parse();

    let _guard = match start_logging(cli.log_to_file) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = run_command(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn start_logging(to_file: bool) -> std::result::Result<LoggingGuard, modcache_utils::LoggingError>
{
    if to_file {
        let (path, guard) = init_logging_to_file(None)?;
        eprintln!("Logging to {}", path.display());
        Ok(guard)
    } else {
        init_logging()
    }
}

fn run_command(cli: Cli) -> Result<()>
{
    let config = cli
        .search_paths
        .iter()
        .fold(CacheConfig::from_env(), |config, path| config.with_search_path(path));
    let cache = ModuleCache::with_config(config);
    info!(
        "Search paths: {:?} (external lookup: {})",
        cache.config().search_paths,
        cache.config().locate_externally
    );
    // Modules the current invocation uses, like a target's image list
    let target = ModuleList::new();

    match cli.command {
        Commands::Load {
            paths,
            arch,
            uuid,
            always_create,
        } => {
            for path in paths {
                let mut spec = ModuleSpec::from_path(&path);
                if let Some(arch) = arch {
                    spec = spec.with_architecture(arch);
                }
                if let Some(uuid) = &uuid {
                    spec = spec.with_uuid(uuid.clone());
                }

                let (module, old_module, did_create) = cache.get_shared_module(&spec, always_create).into_result()?;
                info!("Loaded {} (created: {})", module.file_spec().display(), did_create);
                if let Some(old) = old_module {
                    println!("Replaced stale module for {}", old.file_spec().display());
                }
                print_module_info(&*module);
                target.append_if_needed(module);
            }
            cache.module_list().log_uuid_and_paths("shared: ");
            println!("\nShared modules:");
            print_list(cache.module_list());
            Ok(())
        }
        Commands::FindFunction { name, modules } => {
            load_all(&cache, &target, &modules)?;
            let mut sc_list = Vec::new();
            let found = target.find_functions(&name, FunctionNameType::AUTO, true, true, false, &mut sc_list);
            println!("{} match(es) for '{}'", found, name);
            for sc in &sc_list {
                print_symbol_context(sc);
            }
            Ok(())
        }
        Commands::Resolve { address, modules } => {
            load_all(&cache, &target, &modules)?;
            let section_address = target
                .resolve_file_address(address)
                .unwrap_or_else(|| SectionAddress::unresolved(address));
            let mut sc = SymbolContext::default();
            let resolved =
                target.resolve_symbol_context_for_address(&section_address, SymbolContextScope::EVERYTHING, &mut sc);
            if resolved.is_empty() {
                println!("0x{:x}: not found in any module", address);
            } else {
                if let Some(section) = &section_address.section {
                    println!("Section: {}", section);
                }
                print_symbol_context(&sc);
            }
            Ok(())
        }
    }
}

fn load_all(cache: &ModuleCache, target: &ModuleList, paths: &[PathBuf]) -> Result<()>
{
    for path in paths {
        let (module, _, _) = cache.get_shared_module(&ModuleSpec::from_path(path), false).into_result()?;
        target.append_if_needed(module);
    }
    Ok(())
}

fn print_module_info(module: &dyn Module)
{
    println!("\nModule Information:");
    println!("  Path: {}", module.file_spec().display());
    println!("  Architecture: {}", module.architecture());
    match module.uuid() {
        Some(uuid) => println!("  UUID: {}", uuid),
        None => println!("  UUID: <none>"),
    }
    println!("  Object File: {}", module.has_object_file());
}

fn print_symbol_context(sc: &SymbolContext)
{
    let module = sc
        .module
        .as_ref()
        .map(|module| module.file_spec().display().to_string())
        .unwrap_or_default();
    let name = sc
        .function
        .as_ref()
        .or(sc.symbol.as_ref().map(|symbol| &symbol.name))
        .map(ToString::to_string)
        .unwrap_or_else(|| "<unknown>".to_string());
    let address = sc.address.map(|address| address.to_string()).unwrap_or_default();

    print!("  {} {} [{}]", address, name, module);
    if let Some(line) = &sc.line_entry {
        print!(" at {}", line.file);
        if let Some(number) = line.line {
            print!(":{}", number);
        }
    }
    println!();
}

fn print_list(list: &ModuleList)
{
    let mut out = String::new();
    // Writing to a String cannot fail
    let _ = list.dump(&mut out);
    print!("{}", out);
}

fn parse_address(value: &str) -> std::result::Result<u64, String>
{
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|e| format!("invalid address '{}': {}", value, e))
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_parse_address()
    {
        assert_eq!(parse_address("0x1000"), Ok(0x1000));
        assert_eq!(parse_address("4096"), Ok(4096));
        assert!(parse_address("0xzz").is_err());
    }

    #[test]
    fn test_cli_parses_load()
    {
        let cli = Cli::parse_from(["modcache", "load", "/bin/ls", "--arch", "arm64", "--search-path", "/opt/lib"]);
        assert_eq!(cli.search_paths, vec![PathBuf::from("/opt/lib")]);
        match cli.command {
            Commands::Load { paths, arch, .. } => {
                assert_eq!(paths, vec![PathBuf::from("/bin/ls")]);
                assert_eq!(arch, Some(Architecture::Arm64));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
