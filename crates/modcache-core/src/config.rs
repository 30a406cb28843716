//! Cache configuration.
//!
//! The shared cache reads two environment variables when it is first built:
//!
//! - `MODCACHE_SEARCH_PATHS`: extra directories the default locator searches,
//!   separated like `PATH` (`:` on Unix, `;` on Windows)
//! - `MODCACHE_DISABLE_LOCATE`: when set to `1`/`true`/`yes`, skip the
//!   external locator and only ever try the requested path

use std::env;
use std::ffi::OsStr;
use std::path::PathBuf;

/// Environment variable holding extra search directories.
pub const SEARCH_PATHS_ENV: &str = "MODCACHE_SEARCH_PATHS";

/// Environment variable that disables external location.
pub const DISABLE_LOCATE_ENV: &str = "MODCACHE_DISABLE_LOCATE";

/// Settings for a [`crate::cache::ModuleCache`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig
{
    /// Directories searched, in order, when the requested path does not hold
    /// the wanted module.
    pub search_paths: Vec<PathBuf>,
    /// Whether to consult the locator at all after direct construction fails.
    pub locate_externally: bool,
}

impl Default for CacheConfig
{
    fn default() -> Self
    {
        Self {
            search_paths: Vec::new(),
            locate_externally: true,
        }
    }
}

impl CacheConfig
{
    /// Read the configuration from the process environment.
    pub fn from_env() -> Self
    {
        Self::from_vars(env::var_os(SEARCH_PATHS_ENV).as_deref(), env::var(DISABLE_LOCATE_ENV).ok().as_deref())
    }

    /// Build a configuration from raw variable values.
    ///
    /// ```rust
    /// use modcache_core::config::CacheConfig;
    ///
    /// let config = CacheConfig::from_vars(None, Some("1"));
    /// assert!(!config.locate_externally);
    /// assert!(config.search_paths.is_empty());
    /// ```
    pub fn from_vars(search_paths: Option<&OsStr>, disable_locate: Option<&str>) -> Self
    {
        let search_paths = search_paths
            .map(|value| env::split_paths(value).filter(|path| !path.as_os_str().is_empty()).collect())
            .unwrap_or_default();
        let locate_externally = !disable_locate.is_some_and(|value| {
            matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
        });

        Self {
            search_paths,
            locate_externally,
        }
    }

    /// Append a search directory.
    #[must_use]
    pub fn with_search_path(mut self, path: impl Into<PathBuf>) -> Self
    {
        self.search_paths.push(path.into());
        self
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_default_locates_externally()
    {
        let config = CacheConfig::default();
        assert!(config.locate_externally);
        assert!(config.search_paths.is_empty());
    }

    #[test]
    fn test_search_paths_are_split()
    {
        let joined = env::join_paths(["/opt/symbols", "/srv/cache"]).unwrap();
        let config = CacheConfig::from_vars(Some(&joined), None);
        assert_eq!(
            config.search_paths,
            vec![PathBuf::from("/opt/symbols"), PathBuf::from("/srv/cache")]
        );
    }

    #[test]
    fn test_disable_locate_values()
    {
        assert!(!CacheConfig::from_vars(None, Some("true")).locate_externally);
        assert!(!CacheConfig::from_vars(None, Some(" YES ")).locate_externally);
        assert!(CacheConfig::from_vars(None, Some("0")).locate_externally);
        assert!(CacheConfig::from_vars(None, None).locate_externally);
    }
}
