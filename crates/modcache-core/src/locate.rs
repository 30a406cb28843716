//! # Locating Object Files
//!
//! When the requested path cannot be opened as the wanted module, the shared
//! cache asks an [`ObjectLocator`] where else the module might be. The
//! locator answers with a path or nothing; it never fails.
//!
//! [`SearchPathLocator`] is the default. It tries the requested path, then the
//! platform path, then `<dir>/<file name>` for each configured directory,
//! accepting the first candidate whose architecture and build identifier
//! agree with the spec. A spec with only a build identifier makes it scan
//! every regular file in the search directories.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::trace;

use crate::object_module::read_identity;
use crate::spec::ModuleSpec;

/// Finds an executable object file for a spec.
pub trait ObjectLocator: Send + Sync
{
    /// Best-guess path for the module described by `spec`.
    ///
    /// Returning the spec's own file (or `None`) means "nowhere else to look".
    fn locate_executable_object_file(&self, spec: &ModuleSpec) -> Option<PathBuf>;
}

/// Searches a fixed list of directories.
#[derive(Debug, Clone, Default)]
pub struct SearchPathLocator
{
    search_paths: Vec<PathBuf>,
}

impl SearchPathLocator
{
    pub fn new(search_paths: Vec<PathBuf>) -> Self
    {
        Self { search_paths }
    }

    pub fn search_paths(&self) -> &[PathBuf]
    {
        &self.search_paths
    }

    fn candidates(&self, spec: &ModuleSpec) -> Vec<PathBuf>
    {
        let mut candidates: Vec<PathBuf> = spec
            .file()
            .into_iter()
            .chain(spec.platform_file())
            .map(Path::to_path_buf)
            .collect();

        let file_name = spec.file().or(spec.platform_file()).and_then(Path::file_name);
        match file_name {
            Some(name) => {
                candidates.extend(self.search_paths.iter().map(|dir| dir.join(name)));
            }
            None if spec.uuid().is_some() => {
                for dir in &self.search_paths {
                    let Ok(entries) = fs::read_dir(dir) else {
                        continue;
                    };
                    let mut files: Vec<PathBuf> = entries.flatten().map(|entry| entry.path()).collect();
                    files.sort();
                    candidates.extend(files);
                }
            }
            None => {}
        }

        candidates
    }
}

impl ObjectLocator for SearchPathLocator
{
    fn locate_executable_object_file(&self, spec: &ModuleSpec) -> Option<PathBuf>
    {
        let found = self
            .candidates(spec)
            .into_iter()
            .find(|candidate| candidate.is_file() && identity_matches(candidate, spec));

        match found {
            Some(path) => {
                trace!(path = %path.display(), "located object file");
                Some(path)
            }
            None => spec.file().map(Path::to_path_buf),
        }
    }
}

fn identity_matches(path: &Path, spec: &ModuleSpec) -> bool
{
    let Some(identity) = read_identity(path, spec.architecture()) else {
        return false;
    };
    spec.uuid().is_none_or(|uuid| identity.uuid.as_ref() == Some(uuid))
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::types::ModuleUuid;

    #[test]
    fn test_candidate_order()
    {
        let locator = SearchPathLocator::new(vec![PathBuf::from("/opt/a"), PathBuf::from("/opt/b")]);
        let spec = ModuleSpec::from_path("/usr/lib/libz.so").with_platform_file("/device/lib/libz.so");
        assert_eq!(
            locator.candidates(&spec),
            vec![
                PathBuf::from("/usr/lib/libz.so"),
                PathBuf::from("/device/lib/libz.so"),
                PathBuf::from("/opt/a/libz.so"),
                PathBuf::from("/opt/b/libz.so"),
            ]
        );
    }

    #[test]
    fn test_falls_back_to_requested_path()
    {
        let locator = SearchPathLocator::default();
        let spec = ModuleSpec::from_path("/nonexistent/libq.so");
        assert_eq!(
            locator.locate_executable_object_file(&spec),
            Some(PathBuf::from("/nonexistent/libq.so"))
        );
    }

    #[test]
    fn test_uuid_only_spec_locates_nothing_without_matches()
    {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), b"plain text").unwrap();
        let locator = SearchPathLocator::new(vec![dir.path().to_path_buf()]);
        let spec = ModuleSpec::new().with_uuid(ModuleUuid::from_bytes(&[7; 16]).unwrap());
        assert_eq!(locator.locate_executable_object_file(&spec), None);
    }
}
