//! Executable discovery on the local system

use log::trace;
use std::path::{Path, PathBuf};

use super::PathResolver;

/// Searched after `PATH` when resolving a bare command name
const FALLBACK_DIRS: [&str; 4] = ["/usr/bin", "/bin", "/usr/sbin", "/sbin"];

/// [`PathResolver`] backed by `PATH` and the standard system directories.
#[derive(Debug, Clone, Default)]
pub struct SystemPathResolver {
    fallback_dirs: Vec<PathBuf>,
}

impl SystemPathResolver {
    pub fn new() -> Self {
        Self::with_fallback_dirs(FALLBACK_DIRS.into_iter().map(PathBuf::from))
    }

    pub fn with_fallback_dirs(dirs: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            fallback_dirs: dirs.into_iter().collect(),
        }
    }
}

impl PathResolver for SystemPathResolver {
    fn resolve(&self, name: &str) -> Option<PathBuf> {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
        let found = self
            .fallback_dirs
            .iter()
            .map(|dir| dir.join(name))
            .find(|candidate| is_executable(candidate));
        if found.is_none() {
            trace!("{name} not found on PATH or in {:?}", self.fallback_dirs);
        }
        found
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
