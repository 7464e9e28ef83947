//! Resolution of settings that clap cannot express directly

use log::{debug, warn};
use std::path::{Path, PathBuf};

use cask_sudoers_synthesis::DEFAULT_WORKERS;

pub const DEFAULT_OUTPUT: &str = "./homebrew-cask.nopasswd.sudoers";
pub const DEFAULT_INSTALL_LOG: &str = "homebrew-cask.nopasswd.log";
pub const DEFAULT_STATE_FILE: &str = "reinstall_casks_state.json";

const SUDOERS_EXTENSION: &str = ".sudoers";

/// Worker count from `--threads`/`THREADS`.
///
/// Unparsable values fall back to the default; anything below one means one.
pub fn worker_count(raw: Option<&str>) -> usize {
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return DEFAULT_WORKERS;
    };
    match raw.parse::<i64>() {
        Ok(n) if n < 1 => 1,
        Ok(n) => usize::try_from(n).unwrap_or(DEFAULT_WORKERS),
        Err(_) => {
            warn!("Ignoring invalid thread count {raw:?}, using {DEFAULT_WORKERS}");
            DEFAULT_WORKERS
        }
    }
}

/// Tokens from a whitespace separated list, empty entries dropped
pub fn split_tokens<S: AsRef<str>>(values: &[S]) -> Vec<String> {
    values
        .iter()
        .flat_map(|value| value.as_ref().split_whitespace())
        .map(str::to_string)
        .collect()
}

/// Log sources for a run.
///
/// An explicit `:` separated list is used as given, missing files included,
/// so the scan can warn about them. Otherwise the log next to `output` is
/// used when it exists.
pub fn log_sources(explicit: Option<&str>, output: &Path) -> Vec<PathBuf> {
    if let Some(explicit) = explicit {
        return explicit
            .split(':')
            .map(str::trim)
            .filter(|path| !path.is_empty())
            .map(PathBuf::from)
            .collect();
    }
    let default = default_log_path(output);
    if default.exists() {
        debug!("Using default log {}", default.display());
        vec![default]
    } else {
        Vec::new()
    }
}

/// `<output stem>.log` next to `output`
pub fn default_log_path(output: &Path) -> PathBuf {
    let output = output.to_string_lossy();
    let base = output.strip_suffix(SUDOERS_EXTENSION).unwrap_or(&output);
    PathBuf::from(format!("{base}.log"))
}

/// First non-empty candidate, in priority order
pub fn first_set<I>(candidates: I) -> Option<String>
where
    I: IntoIterator<Item = Option<String>>,
{
    candidates
        .into_iter()
        .flatten()
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}
