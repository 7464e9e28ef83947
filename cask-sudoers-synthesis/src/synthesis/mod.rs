//! Rule synthesis: turning action descriptors and log commands into
//! authorization rules
//!
//! The synthesizer holds no state of its own beyond the run's
//! [`SynthesisContext`] and the [`PathResolver`] used to pick between
//! standard binary locations, so one instance can be shared by every worker.

mod actions;
mod log_commands;

use std::path::Path;

use crate::providers::PathResolver;
use crate::types::AuthorizationRule;

/// Fixed locations of the binaries Homebrew invokes with sudo
pub(crate) mod bin {
    pub const RM: &str = "/bin/rm";
    pub const CP: &str = "/bin/cp";
    pub const RMDIR: &str = "/bin/rmdir";
    pub const TOUCH: &str = "/usr/bin/touch";
    pub const CHOWN: &str = "/usr/sbin/chown";
    pub const INSTALLER: &str = "/usr/sbin/installer";
    pub const PKGUTIL: &str = "/usr/sbin/pkgutil";
    pub const LAUNCHCTL: &str = "/bin/launchctl";
    /// Both toolchains Homebrew may use to run the xattr copy script
    pub const SWIFT: [&str; 2] = [
        "/usr/bin/swift",
        "/Library/Developer/CommandLineTools/usr/bin/swift",
    ];
    /// Directories holding `pkill`, `killall` and `xargs`, preferred first
    pub const USER_BIN_DIRS: [&str; 2] = ["/usr/bin", "/bin"];
    /// Directories holding the kext utilities, preferred first
    pub const SYSTEM_BIN_DIRS: [&str; 2] = ["/usr/sbin", "/sbin"];
}

/// launchd job definition directories
pub(crate) const LAUNCH_DIRS: [&str; 2] = ["/Library/LaunchDaemons", "/Library/LaunchAgents"];

/// Owner and group every ownership fix is allowed to set
pub(crate) const OWNER_GROUP: &str = "*:staff";

/// Sentinel Homebrew touches to test whether a bundle is writable
pub(crate) const WRITE_TEST_FILE: &str = ".homebrew-write-test";

/// Per-run settings the rules depend on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisContext {
    /// User the rules grant access to
    pub actor: String,
    /// `brew --prefix`
    pub brew_prefix: String,
    /// `brew --repository`
    pub brew_repository: String,
}

impl SynthesisContext {
    pub fn new(
        actor: impl Into<String>,
        brew_prefix: impl Into<String>,
        brew_repository: impl Into<String>,
    ) -> Self {
        Self {
            actor: actor.into(),
            brew_prefix: trim_dir(brew_prefix.into()),
            brew_repository: trim_dir(brew_repository.into()),
        }
    }

    pub fn caskroom(&self) -> String {
        format!("{}/Caskroom", self.brew_prefix)
    }

    /// Cache directory of one package, holding one subdirectory per version
    pub fn cask_dir(&self, token: &str) -> String {
        format!("{}/{token}", self.caskroom())
    }

    fn cask_utils(&self) -> String {
        format!("{}/Library/Homebrew/cask/utils", self.brew_repository)
    }

    pub fn copy_xattrs_script(&self) -> String {
        format!("{}/copy-xattrs.swift", self.cask_utils())
    }

    pub fn rmdir_helper(&self) -> String {
        format!("{}/rmdir.sh", self.cask_utils())
    }

    /// Replace the version directory of any Caskroom path with `*`.
    ///
    /// Paths outside the Caskroom, or naming only a package directory, are
    /// returned unchanged.
    pub fn generalize_cache_dir(&self, path: &str) -> String {
        let caskroom = self.caskroom();
        let Some(rest) = path
            .strip_prefix(caskroom.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
        else {
            return path.to_string();
        };
        let mut parts: Vec<&str> = rest.split('/').collect();
        if parts.len() < 2 {
            return path.to_string();
        }
        parts[1] = "*";
        format!("{caskroom}/{}", parts.join("/"))
    }

    pub fn is_cache_path(&self, path: &str) -> bool {
        path.starts_with(&format!("{}/", self.caskroom()))
    }
}

fn trim_dir(dir: String) -> String {
    match dir.trim_end_matches('/') {
        "" => dir,
        trimmed => trimmed.to_string(),
    }
}

/// Maps descriptors and log commands to rules for one run.
pub struct RuleSynthesizer<'a> {
    context: &'a SynthesisContext,
    resolver: &'a dyn PathResolver,
}

impl<'a> RuleSynthesizer<'a> {
    pub fn new(context: &'a SynthesisContext, resolver: &'a dyn PathResolver) -> Self {
        Self { context, resolver }
    }

    pub const fn context(&self) -> &SynthesisContext {
        self.context
    }

    fn rule(&self, command: impl Into<String>) -> AuthorizationRule {
        AuthorizationRule::new(self.context.actor.as_str(), command)
    }

    /// First of `dirs` that holds `name`, else the first directory
    fn binary_in(&self, dirs: &[&str], name: &str) -> String {
        dirs.iter()
            .map(|dir| format!("{dir}/{name}"))
            .find(|candidate| self.resolver.exists(Path::new(candidate)))
            .unwrap_or_else(|| format!("{}/{name}", dirs.first().copied().unwrap_or("/usr/bin")))
    }
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
