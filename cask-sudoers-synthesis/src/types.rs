//! Core data types shared across the synthesis pipeline

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Marker that separates the fixed rule header from the command text
pub const RULE_TAG: &str = "NOPASSWD: SETENV: ";

/// A privileged action a package declares (or a log line reveals).
///
/// Descriptors are built once per artifact entry and consumed once by the
/// synthesizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionDescriptor {
    /// Copy an `.app` bundle from the cache into its install location
    InstallApp { source: String, destination: String },
    /// Run the system installer on a flat package
    InstallPackage { package: String },
    /// Run a script with elevated privileges (installer or uninstall)
    RunInstallerScript {
        executable: String,
        arguments: Vec<String>,
    },
    /// Launch a vendor-supplied installer bundle
    ManualInstaller { bundle: String },
    ForgetReceipt { identifier: String },
    /// Stop and remove a launchd job
    LaunchServiceOp { label: String },
    /// `delete` and `trash` directives, possibly containing brace sets
    DeletePath { path: String },
    RemoveDirectory { path: String },
    SetOwnership { path: String },
    UnloadKernelExtension { identifier: String },
    SendSignal { signal: String, process: String },
    QuitProcess { process: String },
    /// A tokenized log command with no dedicated normalization
    GenericCommand {
        command: String,
        arguments: Vec<String>,
    },
}

/// Command and arguments recovered from one log line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogCommandTokens {
    pub command: String,
    pub arguments: Vec<String>,
}

/// One NOPASSWD grant, rendered by [`fmt::Display`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRule {
    pub actor: String,
    pub command: String,
    pub arguments: Vec<String>,
    /// Append an unescaped `*` so trailing arguments may vary
    pub trailing_wildcard: bool,
}

impl AuthorizationRule {
    pub fn new(actor: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            command: command.into(),
            arguments: Vec::new(),
            trailing_wildcard: false,
        }
    }

    #[must_use]
    pub fn args<I, S>(mut self, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments.extend(arguments.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub const fn with_trailing_wildcard(mut self) -> Self {
        self.trailing_wildcard = true;
        self
    }
}

impl fmt::Display for AuthorizationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ALL=(ALL) {RULE_TAG}{}",
            self.actor,
            sudo_escape(&self.command)
        )?;
        for argument in &self.arguments {
            write!(f, " {}", sudo_escape(argument))?;
        }
        if self.trailing_wildcard {
            write!(f, " *")?;
        }
        Ok(())
    }
}

/// Escape an argument for a sudoers command spec: backslashes are doubled,
/// spaces and colons get a backslash.
pub fn sudo_escape(argument: &str) -> String {
    let mut escaped = String::with_capacity(argument.len());
    for c in argument.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            ' ' => escaped.push_str("\\ "),
            ':' => escaped.push_str("\\:"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// The parts of a cask document the pipeline reads.
///
/// `name` and `artifacts` stay untyped: their shape varies between casks and
/// is normalized by the artifact flattener.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaskMetadata {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub name: Value,
    #[serde(default)]
    pub artifacts: Value,
}

impl CaskMetadata {
    /// First entry of `name`, else the token.
    pub fn display_name(&self, token: &str) -> String {
        let first = match &self.name {
            Value::Array(names) => names.first().and_then(Value::as_str),
            Value::String(name) => Some(name.as_str()),
            _ => None,
        };
        first
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(token)
            .to_string()
    }
}

/// Result of synthesizing one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageOutcome {
    /// Metadata was fetched; `rules` holds the package's rules in emission order
    Rules { display_name: String, rules: Vec<String> },
    /// Metadata could not be retrieved from any source
    FetchFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageReport {
    pub token: String,
    pub outcome: PackageOutcome,
}

/// One package section of the final artifact, after global deduplication
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageSection {
    Rules {
        token: String,
        display_name: String,
        /// Rules not already emitted by an earlier section
        rules: Vec<String>,
        /// The package produced rules, but all of them were emitted earlier
        all_covered: bool,
    },
    FetchFailed { token: String },
}

/// Everything the renderer needs to write the artifact.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GenerationReport {
    pub actor: String,
    pub sections: Vec<PackageSection>,
    /// Log-derived rules not already present in any package section
    pub log_rules: Vec<String>,
}

impl GenerationReport {
    /// Every rule in output order.
    pub fn rules(&self) -> impl Iterator<Item = &str> {
        self.sections
            .iter()
            .flat_map(|section| match section {
                PackageSection::Rules { rules, .. } => rules.as_slice(),
                PackageSection::FetchFailed { .. } => &[],
            })
            .chain(self.log_rules.iter())
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rule_rendering_escapes_arguments() {
        let rule = AuthorizationRule::new("alice", "/bin/rm")
            .args(["-f", "--", "/Library/Application Support/Foo:Bar"]);
        assert_eq!(
            rule.to_string(),
            r"alice ALL=(ALL) NOPASSWD: SETENV: /bin/rm -f -- /Library/Application\ Support/Foo\:Bar"
        );
    }

    #[test]
    fn test_rule_rendering_trailing_wildcard_is_unescaped() {
        let rule = AuthorizationRule::new("bob", "/usr/sbin/installer")
            .args(["-pkg", "/tmp/a b.pkg"])
            .with_trailing_wildcard();
        assert!(rule.to_string().ends_with(r"/tmp/a\ b.pkg *"));
    }

    #[test]
    fn test_sudo_escape_doubles_backslashes() {
        assert_eq!(sudo_escape(r"a\b"), r"a\\b");
    }

    #[test]
    fn test_display_name_falls_back_to_token() {
        let meta = CaskMetadata {
            name: json!(["Firefox", "Mozilla Firefox"]),
            ..CaskMetadata::default()
        };
        assert_eq!(meta.display_name("firefox"), "Firefox");
        assert_eq!(CaskMetadata::default().display_name("firefox"), "firefox");
    }

    #[test]
    fn test_report_rules_iterates_sections_then_log() {
        let report = GenerationReport {
            actor: "alice".to_string(),
            sections: vec![
                PackageSection::FetchFailed {
                    token: "a".to_string(),
                },
                PackageSection::Rules {
                    token: "b".to_string(),
                    display_name: "B".to_string(),
                    rules: vec!["r1".to_string()],
                    all_covered: false,
                },
            ],
            log_rules: vec!["r2".to_string()],
        };
        assert_eq!(report.rules().collect::<Vec<_>>(), vec!["r1", "r2"]);
    }
}
