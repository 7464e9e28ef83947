//! Rules for commands recovered from operation logs

use log::debug;

use super::{basename, RuleSynthesizer, OWNER_GROUP, WRITE_TEST_FILE};
use crate::artifacts::APPLICATIONS_DIR;
use crate::types::{AuthorizationRule, LogCommandTokens};
use crate::wildcard::{wildcard_app_suffix, wildcard_path, wildcard_pkg_name};

impl RuleSynthesizer<'_> {
    /// Normalize one logged command into zero or more rules.
    ///
    /// Bare command names are resolved to absolute paths first; a command
    /// that cannot be resolved produces no rule.
    pub fn normalize_log_command(&self, tokens: &LogCommandTokens) -> Vec<AuthorizationRule> {
        let Some(command) = self.absolute_command(&tokens.command) else {
            return Vec::new();
        };
        let arguments = tokens.arguments.as_slice();

        match basename(&command) {
            "chown" if !arguments.is_empty() => {
                vec![self.generic_command(&command, &wildcard_owner(arguments))]
            }
            "cp" if arguments.len() >= 2 => vec![self.copy(&command, arguments)],
            "touch" => vec![self.rule(command.as_str()).args([format!(
                "{APPLICATIONS_DIR}/*.app/{WRITE_TEST_FILE}"
            )])],
            "rm" | "rmdir" if !arguments.is_empty() => {
                vec![self.removal(&command, arguments)]
            }
            "installer" if arguments.iter().any(|a| a == "-pkg") => {
                self.installer(&command, arguments)
            }
            _ if self.context.is_cache_path(&command) => vec![self
                .rule(self.context.generalize_cache_dir(&command))
                .args(arguments.iter().cloned())],
            "launchctl" if arguments.len() >= 2 => {
                self.launch_service_with(&command, &[arguments[0].as_str()], &arguments[1])
            }
            _ => vec![self.generic_command(&command, arguments)],
        }
    }

    fn absolute_command(&self, command: &str) -> Option<String> {
        if command.is_empty() || command.contains('`') {
            debug!("Dropping non-command token {command:?}");
            return None;
        }
        if command.starts_with('/') {
            return Some(command.to_string());
        }
        match self.resolver.resolve(command) {
            Some(path) => Some(path.display().to_string()),
            None => {
                debug!("Dropping log command {command:?}: not found on any search path");
                None
            }
        }
    }

    /// Source gets its cache version and bundle suffix generalized; the
    /// destination only its bundle suffix, since it must match exactly.
    fn copy(&self, command: &str, arguments: &[String]) -> AuthorizationRule {
        let (flags, paths) = arguments.split_at(arguments.len() - 2);
        let source = wildcard_app_suffix(&self.context.generalize_cache_dir(&paths[0]));
        let destination = wildcard_app_suffix(&paths[1]);
        self.rule(command)
            .args(flags.iter().cloned())
            .args([source, destination])
    }

    /// Keep the command and flags verbatim, generalize the final path
    fn removal(&self, command: &str, arguments: &[String]) -> AuthorizationRule {
        let (target, flags) = arguments
            .split_last()
            .map_or((None, arguments), |(target, flags)| (Some(target), flags));
        self.rule(command)
            .args(flags.iter().cloned())
            .args(target.map(|target| wildcard_path(target)))
    }

    /// Two variants: `-target*` standing in for the target and verbose
    /// flags, and an explicit `-target /` followed by anything.
    fn installer(&self, command: &str, arguments: &[String]) -> Vec<AuthorizationRule> {
        let mut package = None;
        let mut choices = None;
        let mut other_flags = Vec::new();

        let mut iter = arguments.iter().peekable();
        while let Some(argument) = iter.next() {
            match argument.as_str() {
                "-pkg" => {
                    if let Some(path) = iter.next() {
                        package = Some(self.installer_package(path));
                    }
                }
                "-target" => {
                    iter.next_if(|value| !value.starts_with('-'));
                    while iter.next_if(|flag| flag.starts_with("-verbose")).is_some() {}
                }
                "-applyChoiceChangesXML" => {
                    if let Some(path) = iter.next() {
                        choices = Some(choices_file(path));
                    }
                }
                flag if flag.starts_with("-verbose") => {}
                other => other_flags.push(other.to_string()),
            }
        }

        let Some(package) = package else {
            debug!("Installer invocation without a package path");
            return Vec::new();
        };
        let choices_args: Vec<String> = choices
            .map(|path| vec!["-applyChoiceChangesXML".to_string(), path])
            .unwrap_or_default();

        let collapsed = self
            .rule(command)
            .args(["-pkg".to_string(), package.clone()])
            .args(other_flags.iter().cloned())
            .args(["-target*"])
            .args(choices_args.iter().cloned());
        let explicit = self
            .rule(command)
            .args(["-pkg".to_string(), package])
            .args(other_flags)
            .args(["-target", "/"])
            .args(choices_args)
            .with_trailing_wildcard();
        vec![collapsed, explicit]
    }

    fn installer_package(&self, path: &str) -> String {
        let path = self.context.generalize_cache_dir(path);
        match path.rsplit_once('/') {
            Some((dir, file)) => format!("{dir}/{}", wildcard_pkg_name(file)),
            None => wildcard_pkg_name(&path),
        }
    }
}

/// `<user>:staff` -> `*:staff` for the first owner argument; owners with
/// any other group are kept as logged
fn wildcard_owner(arguments: &[String]) -> Vec<String> {
    let mut replaced = false;
    arguments
        .iter()
        .map(|argument| {
            if replaced || argument.starts_with('-') {
                return argument.clone();
            }
            match argument.split_once(':') {
                Some((_, "staff")) => {
                    replaced = true;
                    OWNER_GROUP.to_string()
                }
                _ => argument.clone(),
            }
        })
        .collect()
}

/// Applied-choices files carry a date and random suffix
fn choices_file(path: &str) -> String {
    let (dir, file) = path.rsplit_once('/').unwrap_or(("", path));
    let generic = if file.starts_with("choices") {
        "choices*.xml"
    } else {
        "*.xml"
    };
    if dir.is_empty() && !path.starts_with('/') {
        generic.to_string()
    } else {
        format!("{dir}/{generic}")
    }
}
