//! Typed action extraction from flattened artifact stanzas

use serde_json::{Map, Value};

use super::flatten::{ensure_list, ArtifactStanza};
use crate::types::ActionDescriptor;

static_regex!(APPDIR_PATH, r"^(?:\$APPDIR|#\{appdir\})/([^/]+)");

/// Default install location for app bundles
pub const APPLICATIONS_DIR: &str = "/Applications";

/// Script directives under `uninstall` that may run with elevated privileges
const UNINSTALL_SCRIPT_KEYS: [&str; 2] = ["script", "early_script"];

#[derive(Default)]
struct Collected {
    apps: Vec<(String, Option<String>)>,
    pkgs: Vec<String>,
    installer_scripts: Vec<ActionDescriptor>,
    manuals: Vec<String>,
    pkgutil: Vec<String>,
    launchctl: Vec<String>,
    uninstall_scripts: Vec<ActionDescriptor>,
    delete: Vec<String>,
    trash: Vec<String>,
    rmdir: Vec<String>,
    set_ownership: Vec<String>,
    kexts: Vec<String>,
    signals: Vec<(String, String)>,
    quit: Vec<String>,
}

/// Turn stanzas into descriptors.
///
/// Descriptors come out grouped by kind in a fixed order: apps, packages,
/// installer scripts, manual installers, receipts, launchd jobs, uninstall
/// scripts, deletions, directory removals, ownership fixes, kernel
/// extensions, signals and quits. Entries with an unexpected shape are
/// skipped.
pub fn extract_actions(stanzas: &[ArtifactStanza]) -> Vec<ActionDescriptor> {
    let mut collected = Collected::default();
    for stanza in stanzas {
        if let Some(entries) = stanza.get("app") {
            collect_apps(entries, &mut collected.apps);
        }
        if let Some(entries) = stanza.get("pkg") {
            collected.pkgs.extend(strings(entries));
        }
        if let Some(entries) = stanza.get("installer") {
            for installer in dicts(entries) {
                if let Some(script) = privileged_script(installer.get("script")) {
                    collected.installer_scripts.push(script);
                }
                if let Some(manual) = installer.get("manual").and_then(Value::as_str) {
                    collected.manuals.push(manual.to_string());
                }
            }
        }
        if let Some(entries) = stanza.get("uninstall") {
            for directive in dicts(entries) {
                collect_uninstall(directive, &mut collected);
            }
        }
        if let Some(entries) = stanza.get("zap") {
            for directive in dicts(entries) {
                collect_removals(directive, &mut collected);
            }
        }
    }
    collected.into_actions()
}

impl Collected {
    fn into_actions(self) -> Vec<ActionDescriptor> {
        let override_dir = destination_override(self.delete.iter().chain(&self.trash));
        let mut actions = Vec::new();

        for (source, target) in self.apps {
            let destination = app_destination(&source, target.as_deref(), override_dir.as_deref());
            actions.push(ActionDescriptor::InstallApp {
                source,
                destination,
            });
        }
        actions.extend(
            self.pkgs
                .into_iter()
                .map(|package| ActionDescriptor::InstallPackage { package }),
        );
        actions.extend(self.installer_scripts);
        actions.extend(
            self.manuals
                .into_iter()
                .map(|bundle| ActionDescriptor::ManualInstaller { bundle }),
        );
        actions.extend(
            self.pkgutil
                .into_iter()
                .map(|identifier| ActionDescriptor::ForgetReceipt { identifier }),
        );
        actions.extend(
            self.launchctl
                .into_iter()
                .map(|label| ActionDescriptor::LaunchServiceOp { label }),
        );
        actions.extend(self.uninstall_scripts);
        actions.extend(
            self.delete
                .into_iter()
                .chain(self.trash)
                .map(|path| ActionDescriptor::DeletePath { path }),
        );
        actions.extend(
            self.rmdir
                .into_iter()
                .map(|path| ActionDescriptor::RemoveDirectory { path }),
        );
        actions.extend(
            self.set_ownership
                .into_iter()
                .map(|path| ActionDescriptor::SetOwnership { path }),
        );
        actions.extend(
            self.kexts
                .into_iter()
                .map(|identifier| ActionDescriptor::UnloadKernelExtension { identifier }),
        );
        actions.extend(
            self.signals
                .into_iter()
                .map(|(signal, process)| ActionDescriptor::SendSignal { signal, process }),
        );
        actions.extend(
            self.quit
                .into_iter()
                .map(|process| ActionDescriptor::QuitProcess { process }),
        );
        actions
    }
}

fn strings(entries: &[Value]) -> impl Iterator<Item = String> + '_ {
    entries
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
}

/// Objects in `entries`, looking one level into nested lists
fn dicts(entries: &[Value]) -> impl Iterator<Item = &Map<String, Value>> {
    entries.iter().flat_map(|entry| match entry {
        Value::Object(map) => vec![map],
        Value::Array(items) => items.iter().filter_map(Value::as_object).collect(),
        _ => Vec::new(),
    })
}

fn directive_strings(directive: &Map<String, Value>, key: &str) -> Vec<String> {
    directive
        .get(key)
        .map(|value| strings(&ensure_list(value)).collect())
        .unwrap_or_default()
}

/// `app` entries: a bundle name, an object with a source and/or target, or
/// a bundle name followed by a `{target}` object that applies to it
fn collect_apps(entries: &[Value], apps: &mut Vec<(String, Option<String>)>) {
    let mut iter = entries.iter().peekable();
    while let Some(entry) = iter.next() {
        match entry {
            Value::String(source) => {
                let target = iter
                    .peek()
                    .and_then(|next| next.as_object())
                    .filter(|options| app_source(options).is_none())
                    .and_then(|options| options.get("target"))
                    .and_then(Value::as_str)
                    .map(str::to_string);
                if target.is_some() {
                    iter.next();
                }
                apps.push((source.clone(), target));
            }
            Value::Object(options) => {
                let target = options.get("target").and_then(Value::as_str);
                let source = app_source(options).or_else(|| target.map(basename));
                if let Some(source) = source.filter(|s| !s.is_empty()) {
                    apps.push((source.to_string(), target.map(str::to_string)));
                }
            }
            _ => {}
        }
    }
}

fn app_source(options: &Map<String, Value>) -> Option<&str> {
    ["path", "source", "app"]
        .iter()
        .find_map(|key| options.get(*key).and_then(Value::as_str))
        .filter(|s| !s.is_empty())
}

fn basename(path: &str) -> &str {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(path)
}

/// A `script` object flagged `sudo: true`
fn privileged_script(script: Option<&Value>) -> Option<ActionDescriptor> {
    let script = script?.as_object()?;
    if !script.get("sudo").and_then(Value::as_bool).unwrap_or(false) {
        return None;
    }
    let executable = script.get("executable")?.as_str()?.to_string();
    let arguments = directive_strings(script, "args");
    Some(ActionDescriptor::RunInstallerScript {
        executable,
        arguments,
    })
}

fn collect_uninstall(directive: &Map<String, Value>, collected: &mut Collected) {
    collected
        .pkgutil
        .extend(directive_strings(directive, "pkgutil"));
    collected
        .launchctl
        .extend(directive_strings(directive, "launchctl"));
    collect_removals(directive, collected);
    collected.kexts.extend(directive_strings(directive, "kext"));
    for key in UNINSTALL_SCRIPT_KEYS {
        if let Some(script) = privileged_script(directive.get(key)) {
            collected.uninstall_scripts.push(script);
        }
    }
    collected
        .set_ownership
        .extend(directive_strings(directive, "set_ownership"));
    if let Some(signals) = directive.get("signal") {
        collected.signals.extend(signal_pairs(signals));
    }
    collected.quit.extend(directive_strings(directive, "quit"));
}

/// `delete`, `trash` and `rmdir`, shared by `uninstall` and `zap`
fn collect_removals(directive: &Map<String, Value>, collected: &mut Collected) {
    collected.delete.extend(directive_strings(directive, "delete"));
    collected.rmdir.extend(directive_strings(directive, "rmdir"));
    collected.trash.extend(directive_strings(directive, "trash"));
}

/// `[["TERM", "proc"], ...]` or a single bare `["TERM", "proc"]`
fn signal_pairs(value: &Value) -> Vec<(String, String)> {
    fn pair(item: &Value) -> Option<(String, String)> {
        match item.as_array()?.as_slice() {
            [Value::String(signal), Value::String(process)] => {
                Some((signal.clone(), process.clone()))
            }
            _ => None,
        }
    }
    if let Some(single) = pair(value) {
        return vec![single];
    }
    value
        .as_array()
        .map(|items| items.iter().filter_map(pair).collect())
        .unwrap_or_default()
}

/// `$APPDIR/<dir>` or `#{appdir}/<dir>` in a removal path names the install
/// directory the cask really uses
fn destination_override<'a>(paths: impl Iterator<Item = &'a String>) -> Option<String> {
    paths
        .filter_map(|path| APPDIR_PATH.captures(path))
        .map(|caps| format!("{APPLICATIONS_DIR}/{}", &caps[1]))
        .next()
}

fn app_destination(source: &str, target: Option<&str>, override_dir: Option<&str>) -> String {
    match (target, override_dir) {
        (Some(target), _) if target.starts_with('/') => target.to_string(),
        (Some(target), _) => format!("{APPLICATIONS_DIR}/{target}"),
        (None, Some(dir)) if dir.to_ascii_lowercase().ends_with(".app") => dir.to_string(),
        (None, Some(dir)) => format!("{dir}/{}", basename(source)),
        (None, None) => format!("{APPLICATIONS_DIR}/{}", basename(source)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::flatten;
    use serde_json::json;

    fn actions(artifacts: Value) -> Vec<ActionDescriptor> {
        extract_actions(&flatten(&artifacts))
    }

    #[test]
    fn test_plain_app() {
        assert_eq!(
            actions(json!([{"app": ["Thing.app"]}])),
            vec![ActionDescriptor::InstallApp {
                source: "Thing.app".to_string(),
                destination: "/Applications/Thing.app".to_string(),
            }]
        );
    }

    #[test]
    fn test_app_with_target_object() {
        let result = actions(json!([{"app": ["Foo.app", {"target": "Tools/Bar.app"}]}]));
        assert_eq!(
            result,
            vec![ActionDescriptor::InstallApp {
                source: "Foo.app".to_string(),
                destination: "/Applications/Tools/Bar.app".to_string(),
            }]
        );
    }

    #[test]
    fn test_app_destination_from_appdir_removal() {
        let result = actions(json!([
            {"app": ["Suite/Editor.app"]},
            {"uninstall": [{"delete": "$APPDIR/Vendor Suite"}]},
        ]));
        assert_eq!(
            result[0],
            ActionDescriptor::InstallApp {
                source: "Suite/Editor.app".to_string(),
                destination: "/Applications/Vendor Suite/Editor.app".to_string(),
            }
        );
    }

    #[test]
    fn test_app_destination_override_to_bundle() {
        let result = actions(json!([
            {"app": ["Editor.app"]},
            {"zap": [{"trash": "#{appdir}/Editor Pro.app"}]},
        ]));
        assert!(matches!(
            &result[0],
            ActionDescriptor::InstallApp { destination, .. } if destination == "/Applications/Editor Pro.app"
        ));
    }

    #[test]
    fn test_installer_scripts_require_sudo() {
        let result = actions(json!([
            {"installer": [
                {"script": {"executable": "install.sh", "args": ["-b"], "sudo": true}},
                {"script": {"executable": "user.sh"}},
                {"manual": "Setup.app"},
            ]},
        ]));
        assert_eq!(
            result,
            vec![
                ActionDescriptor::RunInstallerScript {
                    executable: "install.sh".to_string(),
                    arguments: vec!["-b".to_string()],
                },
                ActionDescriptor::ManualInstaller {
                    bundle: "Setup.app".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_uninstall_directives_in_order() {
        let result = actions(json!([
            {"uninstall": [{
                "quit": "com.vendor.app",
                "signal": [["TERM", "Vendor"], ["KILL", "VendorHelper"]],
                "kext": "com.vendor.driver",
                "set_ownership": "/Library/Vendor",
                "rmdir": "/Library/Vendor",
                "delete": ["/Library/Vendor/a"],
                "early_script": {"executable": "/usr/local/bin/vendor-stop", "sudo": true},
                "launchctl": "com.vendor.agent",
                "pkgutil": "com.vendor.pkg",
            }]},
            {"pkg": ["Vendor.pkg"]},
        ]));
        let kinds: Vec<_> = result
            .iter()
            .map(|action| match action {
                ActionDescriptor::InstallPackage { .. } => "pkg",
                ActionDescriptor::ForgetReceipt { .. } => "pkgutil",
                ActionDescriptor::LaunchServiceOp { .. } => "launchctl",
                ActionDescriptor::RunInstallerScript { .. } => "script",
                ActionDescriptor::DeletePath { .. } => "delete",
                ActionDescriptor::RemoveDirectory { .. } => "rmdir",
                ActionDescriptor::SetOwnership { .. } => "set_ownership",
                ActionDescriptor::UnloadKernelExtension { .. } => "kext",
                ActionDescriptor::SendSignal { .. } => "signal",
                ActionDescriptor::QuitProcess { .. } => "quit",
                _ => "other",
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                "pkg",
                "pkgutil",
                "launchctl",
                "script",
                "delete",
                "rmdir",
                "set_ownership",
                "kext",
                "signal",
                "signal",
                "quit",
            ]
        );
    }

    #[test]
    fn test_single_bare_signal_pair() {
        let result = actions(json!([{"uninstall": [{"signal": ["TERM", "Vendor"]}]}]));
        assert_eq!(
            result,
            vec![ActionDescriptor::SendSignal {
                signal: "TERM".to_string(),
                process: "Vendor".to_string(),
            }]
        );
    }

    #[test]
    fn test_zap_contributes_only_removals() {
        let result = actions(json!([{"zap": [{
            "trash": ["~/Library/Caches/com.vendor"],
            "rmdir": "~/Library/Vendor",
            "launchctl": "ignored.in.zap",
        }]}]));
        assert_eq!(result.len(), 2);
        assert!(result
            .iter()
            .all(|a| !matches!(a, ActionDescriptor::LaunchServiceOp { .. })));
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        assert!(actions(json!([{"app": [42, null]}, {"uninstall": ["bogus"]}])).is_empty());
    }
}
