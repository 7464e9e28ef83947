//! Rules for descriptors declared in package metadata

use log::debug;

use super::{bin, RuleSynthesizer, LAUNCH_DIRS, OWNER_GROUP, WRITE_TEST_FILE};
use crate::brace::expand;
use crate::types::{ActionDescriptor, AuthorizationRule};
use crate::wildcard::{
    service_label_variants, wildcard_app_path, wildcard_cache_version, wildcard_path,
    wildcard_pkg_name, wildcard_receipt_id, wildcard_script_name,
};

/// Architecture triple passed to swift when running the xattr copy script
const SWIFT_TARGET: &str = "arm64-apple-macosx*";

impl RuleSynthesizer<'_> {
    /// Rules for one descriptor of package `token`.
    pub fn synthesize(&self, token: &str, descriptor: &ActionDescriptor) -> Vec<AuthorizationRule> {
        let cask_dir = self.context.cask_dir(token);
        match descriptor {
            ActionDescriptor::InstallApp {
                source,
                destination,
            } => self.install_app(&cask_dir, source, destination),
            ActionDescriptor::InstallPackage { package } => {
                let package = wildcard_cache_version(
                    &format!("{cask_dir}/*/{}", wildcard_pkg_name(package)),
                    &cask_dir,
                );
                vec![self
                    .rule(bin::INSTALLER)
                    .args(["-pkg", package.as_str(), "-target", "*"])]
            }
            ActionDescriptor::RunInstallerScript {
                executable,
                arguments,
            } => {
                let executable = if executable.starts_with('/') {
                    executable.clone()
                } else {
                    format!("{cask_dir}/*/{executable}")
                };
                let executable =
                    wildcard_cache_version(&wildcard_script_name(&executable), &cask_dir);
                vec![self
                    .rule(executable)
                    .args(arguments.iter().cloned())
                    .with_trailing_wildcard()]
            }
            ActionDescriptor::ManualInstaller { bundle } => {
                let stem = bundle
                    .rsplit('/')
                    .next()
                    .map(|name| name.strip_suffix(".app").unwrap_or(name))
                    .unwrap_or(bundle.as_str());
                let executable = wildcard_cache_version(
                    &format!("{cask_dir}/*/{bundle}/Contents/MacOS/{stem}*"),
                    &cask_dir,
                );
                vec![self.rule(executable).with_trailing_wildcard()]
            }
            ActionDescriptor::ForgetReceipt { identifier } => vec![self
                .rule(bin::PKGUTIL)
                .args(["--forget".to_string(), wildcard_receipt_id(identifier)])],
            ActionDescriptor::LaunchServiceOp { label } => self.launch_service(label),
            ActionDescriptor::DeletePath { path } => expand(path)
                .iter()
                .flat_map(|path| {
                    let path = wildcard_path(path);
                    [
                        self.rule(bin::RM).args(["-r", "-f", "--", path.as_str()]),
                        self.rule(bin::RM).args(["-f", "--", path.as_str()]),
                    ]
                })
                .collect(),
            ActionDescriptor::RemoveDirectory { path } => expand(path)
                .iter()
                .map(|path| {
                    self.rule(bin::RMDIR)
                        .args(["--".to_string(), wildcard_path(path)])
                })
                .collect(),
            ActionDescriptor::SetOwnership { path } => vec![self.rule(bin::CHOWN).args([
                "-R".to_string(),
                "--".to_string(),
                OWNER_GROUP.to_string(),
                wildcard_path(path),
            ])],
            ActionDescriptor::UnloadKernelExtension { identifier } => {
                let kext = |name: &str| self.rule(self.binary_in(&bin::SYSTEM_BIN_DIRS, name));
                vec![
                    kext("kextstat").args(["-l", "-b", identifier.as_str()]),
                    kext("kextunload").args(["-b", identifier.as_str()]),
                    kext("kextload").args(["-b", identifier.as_str()]),
                    kext("kextfind").args(["-b", identifier.as_str()]),
                ]
            }
            ActionDescriptor::SendSignal { signal, process } => {
                let pkill = self.binary_in(&bin::USER_BIN_DIRS, "pkill");
                let killall = self.binary_in(&bin::USER_BIN_DIRS, "killall");
                let flag = format!("-{signal}");
                service_label_variants(process)
                    .into_iter()
                    .flat_map(|variant| {
                        [
                            self.rule(pkill.as_str())
                                .args([flag.as_str(), "-x", variant.as_str()]),
                            self.rule(killall.as_str())
                                .args([flag.as_str(), variant.as_str()]),
                        ]
                    })
                    .collect()
            }
            ActionDescriptor::QuitProcess { process } => {
                let killall = self.binary_in(&bin::USER_BIN_DIRS, "killall");
                service_label_variants(process)
                    .into_iter()
                    .flat_map(|variant| {
                        std::iter::once(self.rule(killall.as_str()).args([variant.as_str()]))
                            .chain(self.plist_removals(&variant))
                    })
                    .collect()
            }
            ActionDescriptor::GenericCommand { command, arguments } => {
                vec![self.generic_command(command, arguments)]
            }
        }
    }

    /// Rules for every descriptor of a package, in descriptor order.
    ///
    /// Packages that install or forget receipts also get the batch cleanup
    /// Homebrew runs through `xargs` when removing receipt contents.
    pub fn package_rules(&self, token: &str, actions: &[ActionDescriptor]) -> Vec<AuthorizationRule> {
        let mut rules: Vec<_> = actions
            .iter()
            .flat_map(|action| self.synthesize(token, action))
            .collect();
        if actions.iter().any(|action| {
            matches!(
                action,
                ActionDescriptor::InstallPackage { .. } | ActionDescriptor::ForgetReceipt { .. }
            )
        }) {
            rules.extend(self.receipt_cleanup());
        }
        debug!(
            "{token}: {} descriptors produced {} rules",
            actions.len(),
            rules.len()
        );
        rules
    }

    fn install_app(&self, cask_dir: &str, source: &str, destination: &str) -> Vec<AuthorizationRule> {
        let source = wildcard_cache_version(&format!("{cask_dir}/*/{source}"), cask_dir);
        let destination = wildcard_app_path(destination);
        let contents = |path: &str| format!("{path}/Contents");
        let sentinel = format!("{destination}/{WRITE_TEST_FILE}");
        let xattrs = self.context.copy_xattrs_script();

        let mut rules = vec![
            self.rule(bin::RM).args(["-R", "-f", "--", destination.as_str()]),
            self.rule(bin::RM)
                .args(["-R".to_string(), "-f".to_string(), "--".to_string(), contents(&destination)]),
            self.rule(bin::TOUCH).args([sentinel.as_str()]),
            self.rule(bin::RM).args([sentinel.as_str()]),
            self.rule(bin::RM).args(["-f", "--", sentinel.as_str()]),
            self.rule(bin::CP)
                .args(["-pR", source.as_str(), destination.as_str()]),
            self.rule(bin::CP)
                .args(["-pR".to_string(), contents(&source), destination.clone()]),
        ];
        rules.extend(bin::SWIFT.iter().map(|swift| {
            self.rule(*swift).args([
                "-target",
                SWIFT_TARGET,
                xattrs.as_str(),
                source.as_str(),
                destination.as_str(),
            ])
        }));
        rules.push(
            self.rule(bin::CHOWN)
                .args(["-R", "--", OWNER_GROUP, destination.as_str()]),
        );
        rules
    }

    /// `list` and `remove` for every label variant, plus its job definitions
    pub(super) fn launch_service(&self, label: &str) -> Vec<AuthorizationRule> {
        self.launch_service_with(bin::LAUNCHCTL, &["list", "remove"], label)
    }

    pub(super) fn launch_service_with(
        &self,
        launchctl: &str,
        actions: &[&str],
        label: &str,
    ) -> Vec<AuthorizationRule> {
        service_label_variants(label)
            .into_iter()
            .flat_map(|variant| {
                actions
                    .iter()
                    .map(|action| self.rule(launchctl).args([*action, variant.as_str()]))
                    .collect::<Vec<_>>()
                    .into_iter()
                    .chain(self.plist_removals(&variant))
            })
            .collect()
    }

    fn plist_removals(&self, label: &str) -> Vec<AuthorizationRule> {
        LAUNCH_DIRS
            .iter()
            .map(|dir| {
                self.rule(bin::RM).args([
                    "-f".to_string(),
                    "--".to_string(),
                    wildcard_path(&format!("{dir}/{label}.plist")),
                ])
            })
            .collect()
    }

    fn receipt_cleanup(&self) -> Vec<AuthorizationRule> {
        let xargs = self.binary_in(&bin::USER_BIN_DIRS, "xargs");
        let rmdir_helper = self.context.rmdir_helper();
        vec![
            self.rule(xargs.as_str()).args(["-0", "--", bin::RM, "--"]),
            self.rule(xargs.as_str())
                .args(["-0", "--", bin::RM, "-r", "-f", "--"]),
            self.rule(xargs.as_str())
                .args(["-0", "--", rmdir_helper.as_str()]),
        ]
    }

    /// Fallback for commands with no dedicated normalization: absolute path
    /// arguments are generalized, everything else is kept.
    pub(super) fn generic_command(&self, command: &str, arguments: &[String]) -> AuthorizationRule {
        self.rule(command).args(arguments.iter().map(|argument| {
            if argument.starts_with('/') {
                wildcard_path(argument)
            } else {
                argument.clone()
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{context, FakeResolver};
    use super::*;

    fn render(rules: &[AuthorizationRule]) -> Vec<String> {
        rules.iter().map(ToString::to_string).collect()
    }

    const HEAD: &str = "alice ALL=(ALL) NOPASSWD: SETENV: ";

    #[test]
    fn test_install_app_rules() {
        let context = context();
        let resolver = FakeResolver::default();
        let synthesizer = RuleSynthesizer::new(&context, &resolver);
        let rules = render(&synthesizer.synthesize(
            "thing",
            &ActionDescriptor::InstallApp {
                source: "Thing 2.app".to_string(),
                destination: "/Applications/Thing 2.app".to_string(),
            },
        ));
        assert_eq!(
            rules,
            vec![
                format!(r"{HEAD}/bin/rm -R -f -- /Applications/Thing\ *.app"),
                format!(r"{HEAD}/bin/rm -R -f -- /Applications/Thing\ *.app/Contents"),
                format!(r"{HEAD}/usr/bin/touch /Applications/Thing\ *.app/.homebrew-write-test"),
                format!(r"{HEAD}/bin/rm /Applications/Thing\ *.app/.homebrew-write-test"),
                format!(r"{HEAD}/bin/rm -f -- /Applications/Thing\ *.app/.homebrew-write-test"),
                format!(r"{HEAD}/bin/cp -pR /opt/homebrew/Caskroom/thing/*/Thing\ *.app /Applications/Thing\ *.app"),
                format!(r"{HEAD}/bin/cp -pR /opt/homebrew/Caskroom/thing/*/Thing\ *.app/Contents /Applications/Thing\ *.app"),
                format!(r"{HEAD}/usr/bin/swift -target arm64-apple-macosx* /opt/homebrew/Library/Homebrew/cask/utils/copy-xattrs.swift /opt/homebrew/Caskroom/thing/*/Thing\ *.app /Applications/Thing\ *.app"),
                format!(r"{HEAD}/Library/Developer/CommandLineTools/usr/bin/swift -target arm64-apple-macosx* /opt/homebrew/Library/Homebrew/cask/utils/copy-xattrs.swift /opt/homebrew/Caskroom/thing/*/Thing\ *.app /Applications/Thing\ *.app"),
                format!(r"{HEAD}/usr/sbin/chown -R -- *\:staff /Applications/Thing\ *.app"),
            ]
        );
    }

    #[test]
    fn test_install_package_and_receipt_cleanup() {
        let context = context();
        let resolver = FakeResolver::default().with_existing("/usr/bin/xargs");
        let synthesizer = RuleSynthesizer::new(&context, &resolver);
        let rules = render(&synthesizer.package_rules(
            "mactex",
            &[
                ActionDescriptor::InstallPackage {
                    package: "mactex-20250308.pkg".to_string(),
                },
                ActionDescriptor::ForgetReceipt {
                    identifier: "org.tug.mactex.basictex2025".to_string(),
                },
            ],
        ));
        assert_eq!(
            rules,
            vec![
                format!("{HEAD}/usr/sbin/installer -pkg /opt/homebrew/Caskroom/mactex/*/mactex-*.pkg -target *"),
                format!("{HEAD}/usr/sbin/pkgutil --forget org.tug.mactex.basictex*"),
                format!("{HEAD}/usr/bin/xargs -0 -- /bin/rm --"),
                format!("{HEAD}/usr/bin/xargs -0 -- /bin/rm -r -f --"),
                format!("{HEAD}/usr/bin/xargs -0 -- /opt/homebrew/Library/Homebrew/cask/utils/rmdir.sh"),
            ]
        );
    }

    #[test]
    fn test_app_only_package_has_no_receipt_cleanup() {
        let context = context();
        let resolver = FakeResolver::default();
        let synthesizer = RuleSynthesizer::new(&context, &resolver);
        let rules = render(&synthesizer.package_rules(
            "thing",
            &[ActionDescriptor::InstallApp {
                source: "Thing.app".to_string(),
                destination: "/Applications/Thing.app".to_string(),
            }],
        ));
        assert!(rules.iter().all(|rule| !rule.contains("xargs")));
    }

    #[test]
    fn test_relative_installer_script_is_rooted_in_cache() {
        let context = context();
        let resolver = FakeResolver::default();
        let synthesizer = RuleSynthesizer::new(&context, &resolver);
        let rules = render(&synthesizer.synthesize(
            "anaconda",
            &ActionDescriptor::RunInstallerScript {
                executable: "Anaconda3-2025.06-1-MacOSX-arm64.sh".to_string(),
                arguments: vec!["-b".to_string(), "-p".to_string(), "/opt/anaconda3".to_string()],
            },
        ));
        assert_eq!(
            rules,
            vec![format!(
                "{HEAD}/opt/homebrew/Caskroom/anaconda/*/Anaconda3-*-MacOSX-arm*.sh -b -p /opt/anaconda3 *"
            )]
        );
    }

    #[test]
    fn test_manual_installer() {
        let context = context();
        let resolver = FakeResolver::default();
        let synthesizer = RuleSynthesizer::new(&context, &resolver);
        let rules = render(&synthesizer.synthesize(
            "vendor",
            &ActionDescriptor::ManualInstaller {
                bundle: "Vendor Installer.app".to_string(),
            },
        ));
        assert_eq!(
            rules,
            vec![format!(
                r"{HEAD}/opt/homebrew/Caskroom/vendor/*/Vendor\ Installer.app/Contents/MacOS/Vendor\ Installer* *"
            )]
        );
    }

    #[test]
    fn test_launch_service_variants_and_plists() {
        let context = context();
        let resolver = FakeResolver::default();
        let synthesizer = RuleSynthesizer::new(&context, &resolver);
        let rules = render(&synthesizer.synthesize(
            "vendor",
            &ActionDescriptor::LaunchServiceOp {
                label: "com.vendor.app.helper".to_string(),
            },
        ));
        assert!(rules.contains(&format!("{HEAD}/bin/launchctl list com.vendor.app.helper")));
        assert!(rules.contains(&format!("{HEAD}/bin/launchctl remove com.vendor.app.*")));
        assert!(rules.contains(&format!(
            "{HEAD}/bin/rm -f -- /Library/LaunchAgents/com.vendor.app.helper.plist"
        )));
        assert!(rules.contains(&format!(
            "{HEAD}/bin/launchctl list application.com.vendor.app.helper.installer*"
        )));
        // three variants, each with two launchctl actions and two plists
        assert_eq!(rules.len(), 12);
    }

    #[test]
    fn test_rmdir_expands_braces() {
        let context = context();
        let resolver = FakeResolver::default();
        let synthesizer = RuleSynthesizer::new(&context, &resolver);
        let rules = render(&synthesizer.synthesize(
            "adobe",
            &ActionDescriptor::RemoveDirectory {
                path: "/Library/Application Support/Adobe{/CEP{/extensions,},}".to_string(),
            },
        ));
        assert_eq!(
            rules,
            vec![
                format!(r"{HEAD}/bin/rmdir -- /Library/Application\ Support/Adobe/CEP/extensions"),
                format!(r"{HEAD}/bin/rmdir -- /Library/Application\ Support/Adobe/CEP"),
                format!(r"{HEAD}/bin/rmdir -- /Library/Application\ Support/Adobe"),
            ]
        );
    }

    #[test]
    fn test_delete_path_emits_two_removals() {
        let context = context();
        let resolver = FakeResolver::default();
        let synthesizer = RuleSynthesizer::new(&context, &resolver);
        let rules = render(&synthesizer.synthesize(
            "folx",
            &ActionDescriptor::DeletePath {
                path: "~/Library/Application Support/Folx 3".to_string(),
            },
        ));
        assert_eq!(
            rules,
            vec![
                format!(r"{HEAD}/bin/rm -r -f -- ~/Library/Application\ Support/Folx\ *"),
                format!(r"{HEAD}/bin/rm -f -- ~/Library/Application\ Support/Folx\ *"),
            ]
        );
    }

    #[test]
    fn test_kext_utilities_use_existing_directory() {
        let context = context();
        let resolver = FakeResolver::default()
            .with_existing("/sbin/kextunload")
            .with_existing("/usr/sbin/kextstat");
        let synthesizer = RuleSynthesizer::new(&context, &resolver);
        let rules = render(&synthesizer.synthesize(
            "driver",
            &ActionDescriptor::UnloadKernelExtension {
                identifier: "com.vendor.driver".to_string(),
            },
        ));
        assert_eq!(
            rules,
            vec![
                format!("{HEAD}/usr/sbin/kextstat -l -b com.vendor.driver"),
                format!("{HEAD}/sbin/kextunload -b com.vendor.driver"),
                format!("{HEAD}/usr/sbin/kextload -b com.vendor.driver"),
                format!("{HEAD}/usr/sbin/kextfind -b com.vendor.driver"),
            ]
        );
    }

    #[test]
    fn test_signal_and_quit() {
        let context = context();
        let resolver = FakeResolver::default().with_existing("/bin/pkill");
        let synthesizer = RuleSynthesizer::new(&context, &resolver);
        let signal = render(&synthesizer.synthesize(
            "vendor",
            &ActionDescriptor::SendSignal {
                signal: "TERM".to_string(),
                process: "Vendor".to_string(),
            },
        ));
        assert_eq!(
            signal,
            vec![
                format!("{HEAD}/bin/pkill -TERM -x Vendor"),
                format!("{HEAD}/usr/bin/killall -TERM Vendor"),
            ]
        );

        let quit = render(&synthesizer.synthesize(
            "vendor",
            &ActionDescriptor::QuitProcess {
                process: "com.vendor.app".to_string(),
            },
        ));
        assert_eq!(quit[0], format!("{HEAD}/usr/bin/killall com.vendor.app"));
        assert!(quit.contains(&format!(
            "{HEAD}/bin/rm -f -- /Library/LaunchDaemons/com.vendor.app.plist"
        )));
        assert!(quit.contains(&format!(
            "{HEAD}/usr/bin/killall application.com.vendor.app.installer*"
        )));
    }

    #[test]
    fn test_set_ownership() {
        let context = context();
        let resolver = FakeResolver::default();
        let synthesizer = RuleSynthesizer::new(&context, &resolver);
        let rules = render(&synthesizer.synthesize(
            "vendor",
            &ActionDescriptor::SetOwnership {
                path: "/Library/Vendor".to_string(),
            },
        ));
        assert_eq!(rules, vec![format!(r"{HEAD}/usr/sbin/chown -R -- *\:staff /Library/Vendor")]);
    }
}
