//! Name-level wildcard helpers
//!
//! These know what kind of name they are looking at (an installer package, a
//! script, a receipt, a launchd label, an app bundle) and generalize it before
//! the generic segment chain runs.

use super::{fixpoint, segment::wildcard_path};

static_regex!(PAREN_BUILD, r"\(\d+\)");
static_regex!(PKG_VERSION, r"([_-])\d+(?:[._,]\d+)*");
static_regex!(SCRIPT_VERSION, r"([_-])\d+(?:[._]\d+)*");
static_regex!(V_VERSION, r"v\d+(?:\.\d+)*");
static_regex!(HYPHEN_STARS, r"(?:-_*\*)+");
static_regex!(UNDERSCORE_STARS, r"(?:_\*){2,}");
static_regex!(STAR_RUN, r"\*{2,}");
static_regex!(RECEIPT_TRAILING_DIGITS, r"\d+$");
static_regex!(LABEL_HASH_SUFFIX, r"\.[a-f0-9]{8,}$");
static_regex!(LABEL_VERSION_SUFFIX, r"([.-])v?\d+(?:\.\d+)*$");
static_regex!(LABEL_TRAILING_DIGITS, r"([A-Za-z])\d+$");
static_regex!(APP_SEPARATED_VERSION, r"([\s_-])v?\d+(?:\.\d+)*$");
static_regex!(APP_TRAILING_VERSION, r"^(.*[^\d.])\d+(?:\.\d+)*$");

const APP_EXTENSION: &str = ".app";
const HELPER_MARKER: &str = ".helper";

fn collapse_stars(name: &str) -> String {
    let name = HYPHEN_STARS.replace_all(name, "-*");
    let name = UNDERSCORE_STARS.replace_all(&name, "_*");
    STAR_RUN.replace_all(&name, "*").into_owned()
}

/// `mactex-basictex-20250308.pkg` -> `mactex-basictex-*.pkg`,
/// `Setup(5558).pkg` -> `Setup*.pkg`
pub fn wildcard_pkg_name(pkg: &str) -> String {
    fixpoint(pkg, |name| {
        let name = PAREN_BUILD.replace_all(name, "*");
        let name = PKG_VERSION.replace_all(&name, "${1}*");
        collapse_stars(&name)
    })
}

/// Generalize version runs in the file name of a script path.
///
/// `Anaconda3-2025.06-1-MacOSX-arm64.sh` -> `Anaconda3-*-MacOSX-arm64.sh`.
/// Directory components are left for [`wildcard_path`].
pub fn wildcard_script_name(script: &str) -> String {
    let (dir, file) = match script.rsplit_once('/') {
        Some((dir, file)) => (Some(dir), file),
        None => (None, script),
    };
    let file = fixpoint(file, |name| {
        let name = SCRIPT_VERSION.replace_all(name, "${1}*");
        let name = V_VERSION.replace_all(&name, "v*");
        collapse_stars(&name)
    });
    match dir {
        Some(dir) => format!("{dir}/{file}"),
        None => file,
    }
}

/// `org.tug.mactex.basictex2025` -> `org.tug.mactex.basictex*`
pub fn wildcard_receipt_id(identifier: &str) -> String {
    RECEIPT_TRAILING_DIGITS
        .replace(identifier, "*")
        .into_owned()
}

/// Label variants for a launchd job or process name, literal first.
///
/// Adds a `.helper` generalization, a version/hash generalization of the
/// trailing component, and for reverse-DNS `com.` labels the transient
/// `application.<label>.installer*` job that manual installers spawn.
pub fn service_label_variants(label: &str) -> Vec<String> {
    let mut variants = vec![label.to_string()];

    if let Some((helper_base, _)) = label.split_once(HELPER_MARKER) {
        if !helper_base.is_empty() {
            variants.push(format!("{helper_base}.*"));
        }
    }

    let wild = if LABEL_HASH_SUFFIX.is_match(label) {
        Some(LABEL_HASH_SUFFIX.replace(label, ".*").into_owned())
    } else if LABEL_VERSION_SUFFIX.is_match(label) {
        Some(LABEL_VERSION_SUFFIX.replace(label, "${1}*").into_owned())
    } else if LABEL_TRAILING_DIGITS.is_match(label) {
        Some(LABEL_TRAILING_DIGITS.replace(label, "${1}*").into_owned())
    } else {
        None
    };
    if let Some(wild) = &wild {
        variants.push(wild.clone());
    }

    if label.starts_with("com.") {
        let base = wild.as_deref().unwrap_or(label);
        variants.push(format!("application.{base}.installer*"));
    }

    let mut unique = Vec::with_capacity(variants.len());
    for variant in variants {
        if !unique.contains(&variant) {
            unique.push(variant);
        }
    }
    unique
}

fn wildcard_app_base(segment: &str) -> String {
    match segment.strip_suffix(APP_EXTENSION) {
        Some(base) => {
            let base = APP_SEPARATED_VERSION.replace(base, "${1}*");
            let base = APP_TRAILING_VERSION.replace(&base, "${1}*");
            format!("{base}{APP_EXTENSION}")
        }
        None => segment.to_string(),
    }
}

/// Generalize only the version suffix of `.app` components.
///
/// Used for copy destinations, which must otherwise match exactly.
pub fn wildcard_app_suffix(path: &str) -> String {
    path.split('/')
        .map(wildcard_app_base)
        .collect::<Vec<_>>()
        .join("/")
}

/// Generalize an application path: `.app` version suffixes first, then the
/// per-segment chain on every component.
pub fn wildcard_app_path(path: &str) -> String {
    fixpoint(path, |current| wildcard_path(&wildcard_app_suffix(current)))
}

/// Replace the version directory below `cask_dir` with `*`.
///
/// `cask_dir` is the package's own Caskroom directory and is kept literally;
/// the remainder goes through [`wildcard_app_path`]. Paths outside `cask_dir`
/// are only generalized.
pub fn wildcard_cache_version(path: &str, cask_dir: &str) -> String {
    let cask_dir = cask_dir.trim_end_matches('/');
    let Some(rest) = path
        .strip_prefix(cask_dir)
        .and_then(|rest| rest.strip_prefix('/'))
    else {
        return wildcard_app_path(path);
    };
    match rest.split_once('/') {
        Some((_version, tail)) => format!("{cask_dir}/*/{}", wildcard_app_path(tail)),
        None => format!("{cask_dir}/*"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("mactex-basictex-20250308.pkg", "mactex-basictex-*.pkg")]
    #[case("Setup(5558).pkg", "Setup*.pkg")]
    #[case("Foo_1.2.3_4.pkg", "Foo_*.pkg")]
    #[case("Foo.pkg", "Foo.pkg")]
    fn test_wildcard_pkg_name(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(wildcard_pkg_name(input), expected);
    }

    #[rstest]
    #[case("Anaconda3-2025.06-1-MacOSX-arm64.sh", "Anaconda3-*-MacOSX-arm64.sh")]
    #[case("/opt/x/1.0/uninstall-v2.1.sh", "/opt/x/1.0/uninstall-v*.sh")]
    #[case("tool_v3.sh", "tool_v*.sh")]
    fn test_wildcard_script_name(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(wildcard_script_name(input), expected);
    }

    #[test]
    fn test_wildcard_receipt_id() {
        assert_eq!(
            wildcard_receipt_id("org.tug.mactex.basictex2025"),
            "org.tug.mactex.basictex*"
        );
        assert_eq!(wildcard_receipt_id("com.vendor.pkg"), "com.vendor.pkg");
    }

    #[test]
    fn test_service_label_variants_helper() {
        let variants = service_label_variants("com.vendor.app.helper");
        assert_eq!(variants[0], "com.vendor.app.helper");
        assert!(variants.contains(&"com.vendor.app.*".to_string()));
        assert!(variants.contains(&"application.com.vendor.app.helper.installer*".to_string()));
    }

    #[rstest]
    #[case("com.adobe.AAM.Startup-1.0", "com.adobe.AAM.Startup-*")]
    #[case("com.vendor.agent.v2", "com.vendor.agent.*")]
    #[case("com.vendor.job.3f9a0c1d2e", "com.vendor.job.*")]
    #[case("gifox2", "gifox*")]
    fn test_service_label_variants_wildcard(#[case] label: &str, #[case] wild: &str) {
        let variants = service_label_variants(label);
        assert_eq!(variants[0], label);
        assert_eq!(variants[1], wild);
    }

    #[test]
    fn test_service_label_variants_installer_uses_wildcard() {
        let variants = service_label_variants("com.vendor.agent-2.1");
        assert_eq!(
            variants.last().map(String::as_str),
            Some("application.com.vendor.agent-*.installer*")
        );
    }

    #[test]
    fn test_service_label_variants_plain_label() {
        assert_eq!(service_label_variants("Dropbox"), vec!["Dropbox".to_string()]);
    }

    #[rstest]
    #[case("/Applications/Alfred 5.app", "/Applications/Alfred *.app")]
    #[case("/Applications/SMS Plus v1.3.7.app", "/Applications/SMS Plus *.app")]
    #[case("/Applications/Folx3.app", "/Applications/Folx*.app")]
    #[case("/Applications/Safari.app", "/Applications/Safari.app")]
    #[case("/Applications/2048.app", "/Applications/2048.app")]
    fn test_wildcard_app_path(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(wildcard_app_path(input), expected);
    }

    #[test]
    fn test_wildcard_app_suffix_touches_only_bundle() {
        assert_eq!(
            wildcard_app_suffix("/Applications/Tools 2/Folx 3.app"),
            "/Applications/Tools 2/Folx *.app"
        );
    }

    #[rstest]
    #[case(
        "/opt/homebrew/Caskroom/chatgpt/1.2025.245,1757119478/ChatGPT.app",
        "/opt/homebrew/Caskroom/chatgpt/*/ChatGPT.app"
    )]
    #[case(
        "/opt/homebrew/Caskroom/chatgpt/latest/Helper 2.app",
        "/opt/homebrew/Caskroom/chatgpt/*/Helper *.app"
    )]
    #[case("/opt/homebrew/Caskroom/chatgpt/1.0", "/opt/homebrew/Caskroom/chatgpt/*")]
    #[case("/tmp/Foo 1.2.app", "/tmp/Foo *.app")]
    fn test_wildcard_cache_version(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(
            wildcard_cache_version(input, "/opt/homebrew/Caskroom/chatgpt"),
            expected
        );
    }
}
