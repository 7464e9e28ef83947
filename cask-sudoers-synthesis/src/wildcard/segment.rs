//! Per-segment wildcard rules
//!
//! Each rule sees one `/`-delimited path segment. Rules run in declaration
//! order and the whole chain repeats until the segment is stable.

use log::trace;

use super::fixpoint;

static_regex!(TEAM_ID, r"^[A-Z0-9]{8,12}$");
static_regex!(VERSION_SEGMENT, r"^[.,_-]*\d[\d.,_-]*$");
static_regex!(SEPARATED_VERSION, r"([\s_-])\d+(?:[.,]\d+)*");
static_regex!(TRAILING_DIGITS, r"([A-Za-z])\d+(?:[.,]\d+)*$");
static_regex!(EMBEDDED_DIGITS, r"([A-Za-z])\d+([A-Za-z])");
static_regex!(V_VERSION, r"v\d+(?:\.\d+)*");
static_regex!(STAR_RUN, r"\*{2,}");
static_regex!(OPAQUE_TOKEN, r"^[A-Z0-9*]+$");
static_regex!(NUMERIC_ONLY, r"^[\d.,]+$");

/// Minimum length of an uppercase token, stars removed, that collapses to `*`
const OPAQUE_TOKEN_MIN_LEN: usize = 6;

/// A named transform over a single path segment.
///
/// `apply` receives the segment as rewritten so far and the segment as it was
/// when the chain started.
pub struct SegmentRule {
    pub name: &'static str,
    apply: fn(&str, &str) -> String,
}

/// The per-segment chain, in application order.
pub static SEGMENT_RULES: &[SegmentRule] = &[
    SegmentRule {
        name: "team-identifier",
        apply: team_identifier,
    },
    SegmentRule {
        name: "version-segment",
        apply: version_segment,
    },
    SegmentRule {
        name: "separated-version-suffix",
        apply: separated_version_suffix,
    },
    SegmentRule {
        name: "trailing-digits",
        apply: trailing_digits,
    },
    SegmentRule {
        name: "extension-base",
        apply: extension_base,
    },
    SegmentRule {
        name: "v-prefixed-version",
        apply: v_prefixed_version,
    },
    SegmentRule {
        name: "star-collapse",
        apply: star_collapse,
    },
];

/// Generalize every segment of `path`, keeping separators in place.
pub fn wildcard_path(path: &str) -> String {
    path.split('/')
        .map(wildcard_segment)
        .collect::<Vec<_>>()
        .join("/")
}

/// Generalize a single path segment.
///
/// Empty, `~`, `.` and `..` segments pass through untouched.
pub fn wildcard_segment(segment: &str) -> String {
    if segment.is_empty() || matches!(segment, "~" | "." | "..") {
        return segment.to_string();
    }
    fixpoint(segment, apply_chain)
}

fn apply_chain(original: &str) -> String {
    let mut current = original.to_string();
    for rule in SEGMENT_RULES {
        let next = (rule.apply)(&current, original);
        if next != current {
            trace!("{}: {:?} -> {:?}", rule.name, current, next);
            current = next;
        }
    }
    current
}

/// Developer team IDs: 8–12 uppercase alphanumerics, possibly already starred
fn team_identifier(segment: &str, _original: &str) -> String {
    if TEAM_ID.is_match(segment.trim_start_matches('*')) {
        "*".to_string()
    } else {
        segment.to_string()
    }
}

/// Directories such as `13.6.3,24585314_0521`
fn version_segment(segment: &str, _original: &str) -> String {
    if VERSION_SEGMENT.is_match(segment) {
        "*".to_string()
    } else {
        segment.to_string()
    }
}

/// `Folx 3` -> `Folx *`, `Startup-1.0.plist` -> `Startup-*.plist`
fn separated_version_suffix(segment: &str, _original: &str) -> String {
    SEPARATED_VERSION.replace_all(segment, "${1}*").into_owned()
}

/// `macgpg2` -> `macgpg*`, `Folx3Plugin` -> `Folx*Plugin`
fn trailing_digits(segment: &str, _original: &str) -> String {
    let trimmed = TRAILING_DIGITS.replace(segment, "${1}*");
    fixpoint(&trimmed, |s| {
        EMBEDDED_DIGITS.replace_all(s, "${1}*${2}").into_owned()
    })
}

/// `com.techsmith.camtasia25.sfl` -> `com.techsmith.camtasia*.sfl`
fn extension_base(segment: &str, _original: &str) -> String {
    if NUMERIC_ONLY.is_match(segment) {
        return segment.to_string();
    }
    match segment.rsplit_once('.') {
        Some((base, extension)) if !base.is_empty() => {
            format!("{}.{}", TRAILING_DIGITS.replace(base, "${1}*"), extension)
        }
        _ => segment.to_string(),
    }
}

fn v_prefixed_version(segment: &str, _original: &str) -> String {
    V_VERSION.replace_all(segment, "v*").into_owned()
}

/// Collapse star runs, then collapse long opaque tokens that were partially
/// starred by earlier rules (`7SFX*GNR7` -> `*`). A dotted tail is kept
/// (`86Z*GCJ*MF.com.noodlesoft.HazelHelper.plist` ->
/// `*.com.noodlesoft.HazelHelper.plist`) unless the tail is a bare `app`.
fn star_collapse(segment: &str, original: &str) -> String {
    let collapsed = STAR_RUN.replace_all(segment, "*").into_owned();
    if !collapsed.contains('*') {
        return collapsed;
    }
    if let Some((prefix, tail)) = collapsed.split_once('.') {
        if !tail.eq_ignore_ascii_case("app") && is_opaque(prefix, prefix) {
            return format!("*.{tail}");
        }
        return collapsed;
    }
    if is_opaque(&collapsed, original) {
        "*".to_string()
    } else {
        collapsed
    }
}

fn is_opaque(candidate: &str, source: &str) -> bool {
    let clean: String = source.chars().filter(|c| *c != '*').collect();
    clean.len() >= OPAQUE_TOKEN_MIN_LEN
        && clean
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        && OPAQUE_TOKEN.is_match(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case("13.6.3,24585314_0521", "*")]
    #[case("1.2.3,456", "*")]
    #[case("RR9LPM2N7K", "*")]
    #[case("*RR9LPM2N", "*")]
    #[case("Folx 3", "Folx *")]
    #[case("macgpg2", "macgpg*")]
    #[case("Folx3Plugin", "Folx*Plugin")]
    #[case("com.techsmith.camtasia25.sfl", "com.techsmith.camtasia*.sfl")]
    #[case("v1.3.7", "v*")]
    #[case("com.adobe.AAM.Startup-1.0.plist", "com.adobe.AAM.Startup-*.plist")]
    #[case(
        "86ZXGCJ3MF.com.noodlesoft.HazelHelper.plist",
        "*.com.noodlesoft.HazelHelper.plist"
    )]
    #[case("ABC1DEF", "*")]
    #[case("Alfred 5.app", "Alfred *.app")]
    fn test_wildcard_segment(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(wildcard_segment(input), expected);
    }

    #[rstest]
    #[case("Safari.app")]
    #[case("115Browser.app")]
    #[case("Application Support")]
    #[case("LaunchDaemons")]
    #[case("~")]
    #[case("..")]
    fn test_wildcard_segment_leaves_stable_names(#[case] input: &str) {
        assert_eq!(wildcard_segment(input), input);
    }

    #[test]
    fn test_app_bundle_never_collapses_to_bare_wildcard() {
        for bundle in ["ABC1DEF.app", "ABCDEFGH.app", "2048.app", "A1B2C3D4.app"] {
            let result = wildcard_segment(bundle);
            assert_ne!(result, "*", "{bundle} collapsed to *");
            assert_ne!(result, "*.app", "{bundle} collapsed to *.app");
            assert!(result.ends_with(".app"));
        }
    }

    #[test]
    fn test_wildcard_path_cache_version_directory() {
        assert_eq!(
            wildcard_path("/opt/homebrew/Caskroom/foo/1.2.3,456/Foo.app"),
            "/opt/homebrew/Caskroom/foo/*/Foo.app"
        );
    }

    #[test]
    fn test_wildcard_path_keeps_home_relative_prefix() {
        assert_eq!(
            wildcard_path("~/Library/Application Support/Folx 3"),
            "~/Library/Application Support/Folx *"
        );
    }

    #[test]
    fn test_rule_names_are_unique() {
        let mut names: Vec<_> = SEGMENT_RULES.iter().map(|r| r.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), SEGMENT_RULES.len());
    }

    proptest! {
        #[test]
        fn wildcard_path_is_idempotent(path in "(/[A-Za-z0-9 ._,*-]{1,16}){1,5}") {
            let once = wildcard_path(&path);
            prop_assert_eq!(wildcard_path(&once), once);
        }

        #[test]
        fn app_segments_keep_their_extension(base in "[A-Za-z0-9 _-]{1,12}") {
            let bundle = format!("{base}.app");
            let result = wildcard_segment(&bundle);
            prop_assert!(result.ends_with(".app"));
            prop_assert_ne!(result, "*.app");
        }
    }
}
