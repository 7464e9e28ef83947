//! Whole-rule wildcard pass
//!
//! Runs over the command portion of a rendered sudoers rule, after every path
//! argument went through the per-segment rules. The actor and the
//! `ALL=(ALL) NOPASSWD: SETENV:` header are never rewritten.

use log::trace;

use super::fixpoint;
use crate::types::RULE_TAG;

static_regex!(CASKROOM_VERSION, r"(/Caskroom/[^/\s]+/)[^/\s]+");
static_regex!(SEPARATED_NUMBERS, r"\b\d+[.\-_,()]\d+(?:[.\-_,()]\d+)*\b");
static_regex!(DOTTED_NUMBERS, r"\.\d+(?:[.\-_,]\d+)*");
static_regex!(EIGHT_DIGITS, r"\b\d{8}\b");
static_regex!(YEAR_SUFFIX, r"([A-Za-z._-])\d{4}\b");
static_regex!(MACOSX_SDK, r"macosx\d+");
static_regex!(MACOS_SDK, r"macos\d+");
static_regex!(ARM_ARCH, r"arm\d+");
static_regex!(V_NUMBER, r"\bv\d+\b");
static_regex!(HYPHEN_DOTTED_VERSION, r"-(?:\d+\.)+\d+");
static_regex!(ORDINAL, r"\b\d+(?:st|nd|rd|th)\b");
static_regex!(DIGITS_BEFORE_PUNCT, r"([A-Za-z])\d+([.\-])");
static_regex!(DIGITS_BETWEEN_LETTERS, r"([A-Za-z])\d+([A-Za-z])");
static_regex!(DIGITS_AT_WORD_END, r"([A-Za-z])\d+([^A-Za-z0-9]|$)");
static_regex!(HEX_TOKEN, r"\b[0-9a-fA-F]{8,}\b");
static_regex!(HYPHEN_OPAQUE, r"-([0-9A-Za-z]{5,})");
static_regex!(HYPHEN_STAR_RUN, r"(?:-\*){2,}");
static_regex!(UNDERSCORE_STAR_RUN, r"(?:_\*){2,}");
static_regex!(STAR_RUN, r"\*{2,}");
static_regex!(EMBEDDED_DOTTED_VERSION, r"([A-Za-z])\d+(?:[._]\d+)+");
static_regex!(PARENTHESISED_BUILD, r"\(\d+[\d._]*\)");
static_regex!(CC_HASH_SUFFIX, r"(\.cc)[0-9A-Fa-f*]{8,}");

/// A named transform over the command text of a rendered rule.
pub struct TextRule {
    pub name: &'static str,
    apply: fn(&str) -> String,
}

macro_rules! replace_rule {
    ($name:literal, $regex:ident, $replacement:literal) => {
        TextRule {
            name: $name,
            apply: |text| $regex.replace_all(text, $replacement).into_owned(),
        }
    };
}

/// The whole-rule chain, in application order.
pub static RULE_TEXT_RULES: &[TextRule] = &[
    replace_rule!("caskroom-version", CASKROOM_VERSION, "${1}*"),
    replace_rule!("separated-numbers", SEPARATED_NUMBERS, "*"),
    replace_rule!("dotted-numbers", DOTTED_NUMBERS, ".*"),
    replace_rule!("eight-digit-date", EIGHT_DIGITS, "*"),
    replace_rule!("year-suffix", YEAR_SUFFIX, "${1}*"),
    replace_rule!("macosx-sdk", MACOSX_SDK, "macosx*"),
    replace_rule!("macos-sdk", MACOS_SDK, "macos*"),
    replace_rule!("arm-arch", ARM_ARCH, "arm*"),
    replace_rule!("v-number", V_NUMBER, "v*"),
    replace_rule!("hyphen-dotted-version", HYPHEN_DOTTED_VERSION, "-*"),
    replace_rule!("ordinal", ORDINAL, "*"),
    replace_rule!("digits-before-punctuation", DIGITS_BEFORE_PUNCT, "${1}*${2}"),
    replace_rule!("digits-between-letters", DIGITS_BETWEEN_LETTERS, "${1}*${2}"),
    replace_rule!("digits-at-word-end", DIGITS_AT_WORD_END, "${1}*${2}"),
    TextRule {
        name: "hex-token",
        apply: hex_token,
    },
    TextRule {
        name: "hyphen-opaque-suffix",
        apply: hyphen_opaque_suffix,
    },
    replace_rule!("hyphen-star-run", HYPHEN_STAR_RUN, "-*"),
    replace_rule!("star-run", STAR_RUN, "*"),
    replace_rule!("embedded-dotted-version", EMBEDDED_DOTTED_VERSION, "${1}*"),
    replace_rule!("parenthesised-build", PARENTHESISED_BUILD, "*"),
    replace_rule!("cc-hash-suffix", CC_HASH_SUFFIX, "${1}*"),
    replace_rule!("hyphen-star-run-final", HYPHEN_STAR_RUN, "-*"),
    replace_rule!("underscore-star-run", UNDERSCORE_STAR_RUN, "_*"),
    replace_rule!("star-run-final", STAR_RUN, "*"),
];

/// Generalize the residual variable text in a rendered rule.
///
/// When `rule` carries the sudoers header, only the text after it is
/// rewritten. The result is a fixed point: applying this again returns it
/// unchanged.
pub fn generalize_rule(rule: &str) -> String {
    match rule.find(RULE_TAG) {
        Some(index) => {
            let (header, command) = rule.split_at(index + RULE_TAG.len());
            format!("{header}{}", generalize_text(command))
        }
        None => generalize_text(rule),
    }
}

fn generalize_text(text: &str) -> String {
    fixpoint(text, |current| {
        RULE_TEXT_RULES.iter().fold(current.to_string(), |acc, rule| {
            let next = (rule.apply)(&acc);
            if next != acc {
                trace!("{}: {:?} -> {:?}", rule.name, acc, next);
            }
            next
        })
    })
}

/// Hex-like tokens become `*`, except a bundle name directly before `.app`
fn hex_token(text: &str) -> String {
    HEX_TOKEN
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let end = caps.get(0).map_or(0, |m| m.end());
            if text[end..].starts_with(".app") {
                caps[0].to_string()
            } else {
                "*".to_string()
            }
        })
        .into_owned()
}

/// `-5b3ous`, `-cc24aef4` -> `-*`; plain words such as `-teams` stay
fn hyphen_opaque_suffix(text: &str) -> String {
    HYPHEN_OPAQUE
        .replace_all(text, |caps: &regex::Captures<'_>| {
            if caps[1].chars().any(|c| c.is_ascii_digit()) {
                "-*".to_string()
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}
