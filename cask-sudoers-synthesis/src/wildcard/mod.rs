//! Wildcard policy: generalizing variable substrings into stable patterns
//!
//! Version numbers, build identifiers, signing team IDs and hashes change on
//! every release. The policy is an ordered list of named, pure string
//! transforms in two passes:
//!
//! - a per-segment pass ([`segment`]) that runs on each `/`-delimited path
//!   segment, so path separators bound how much a single rule may swallow
//! - a whole-rule pass ([`rule_text`]) over a rendered rule, catching the
//!   residual variable text the segment pass cannot see
//!
//! Both passes are iterated until nothing changes, so every public function in
//! this module is idempotent. Every rewrite shrinks the text or removes a
//! digit, which bounds the iteration.
//!
//! The heuristics are deliberately broad (for example, any 8–12 character
//! uppercase token collapses to `*`). They are a best-effort policy, not a
//! verified security guarantee: a generalized rule can authorize paths the
//! package never touched.

pub mod names;
pub mod rule_text;
pub mod segment;

pub use names::{
    service_label_variants, wildcard_app_path, wildcard_app_suffix, wildcard_cache_version,
    wildcard_pkg_name, wildcard_receipt_id, wildcard_script_name,
};
pub use rule_text::generalize_rule;
pub use segment::{wildcard_path, wildcard_segment};

/// Apply `step` until the output stops changing.
pub(crate) fn fixpoint(input: &str, step: impl Fn(&str) -> String) -> String {
    let mut current = input.to_string();
    loop {
        let next = step(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}
