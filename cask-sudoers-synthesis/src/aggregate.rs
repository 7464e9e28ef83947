//! Generalization and first-seen deduplication of rendered rules

use std::collections::HashSet;

use crate::types::AuthorizationRule;
use crate::wildcard::generalize_rule;

/// Ordered, duplicate-free collection of generalized rules.
///
/// Every rule passes through [`generalize_rule`] before the duplicate check,
/// so two concrete rules that differ only in version text collapse into one.
#[derive(Debug, Clone, Default)]
pub struct RuleAggregator {
    seen: HashSet<String>,
    ordered: Vec<String>,
}

impl RuleAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generalize and record `rule`; returns `false` if it was already present.
    pub fn push(&mut self, rule: &AuthorizationRule) -> bool {
        self.push_rendered(&rule.to_string())
    }

    /// Like [`push`](Self::push) for a rule that is already rendered.
    pub fn push_rendered(&mut self, rendered: &str) -> bool {
        let generalized = generalize_rule(rendered);
        if self.seen.contains(&generalized) {
            return false;
        }
        self.seen.insert(generalized.clone());
        self.ordered.push(generalized);
        true
    }

    pub fn extend<'r>(&mut self, rules: impl IntoIterator<Item = &'r AuthorizationRule>) {
        for rule in rules {
            self.push(rule);
        }
    }

    /// Whether an already generalized rule is present
    pub fn contains(&self, generalized: &str) -> bool {
        self.seen.contains(generalized)
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    pub fn into_rules(self) -> Vec<String> {
        self.ordered
    }
}
