//! This crate provides the core business logic for cask-sudoers:
//! - Cask metadata flattening and action extraction
//! - The wildcard policy that makes rules survive version bumps
//! - Sudo log line tokenization
//! - Rule synthesis, deduplication and rendering
//!

/// Declare a lazily compiled, hard-coded regular expression.
macro_rules! static_regex {
    ($name:ident, $re:expr) => {
        static $name: std::sync::LazyLock<regex::Regex> =
            std::sync::LazyLock::new(|| regex::Regex::new($re).expect("hard-coded pattern compiles"));
    };
}

mod aggregate;
mod artifacts;
pub mod brace;
pub mod commands;
mod error;
mod output;
mod parsing;
pub mod providers;
mod synthesis;
mod types;
pub mod wildcard;

// Re-exports for a small, focused public API
pub use aggregate::RuleAggregator;
pub use artifacts::{extract_actions, flatten, ArtifactStanza, APPLICATIONS_DIR};
pub use commands::{GenerateRequest, SudoersService, DEFAULT_WORKERS};
pub use error::{SynthesisError, SynthesisResult};
pub use output::{render, write_artifact, ARTIFACT_TITLE};
pub use parsing::{is_noise, parse_log_line, tokenize};
pub use providers::{
    BrewEnvironment, BrewMetadataProvider, MetadataProvider, PathResolver, SystemPathResolver,
};
pub use synthesis::{RuleSynthesizer, SynthesisContext};
pub use types::{
    sudo_escape, ActionDescriptor, AuthorizationRule, CaskMetadata, GenerationReport,
    LogCommandTokens, PackageOutcome, PackageReport, PackageSection, RULE_TAG,
};
