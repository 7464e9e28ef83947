//! Rule generation for a set of packages and operation logs

use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use std::path::PathBuf;

use crate::aggregate::RuleAggregator;
use crate::artifacts::{extract_actions, flatten};
use crate::error::SynthesisError;
use crate::parsing::parse_log_line;
use crate::synthesis::RuleSynthesizer;
use crate::types::{GenerationReport, PackageOutcome, PackageReport, PackageSection};

/// Concurrent metadata fetches when the caller does not choose
pub const DEFAULT_WORKERS: usize = 32;

/// Inputs of one generation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    /// Package tokens, in output order
    pub tokens: Vec<String>,
    /// Operation logs to scan after the packages
    pub log_sources: Vec<PathBuf>,
    /// Upper bound on concurrent metadata fetches; values below 1 mean 1
    pub workers: usize,
}

impl Default for GenerateRequest {
    fn default() -> Self {
        Self {
            tokens: Vec::new(),
            log_sources: Vec::new(),
            workers: DEFAULT_WORKERS,
        }
    }
}

impl super::service::SudoersService {
    /// Synthesize the rules for every requested package and log source.
    ///
    /// Packages are processed concurrently; sections keep the request order.
    /// A rule appears once, in the first section that produced it, and log
    /// rules already granted by a package section are omitted.
    pub async fn generate(&self, request: &GenerateRequest) -> GenerationReport {
        if request.tokens.is_empty() && request.log_sources.is_empty() {
            warn!("No packages selected and no log sources given; the output will contain no rules");
        }

        let reports = self
            .synthesize_packages(&request.tokens, request.workers)
            .await;

        let mut emitted = RuleAggregator::new();
        let sections: Vec<PackageSection> = reports
            .into_iter()
            .map(|report| into_section(report, &mut emitted))
            .collect();

        let log_rules: Vec<String> = self
            .scan_logs(&request.log_sources)
            .await
            .into_iter()
            .filter(|rule| emitted.push_rendered(rule))
            .collect();

        info!(
            "Generated {} package sections and {} additional log rules",
            sections.len(),
            log_rules.len()
        );
        GenerationReport {
            actor: self.context.actor.clone(),
            sections,
            log_rules,
        }
    }

    /// Fetch and synthesize each package with at most `workers` in flight.
    ///
    /// Results are returned in `tokens` order; workers share nothing mutable.
    pub async fn synthesize_packages(&self, tokens: &[String], workers: usize) -> Vec<PackageReport> {
        let synthesizer = RuleSynthesizer::new(&self.context, self.resolver.as_ref());
        let synthesizer = &synthesizer;
        stream::iter(tokens)
            .map(|token| async move { self.synthesize_package(synthesizer, token).await })
            .buffered(workers.max(1))
            .collect()
            .await
    }

    async fn synthesize_package(
        &self,
        synthesizer: &RuleSynthesizer<'_>,
        token: &str,
    ) -> PackageReport {
        let Some(metadata) = self.provider.fetch(token).await else {
            warn!("{token}: failed to fetch metadata");
            return PackageReport {
                token: token.to_string(),
                outcome: PackageOutcome::FetchFailed,
            };
        };

        let stanzas = flatten(&metadata.artifacts);
        let actions = extract_actions(&stanzas);
        let mut rules = RuleAggregator::new();
        rules.extend(&synthesizer.package_rules(token, &actions));
        debug!("{token}: {} distinct rules", rules.len());

        PackageReport {
            token: token.to_string(),
            outcome: PackageOutcome::Rules {
                display_name: metadata.display_name(token),
                rules: rules.into_rules(),
            },
        }
    }

    /// Distinct rules derived from the privileged commands recorded in
    /// `sources`, in first-seen order.
    ///
    /// Unreadable sources are skipped with a warning.
    pub async fn scan_logs(&self, sources: &[PathBuf]) -> Vec<String> {
        if sources.is_empty() {
            warn!(
                "No log file specified or found. Capture one with `cask-sudoers reinstall` \
                 and pass it with --logs so commands Homebrew runs outside the cask \
                 metadata are covered"
            );
            return Vec::new();
        }

        let synthesizer = RuleSynthesizer::new(&self.context, self.resolver.as_ref());
        let mut rules = RuleAggregator::new();
        let mut scanned = 0_usize;
        for path in sources {
            let bytes = match tokio::fs::read(path).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("{}", SynthesisError::io("read log", path, e));
                    continue;
                }
            };
            scanned += 1;
            let text = String::from_utf8_lossy(&bytes);
            let before = rules.len();
            for tokens in text.lines().filter_map(parse_log_line) {
                rules.extend(&synthesizer.normalize_log_command(&tokens));
            }
            debug!("{}: {} new rules", path.display(), rules.len() - before);
        }
        if scanned == 0 {
            warn!("None of the log files could be read");
        }
        rules.into_rules()
    }
}

fn into_section(report: PackageReport, emitted: &mut RuleAggregator) -> PackageSection {
    match report.outcome {
        PackageOutcome::FetchFailed => PackageSection::FetchFailed {
            token: report.token,
        },
        PackageOutcome::Rules {
            display_name,
            rules,
        } => {
            let produced_any = !rules.is_empty();
            let fresh: Vec<String> = rules
                .into_iter()
                .filter(|rule| emitted.push_rendered(rule))
                .collect();
            PackageSection::Rules {
                token: report.token,
                display_name,
                all_covered: produced_any && fresh.is_empty(),
                rules: fresh,
            }
        }
    }
}
