//! Rendering of the sudoers artifact

use chrono::{Local, NaiveDateTime};
use log::info;
use std::path::Path;

use crate::error::{SynthesisError, SynthesisResult};
use crate::types::{GenerationReport, PackageSection};

pub const ARTIFACT_TITLE: &str =
    "# ===== Homebrew Cask NOPASSWD rules (generated by cask-sudoers) =====";
const SECTION_RULE: &str = "# ----------------------------";
const LOG_SECTION_TITLE: &str = "# ----- Additional sudo commands from log -----";
const NO_ACTIONS: &str = "# No privileged actions detected";
const ALL_COVERED: &str = "# All privileged actions already covered above";

/// Render `report` as sudoers text stamped with `generated`.
pub fn render(report: &GenerationReport, generated: NaiveDateTime) -> String {
    let mut out = String::new();
    out.push_str(ARTIFACT_TITLE);
    out.push('\n');
    out.push_str(&format!("# Generated: {}\n", generated.format("%Y-%m-%d %H:%M:%S")));
    out.push_str(&format!("# Target user: {}\n\n", report.actor));

    for section in &report.sections {
        match section {
            PackageSection::FetchFailed { token } => {
                out.push_str(&format!("# {token}: failed to fetch metadata\n\n"));
            }
            PackageSection::Rules {
                token,
                display_name,
                rules,
                all_covered,
            } => {
                out.push_str(&format!(
                    "{SECTION_RULE}\n# {display_name} ({token})\n{SECTION_RULE}\n"
                ));
                if rules.is_empty() {
                    out.push_str(if *all_covered { ALL_COVERED } else { NO_ACTIONS });
                    out.push('\n');
                }
                for rule in rules {
                    out.push_str(rule);
                    out.push('\n');
                }
                out.push('\n');
            }
        }
    }

    if !report.log_rules.is_empty() {
        out.push('\n');
        out.push_str(LOG_SECTION_TITLE);
        out.push('\n');
        for rule in &report.log_rules {
            out.push_str(rule);
            out.push('\n');
        }
    }
    out
}

/// Render `report` with the current local time and write it to `path`.
pub async fn write_artifact(report: &GenerationReport, path: &Path) -> SynthesisResult<()> {
    let text = render(report, Local::now().naive_local());
    tokio::fs::write(path, text)
        .await
        .map_err(|e| SynthesisError::io("write sudoers file", path, e))?;
    info!(
        "Wrote {} rules to {}",
        report.rules().count(),
        path.display()
    );
    Ok(())
}
