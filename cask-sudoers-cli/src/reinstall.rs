//! Two-phase download-then-reinstall workflow that captures the sudo log
//! consumed by `generate`
//!
//! Progress is persisted after every cask so an interrupted run resumes where
//! it stopped.

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;

/// Casks already handled by earlier runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReinstallState {
    #[serde(default)]
    pub downloaded: BTreeSet<String>,
    #[serde(default)]
    pub installed: BTreeSet<String>,
}

impl ReinstallState {
    /// Load `path`; a missing file is a fresh state, an unreadable one is
    /// ignored with a warning.
    pub fn load(path: &Path) -> Self {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                warn!(
                    "Could not read state file {}: {e}; starting with a fresh state",
                    path.display()
                );
                return Self::default();
            }
        };
        serde_json::from_str(&text).unwrap_or_else(|e| {
            warn!(
                "Could not parse state file {}: {e}; starting with a fresh state",
                path.display()
            );
            Self::default()
        })
    }

    /// Persist to `path`; failures are logged, never fatal.
    pub fn save(&self, path: &Path) {
        let result = serde_json::to_string(self)
            .map_err(anyhow::Error::from)
            .and_then(|json| std::fs::write(path, json).map_err(anyhow::Error::from));
        if let Err(e) = result {
            warn!("Failed to write state file {}: {e}", path.display());
        }
    }
}

/// Settings of one reinstall run.
#[derive(Debug, Clone)]
pub struct ReinstallPlan {
    pub casks: Vec<String>,
    pub state_file: PathBuf,
    pub log_file: PathBuf,
    pub jobs: usize,
}

pub async fn run(plan: &ReinstallPlan) -> Result<()> {
    if plan.casks.is_empty() {
        println!("No Homebrew Cask packages found to process.");
        return Ok(());
    }

    let mut state = ReinstallState::load(&plan.state_file);
    download_phase(plan, &mut state).await;
    install_phase(plan, &mut state).await
}

async fn download_phase(plan: &ReinstallPlan, state: &mut ReinstallState) {
    let pending: Vec<&String> = plan
        .casks
        .iter()
        .filter(|cask| !state.downloaded.contains(*cask))
        .collect();
    if pending.is_empty() {
        println!("All casks have already been downloaded; skipping download phase.");
        return;
    }
    println!(
        "Starting download phase: {} of {} casks need to be fetched.",
        pending.len(),
        plan.casks.len()
    );

    let progress = ProgressBar::new(pending.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len} ({percent}%)")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    progress.set_message("Downloading casks");

    let mut fetches = stream::iter(pending)
        .map(|cask| async move { (cask, fetch_cask(cask).await) })
        .buffer_unordered(plan.jobs.max(1));
    while let Some((cask, fetched)) = fetches.next().await {
        progress.inc(1);
        if fetched {
            state.downloaded.insert(cask.clone());
            state.save(&plan.state_file);
        } else {
            progress.suspend(|| warn!("Failed to fetch {cask}"));
        }
    }
    progress.finish_with_message("Downloaded casks");
    println!("Download phase completed.");
}

/// `brew fetch --cask <cask>` with its output discarded
async fn fetch_cask(cask: &str) -> bool {
    let status = Command::new("brew")
        .args(["fetch", "--cask", cask])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
    match status {
        Ok(status) => status.success(),
        Err(e) => {
            debug!("brew fetch {cask}: {e}");
            false
        }
    }
}

async fn install_phase(plan: &ReinstallPlan, state: &mut ReinstallState) -> Result<()> {
    let pending: Vec<String> = plan
        .casks
        .iter()
        .filter(|cask| !state.installed.contains(*cask))
        .cloned()
        .collect();
    if pending.is_empty() {
        println!("All casks have already been reinstalled; nothing left to do.");
        return Ok(());
    }
    println!(
        "Starting install phase: {} of {} casks need to be reinstalled.",
        pending.len(),
        plan.casks.len()
    );

    let mut log = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&plan.log_file)
        .await
        .with_context(|| format!("Failed to open log file {}", plan.log_file.display()))?;

    for cask in pending {
        reinstall_cask(&cask, &mut log)
            .await
            .with_context(|| format!("Failed to reinstall {cask}"))?;
        state.installed.insert(cask);
        state.save(&plan.state_file);
    }
    log.flush().await?;

    println!("Install phase completed.");
    info!("Installation log appended to {}", plan.log_file.display());
    Ok(())
}

/// Run `brew reinstall` for one cask, echoing its merged output to the
/// terminal and appending it to `log`.
async fn reinstall_cask(cask: &str, log: &mut tokio::fs::File) -> Result<()> {
    let args = ["reinstall", "--cask", "--verbose", "--debug", cask];
    let header = format!("\nRunning command: brew {}\n", args.join(" "));
    print!("{header}");
    log.write_all(header.as_bytes()).await?;

    let mut child = Command::new("brew")
        .args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .context("Failed to spawn brew")?;

    let stdout = child.stdout.take().context("brew stdout was not captured")?;
    let stderr = child.stderr.take().context("brew stderr was not captured")?;
    let mut stdout = BufReader::new(stdout).lines();
    let mut stderr = BufReader::new(stderr).lines();
    let (mut stdout_open, mut stderr_open) = (true, true);

    while stdout_open || stderr_open {
        let line = tokio::select! {
            line = stdout.next_line(), if stdout_open => {
                let line = line?;
                stdout_open = line.is_some();
                line
            }
            line = stderr.next_line(), if stderr_open => {
                let line = line?;
                stderr_open = line.is_some();
                line
            }
        };
        if let Some(line) = line {
            println!("{line}");
            log.write_all(line.as_bytes()).await?;
            log.write_all(b"\n").await?;
        }
    }

    let status = child.wait().await?;
    if !status.success() {
        let message = format!("Error: Command for '{cask}' exited with {status}\n");
        eprint!("{message}");
        log.write_all(message.as_bytes()).await?;
    }
    log.flush().await?;
    Ok(())
}
