//! cask-sudoers command line interface

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{info, warn};

use cask_sudoers_synthesis::{
    write_artifact, BrewEnvironment, GenerateRequest, SudoersService, SynthesisContext,
};

mod config;
mod reinstall;

#[derive(Parser)]
#[command(
    name = "cask-sudoers",
    version,
    about = "Generate NOPASSWD sudoers rules for the privileged steps of Homebrew casks"
)]
struct Cli {
    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    generate: GenerateArgs,
}

#[derive(Subcommand)]
enum Command {
    /// Write sudoers rules for the selected casks (default)
    Generate(GenerateArgs),
    /// Download and reinstall casks, recording the sudo log `generate` reads
    Reinstall(ReinstallArgs),
}

#[derive(Args, Debug, Clone)]
struct GenerateArgs {
    /// Casks to cover, space separated [default: all installed casks]
    #[arg(long, env = "CASKS", value_name = "TOKENS")]
    casks: Vec<String>,

    /// User the rules grant access to [default: $SUDO_USER, then the current user]
    #[arg(long, env = "TARGET_USER", value_name = "NAME")]
    user: Option<String>,

    /// Sudoers file to write
    #[arg(long, env = "SUDOERS_OUT", value_name = "PATH", default_value = config::DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Concurrent metadata lookups; invalid values fall back to 32, values below 1 mean 1
    #[arg(long, env = "THREADS", value_name = "N")]
    threads: Option<String>,

    /// Operation logs to scan, `:` separated [default: <output stem>.log when present]
    #[arg(long, env = "LOGS", value_name = "PATHS")]
    logs: Option<String>,
}

#[derive(Args, Debug, Clone)]
struct ReinstallArgs {
    /// Casks to reinstall [default: $CASKS, then all installed casks]
    casks: Vec<String>,

    /// Progress file shared between runs
    #[arg(long, value_name = "PATH", default_value = config::DEFAULT_STATE_FILE)]
    state: PathBuf,

    /// Install log to append to
    #[arg(long, value_name = "PATH", default_value = config::DEFAULT_INSTALL_LOG)]
    log: PathBuf,

    /// Concurrent downloads
    #[arg(long, value_name = "N", default_value_t = cask_sudoers_synthesis::DEFAULT_WORKERS)]
    jobs: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Some(Command::Generate(args)) => generate(args).await,
        Some(Command::Reinstall(args)) => reinstall(args).await,
        None => generate(cli.generate).await,
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

async fn generate(args: GenerateArgs) -> Result<()> {
    let actor = target_user(args.user).await?;
    let brew = BrewEnvironment::detect().await;
    let tokens = selected_casks(&args.casks).await;
    let request = GenerateRequest {
        log_sources: config::log_sources(args.logs.as_deref(), &args.output),
        workers: config::worker_count(args.threads.as_deref()),
        tokens,
    };
    info!(
        "Generating rules for {} casks as {actor} with {} workers",
        request.tokens.len(),
        request.workers
    );

    let context = SynthesisContext::new(actor, brew.prefix, brew.repository);
    let service = SudoersService::with_system_providers(context);
    let report = service.generate(&request).await;

    write_artifact(&report, &args.output)
        .await
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    println!("Generated sudoers snippet: {}", args.output.display());
    Ok(())
}

async fn reinstall(args: ReinstallArgs) -> Result<()> {
    let from_env: Vec<String> = std::env::var("CASKS").into_iter().collect();
    let explicit = if args.casks.is_empty() {
        config::split_tokens(&from_env)
    } else {
        config::split_tokens(&args.casks)
    };
    let casks = if explicit.is_empty() {
        BrewEnvironment::installed_casks()
            .await
            .context("Failed to list installed casks; is Homebrew on PATH?")?
    } else {
        explicit
    };

    reinstall::run(&reinstall::ReinstallPlan {
        casks,
        state_file: args.state,
        log_file: args.log,
        jobs: args.jobs,
    })
    .await
}

/// Tokens given on the command line or in `CASKS`, else every installed cask
async fn selected_casks(requested: &[String]) -> Vec<String> {
    let tokens = config::split_tokens(requested);
    if !tokens.is_empty() {
        return tokens;
    }
    match BrewEnvironment::installed_casks().await {
        Ok(tokens) => tokens,
        Err(e) => {
            warn!("Could not list installed casks: {e}");
            Vec::new()
        }
    }
}

/// `--user`/`TARGET_USER`, then `SUDO_USER`, then the invoking user
async fn target_user(explicit: Option<String>) -> Result<String> {
    let from_env = config::first_set([
        explicit,
        std::env::var("SUDO_USER").ok(),
        std::env::var("USER").ok(),
        std::env::var("LOGNAME").ok(),
    ]);
    if let Some(user) = from_env {
        return Ok(user);
    }
    let output = tokio::process::Command::new("id")
        .arg("-un")
        .output()
        .await
        .context("Failed to run `id -un`")?;
    config::first_set([Some(String::from_utf8_lossy(&output.stdout).into_owned())])
        .context("Could not determine the target user; pass --user")
}
