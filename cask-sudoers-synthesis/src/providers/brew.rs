//! Homebrew-backed metadata retrieval and installation discovery

use async_trait::async_trait;
use log::{debug, warn};
use serde_json::Value;
use tokio::process::Command;

use super::MetadataProvider;
use crate::error::{SynthesisError, SynthesisResult};
use crate::types::CaskMetadata;

/// Public cask API queried when the local `brew` cannot answer
pub const CASK_API_BASE: &str = "https://formulae.brew.sh/api/cask";

/// Prefix assumed when `brew` itself is unavailable
pub const DEFAULT_BREW_PREFIX: &str = "/opt/homebrew";

const BREW: &str = "brew";

/// Run `brew <args>` and return its trimmed stdout.
async fn run_brew(args: &[&str]) -> SynthesisResult<String> {
    let command = format!("{BREW} {}", args.join(" "));
    let output = Command::new(BREW)
        .args(args)
        .output()
        .await
        .map_err(|e| SynthesisError::command(&command, e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SynthesisError::command(
            &command,
            format!("exited with {}: {}", output.status, stderr.trim()),
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Pick the package entry out of a metadata document.
///
/// Accepts the current `{"casks": [...]}` container, a legacy list, or a
/// bare package object. Returns `None` when no entry is present.
pub fn select_package_entry(document: Value) -> Option<CaskMetadata> {
    let entry = match document {
        Value::Object(mut map) if map.contains_key("casks") => match map.remove("casks") {
            Some(Value::Array(casks)) => casks.into_iter().next()?,
            _ => return None,
        },
        Value::Array(entries) => entries.into_iter().next()?,
        object @ Value::Object(_) => object,
        _ => return None,
    };
    if !entry.is_object() {
        return None;
    }
    match serde_json::from_value(entry) {
        Ok(metadata) => Some(metadata),
        Err(e) => {
            debug!("Discarding package entry with unexpected shape: {e}");
            None
        }
    }
}

/// [`MetadataProvider`] that asks the local `brew`, then the public API.
#[derive(Debug, Clone)]
pub struct BrewMetadataProvider {
    client: reqwest::Client,
    api_base: String,
}

impl BrewMetadataProvider {
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            api_base: CASK_API_BASE.to_string(),
        }
    }

    /// Point the remote fallback at another API root
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    async fn fetch_local(&self, token: &str) -> SynthesisResult<CaskMetadata> {
        let stdout = run_brew(&["info", "--cask", "--json=v2", token])
            .await
            .map_err(|e| SynthesisError::retrieval(token, e.to_string()))?;
        let document: Value = serde_json::from_str(&stdout)?;
        select_package_entry(document)
            .ok_or_else(|| SynthesisError::metadata(format!("brew info returned no entry for {token}")))
    }

    async fn fetch_remote(&self, token: &str) -> SynthesisResult<CaskMetadata> {
        let url = format!("{}/{token}.json", self.api_base);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SynthesisError::retrieval(token, format!("request to {url} failed: {e}")))?;

        if !response.status().is_success() {
            return Err(SynthesisError::retrieval(
                token,
                format!("{url} returned HTTP {}", response.status()),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SynthesisError::retrieval(token, format!("reading {url} failed: {e}")))?;
        let document: Value = serde_json::from_str(&body)?;
        select_package_entry(document)
            .ok_or_else(|| SynthesisError::metadata(format!("{url} held no package entry")))
    }
}

impl Default for BrewMetadataProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataProvider for BrewMetadataProvider {
    async fn fetch(&self, token: &str) -> Option<CaskMetadata> {
        match self.fetch_local(token).await {
            Ok(metadata) => return Some(metadata),
            Err(e) => debug!("Local metadata lookup failed, trying the API: {e}"),
        }
        match self.fetch_remote(token).await {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                warn!("{e}");
                None
            }
        }
    }
}

/// Where Homebrew lives on this machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrewEnvironment {
    /// `brew --prefix`
    pub prefix: String,
    /// `brew --repository`
    pub repository: String,
}

impl Default for BrewEnvironment {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_BREW_PREFIX.to_string(),
            repository: DEFAULT_BREW_PREFIX.to_string(),
        }
    }
}

impl BrewEnvironment {
    /// Ask `brew` for its prefix and repository, falling back to
    /// [`DEFAULT_BREW_PREFIX`] for both when either query fails.
    pub async fn detect() -> Self {
        let prefix = run_brew(&["--prefix"]).await;
        let repository = run_brew(&["--repository"]).await;
        match (prefix, repository) {
            (Ok(prefix), Ok(repository)) if !prefix.is_empty() && !repository.is_empty() => {
                debug!("Homebrew prefix {prefix}, repository {repository}");
                Self { prefix, repository }
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!("Could not locate Homebrew, assuming {DEFAULT_BREW_PREFIX}: {e}");
                Self::default()
            }
            _ => {
                warn!("brew reported an empty prefix, assuming {DEFAULT_BREW_PREFIX}");
                Self::default()
            }
        }
    }

    /// Tokens of every installed cask, in `brew list` order
    pub async fn installed_casks() -> SynthesisResult<Vec<String>> {
        let stdout = run_brew(&["list", "--cask"]).await?;
        Ok(parse_token_list(&stdout))
    }
}

fn parse_token_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
