//! Seams to the outside world: package metadata and binary discovery
//!
//! The pipeline only sees these traits, so tests swap in fixed tables while
//! the CLI wires up [`BrewMetadataProvider`] and [`SystemPathResolver`].

mod brew;
mod path;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::types::CaskMetadata;

pub use brew::{
    select_package_entry, BrewEnvironment, BrewMetadataProvider, CASK_API_BASE, DEFAULT_BREW_PREFIX,
};
pub use path::SystemPathResolver;

/// Source of package metadata documents.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Metadata for `token`, or `None` when no source could provide it.
    ///
    /// Implementations log their failures instead of returning them.
    async fn fetch(&self, token: &str) -> Option<CaskMetadata>;
}

/// Resolution of bare command names and existence checks for absolute paths.
pub trait PathResolver: Send + Sync {
    /// Absolute path of an executable named `name`
    fn resolve(&self, name: &str) -> Option<PathBuf>;

    fn exists(&self, path: &Path) -> bool;
}
