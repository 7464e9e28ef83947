//! cask-sudoers service layer
//!
//! The service owns the run's [`SynthesisContext`] and its two external
//! collaborators, and exposes the high-level `generate` operation used by the
//! CLI.

use crate::providers::{BrewMetadataProvider, MetadataProvider, PathResolver, SystemPathResolver};
use crate::synthesis::SynthesisContext;

/// Main service struct holding the metadata source and path resolver
pub struct SudoersService {
    pub(crate) context: SynthesisContext,
    pub(crate) provider: Box<dyn MetadataProvider>,
    pub(crate) resolver: Box<dyn PathResolver>,
}

impl SudoersService {
    pub fn new(
        context: SynthesisContext,
        provider: Box<dyn MetadataProvider>,
        resolver: Box<dyn PathResolver>,
    ) -> Self {
        Self {
            context,
            provider,
            resolver,
        }
    }

    /// Service backed by the local Homebrew installation and `PATH`
    pub fn with_system_providers(context: SynthesisContext) -> Self {
        Self::new(
            context,
            Box::new(BrewMetadataProvider::new()),
            Box::new(SystemPathResolver::new()),
        )
    }

    pub const fn context(&self) -> &SynthesisContext {
        &self.context
    }

    // generate() and its phases are in generate.rs
}
