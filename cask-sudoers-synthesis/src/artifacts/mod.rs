//! Cask artifact handling: structure flattening and action extraction

mod extract;
mod flatten;

pub use extract::{extract_actions, APPLICATIONS_DIR};
pub use flatten::{flatten, ArtifactStanza};
