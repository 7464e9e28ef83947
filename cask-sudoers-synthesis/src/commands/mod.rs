//! Commands module - service layer for cask-sudoers operations

mod generate;
pub(crate) mod service;

pub use generate::{GenerateRequest, DEFAULT_WORKERS};
pub use service::SudoersService;
