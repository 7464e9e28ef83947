//! Log line parsing: noise filtering and command tokenization

mod noise;
mod tokenizer;

pub use noise::is_noise;
pub use tokenizer::tokenize;

use crate::types::LogCommandTokens;

/// Filter and tokenize one raw log line.
///
/// Only lines mentioning sudo are considered.
pub fn parse_log_line(line: &str) -> Option<LogCommandTokens> {
    if !line.contains("sudo") || is_noise(line) {
        return None;
    }
    tokenize(line)
}
