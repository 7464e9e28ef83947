//! Recovering the elevated command from a log line

use log::trace;

use crate::types::LogCommandTokens;

/// Tokens that mark the start of an elevated invocation
const SUDO_MARKERS: [&str; 2] = ["/usr/bin/sudo", "sudo"];

/// sudo options that take a separate value
const VALUE_FLAGS: [&str; 9] = ["-u", "-g", "-p", "-C", "-D", "-U", "-r", "-t", "-T"];

/// Split `line` with shell quoting and return the command run under sudo.
///
/// Environment assignments (`KEY=value`, not starting with `/`), `--` and
/// option flags between the marker and the command are skipped; options in
/// [`VALUE_FLAGS`] also consume their value. Returns `None` when the line does
/// not split, has no marker, or nothing follows the options.
pub fn tokenize(line: &str) -> Option<LogCommandTokens> {
    let tokens = match shell_words::split(line) {
        Ok(tokens) => tokens,
        Err(e) => {
            trace!("Unbalanced quoting, skipping line: {e}");
            return None;
        }
    };
    let marker = tokens
        .iter()
        .position(|token| SUDO_MARKERS.contains(&token.as_str()))?;

    let mut index = marker + 1;
    while let Some(token) = tokens.get(index) {
        if is_env_assignment(token) || token == "--" {
            index += 1;
        } else if token.starts_with('-') {
            index += if VALUE_FLAGS.contains(&token.as_str()) { 2 } else { 1 };
        } else {
            break;
        }
    }

    let command = tokens.get(index)?.clone();
    Some(LogCommandTokens {
        command,
        arguments: tokens[index + 1..].to_vec(),
    })
}

fn is_env_assignment(token: &str) -> bool {
    token.contains('=') && !token.starts_with('/')
}
