//! Log lines that mention sudo without being an invocation

/// Descriptive prose Homebrew prints around elevated steps
const PROSE_MARKERS: [&str; 4] = [
    "with `sudo`",
    "Uninstalling packages",
    "Changing ownership",
    "Running installer",
];

/// Ruby object dumps from `--debug` output
const OBJECT_DUMP_MARKERS: [&str; 5] = ["#<Cask", "Cask::", "@dsl_args", "@directives", "@cask="];

const ERROR_PREFIX: &str = "sudo:";

/// Whether a log line should be dropped before tokenization.
pub fn is_noise(line: &str) -> bool {
    PROSE_MARKERS
        .iter()
        .chain(OBJECT_DUMP_MARKERS.iter())
        .any(|marker| line.contains(marker))
        || line.trim_start().starts_with(ERROR_PREFIX)
}
