//! Filesystem-safe file name components.
//!
//! Output files are named after the input's stem, which may contain anything.
//! The rules below are the union of what Windows, macOS and Linux reject.

const FORBIDDEN: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*', '\0'];

const RESERVED: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Fallback name when nothing usable is left.
pub const FALLBACK_NAME: &str = "output";

/// Make `name` safe to use as a single file name component.
pub fn sanitize(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| if FORBIDDEN.contains(&c) { '_' } else { c })
        .collect();

    let trimmed = replaced.trim_end_matches([' ', '.']);
    if trimmed.is_empty() {
        return FALLBACK_NAME.to_string();
    }

    if RESERVED
        .iter()
        .any(|reserved| trimmed.eq_ignore_ascii_case(reserved))
    {
        return format!("_{}", trimmed);
    }

    trimmed.to_string()
}
