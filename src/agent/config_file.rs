//! Reader for agent-style `Directive = value` configuration files.
//!
//! Lines starting with `#` or `;` (after leading whitespace) and blank lines
//! are ignored, inline `#` comments are stripped, and the last occurrence of
//! a directive wins.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::debug;

const COMMENT_PREFIXES: [char; 2] = ['#', ';'];

pub fn parse_kvp(contents: &str) -> HashMap<String, String> {
    let mut options = HashMap::new();

    for line in contents.lines() {
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with(COMMENT_PREFIXES) {
            continue;
        }

        let line = match line.split_once('#') {
            Some((before, _)) => before,
            None => line,
        };
        if let Some((option, value)) = line.split_once('=') {
            options.insert(option.trim().to_string(), value.trim().to_string());
        }
    }

    options
}

/// Parse the file at `path`. An unreadable file yields an empty mapping.
pub fn parse_file_kvp(path: impl AsRef<Path>) -> HashMap<String, String> {
    let path = path.as_ref();
    match fs::read_to_string(path) {
        Ok(contents) => {
            let options = parse_kvp(&contents);
            debug!("Read {} directives from {}", options.len(), path.display());
            options
        }
        Err(e) => {
            debug!("Agent config {} not readable: {}", path.display(), e);
            HashMap::new()
        }
    }
}
