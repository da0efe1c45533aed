//! Line format for `--input-file`.
//!
//! ```text
//! <host> <key> <value>
//! <host> <key> <timestamp> <value>     (with --with-timestamps)
//! ```
//!
//! A host of `-` stands for the default host. The value is the rest of the
//! line, so it may contain spaces; a value wrapped in double quotes is
//! unquoted (`\"` and `\\` escapes inside are honored).

use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_HOST_MARKER: &str = "-";

#[derive(Error, Debug)]
pub enum InputError {
    #[error("Cannot read input {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("line {line}: {reason}")]
    Malformed { line: usize, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputLine {
    /// `None` for the default host.
    pub host: Option<String>,
    pub key: String,
    pub clock: Option<i64>,
    pub value: String,
}

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse_line(
    line: &str,
    line_no: usize,
    with_timestamps: bool,
) -> Result<Option<InputLine>, InputError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let malformed = |reason: &str| InputError::Malformed {
        line: line_no,
        reason: reason.to_string(),
    };

    let (host, rest) = next_field(line).ok_or_else(|| malformed("missing key"))?;
    let (key, rest) = next_field(rest).ok_or_else(|| malformed("missing value"))?;

    let (clock, rest) = if with_timestamps {
        let (raw, rest) = next_field(rest).ok_or_else(|| malformed("missing value"))?;
        let clock = raw
            .parse::<i64>()
            .map_err(|_| malformed(&format!("invalid timestamp '{raw}'")))?;
        (Some(clock), rest)
    } else {
        (None, rest)
    };

    let value = unquote(rest.trim()).ok_or_else(|| malformed("unterminated quoted value"))?;
    if value.is_empty() {
        return Err(malformed("empty value"));
    }

    Ok(Some(InputLine {
        host: (host != DEFAULT_HOST_MARKER).then(|| host.to_string()),
        key: key.to_string(),
        clock,
        value,
    }))
}

/// Split off the first whitespace-delimited field. `None` when nothing
/// follows it.
fn next_field(s: &str) -> Option<(&str, &str)> {
    let (field, rest) = s.trim_start().split_once(char::is_whitespace)?;
    let rest = rest.trim_start();
    (!rest.is_empty()).then_some((field, rest))
}

fn unquote(value: &str) -> Option<String> {
    let Some(inner) = value.strip_prefix('"') else {
        return Some(value.to_string());
    };
    let inner = inner.strip_suffix('"')?;

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped @ ('"' | '\\')) => out.push(escaped),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            },
            c => out.push(c),
        }
    }
    Some(out)
}
