//! Response side of the trapper wire protocol: header validation and
//! interpretation of the server's `{"response": ..., "info": ...}` ack.

use super::serialization::{FRAME_PREFIX_LEN, LENGTH_FIELD_LEN, PROTOCOL_HEADER};
use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::sync::OnceLock;

/// Numeric result of one send attempt. The value doubles as the binary's
/// exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckCode {
    /// Every item was accepted.
    Success,
    /// The server processed the batch but reported failed items.
    Failed,
    /// The ack carried no parseable failure count.
    Unparseable,
    /// The response did not start with the protocol header.
    InvalidProtocol,
    /// Reading the response failed or timed out.
    ReadFailed,
    /// Connecting or writing the request failed or timed out.
    ConnectFailed,
}

impl AckCode {
    pub fn as_i32(self) -> i32 {
        match self {
            AckCode::Success => 0,
            AckCode::Failed => 1,
            AckCode::Unparseable => 2,
            AckCode::InvalidProtocol => 253,
            AckCode::ReadFailed => 254,
            AckCode::ConnectFailed => 255,
        }
    }

    pub fn is_success(self) -> bool {
        self == AckCode::Success
    }
}

impl fmt::Display for AckCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_i32())
    }
}

/// What came back with an [`AckCode`]: the parsed ack object, or a
/// diagnostic message when no ack could be read.
#[derive(Debug, Clone, PartialEq)]
pub enum AckBody {
    Response(Value),
    Diagnostic(String),
}

impl AckBody {
    /// The ack's `info` summary, when there is one.
    pub fn info(&self) -> Option<&str> {
        match self {
            AckBody::Response(value) => value.get("info").and_then(Value::as_str),
            AckBody::Diagnostic(_) => None,
        }
    }
}

impl fmt::Display for AckBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AckBody::Response(value) => write!(f, "{value}"),
            AckBody::Diagnostic(message) => f.write_str(message),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AckResult {
    pub code: AckCode,
    /// Failure count parsed out of `info`, when one was found.
    pub failed: Option<u64>,
    pub body: AckBody,
}

impl AckResult {
    pub fn diagnostic(code: AckCode, message: impl Into<String>) -> Self {
        Self {
            code,
            failed: None,
            body: AckBody::Diagnostic(message.into()),
        }
    }
}

fn failed_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)failed.+?(\d+)").ok())
        .as_ref()
}

/// Pull the failure count out of an ack summary such as
/// `processed: 3; failed: 1; total: 4; seconds spent: 0.000100`.
pub fn parse_failed_count(info: &str) -> Option<u64> {
    failed_pattern()?
        .captures(info)?
        .get(1)?
        .as_str()
        .parse()
        .ok()
}

pub fn is_valid_header(header: &[u8]) -> bool {
    header == PROTOCOL_HEADER
}

/// Payload length declared in the 8-byte length field; only the first four
/// bytes carry the value.
pub fn declared_length(field: &[u8; LENGTH_FIELD_LEN]) -> u32 {
    u32::from_le_bytes([field[0], field[1], field[2], field[3]])
}

/// Result for a response whose header is not `ZBXD\x01`. The request payload
/// is echoed to make the mismatch debuggable.
pub fn invalid_header(sent_payload: &str) -> AckResult {
    AckResult::diagnostic(
        AckCode::InvalidProtocol,
        format!("Invalid response from server. Malformed data?\n---\n{sent_payload}\n---\n"),
    )
}

/// Interpret the JSON payload of an ack frame.
pub fn interpret_payload(payload: &[u8]) -> AckResult {
    let response: Value = match serde_json::from_slice(payload) {
        Ok(value) => value,
        Err(e) => {
            return AckResult::diagnostic(
                AckCode::Unparseable,
                format!(
                    "Unable to parse server response ({e}) - \n{}\n",
                    String::from_utf8_lossy(payload)
                ),
            );
        }
    };

    let failed = response
        .get("info")
        .and_then(Value::as_str)
        .and_then(parse_failed_count);

    let code = match failed {
        None => AckCode::Unparseable,
        Some(0) => AckCode::Success,
        Some(_) => AckCode::Failed,
    };

    AckResult {
        code,
        failed,
        body: AckBody::Response(response),
    }
}

/// Decode a complete response buffer (header, length field and payload).
pub fn decode(raw: &[u8], sent_payload: &str) -> AckResult {
    let header_len = PROTOCOL_HEADER.len();
    if raw.len() < header_len || !is_valid_header(&raw[..header_len]) {
        return invalid_header(sent_payload);
    }

    let Some(field) = raw
        .get(header_len..FRAME_PREFIX_LEN)
        .and_then(|bytes| <&[u8; LENGTH_FIELD_LEN]>::try_from(bytes).ok())
    else {
        return AckResult::diagnostic(
            AckCode::ReadFailed,
            "Error talking to server: truncated length field\n",
        );
    };

    let length = declared_length(field) as usize;
    let body = &raw[FRAME_PREFIX_LEN..];
    if body.len() < length {
        return AckResult::diagnostic(
            AckCode::ReadFailed,
            format!(
                "Error talking to server: expected {length} payload bytes, got {}\n",
                body.len()
            ),
        );
    }

    interpret_payload(&body[..length])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(payload: &str) -> Vec<u8> {
        let mut raw = PROTOCOL_HEADER.to_vec();
        raw.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        raw.extend_from_slice(&[0, 0, 0, 0]);
        raw.extend_from_slice(payload.as_bytes());
        raw
    }

    #[test]
    fn test_all_accepted_is_success() {
        let raw = frame(
            r#"{"response":"success","info":"processed: 3; failed: 0; total: 3; seconds spent: 0.000100"}"#,
        );
        let result = decode(&raw, "");
        assert_eq!(result.code, AckCode::Success);
        assert_eq!(result.failed, Some(0));
    }

    #[test]
    fn test_failures_reported() {
        let raw = frame(r#"{"response":"success","info":"processed: 1; failed: 2; total: 3"}"#);
        let result = decode(&raw, "");
        assert_eq!(result.code, AckCode::Failed);
        assert_eq!(result.failed, Some(2));
        assert_eq!(result.body.info(), Some("processed: 1; failed: 2; total: 3"));
    }

    #[test]
    fn test_no_digits_after_failed_is_unparseable() {
        let raw = frame(r#"{"response":"success","info":"failed: none"}"#);
        let result = decode(&raw, "");
        assert_eq!(result.code, AckCode::Unparseable);
        assert!(matches!(result.body, AckBody::Response(_)));
    }

    #[test]
    fn test_match_is_case_insensitive() {
        assert_eq!(parse_failed_count("Processed 2 FAILED 7 total 9"), Some(7));
    }

    #[test]
    fn test_missing_info_is_unparseable() {
        let result = interpret_payload(br#"{"response":"failed"}"#);
        assert_eq!(result.code, AckCode::Unparseable);
    }

    #[test]
    fn test_non_json_payload_is_unparseable() {
        let result = interpret_payload(b"not json");
        assert_eq!(result.code, AckCode::Unparseable);
        assert!(result.body.to_string().contains("not json"));
    }

    #[test]
    fn test_bad_magic_echoes_request() {
        let mut raw = frame(r#"{"response":"success","info":"failed: 0"}"#);
        raw[0] = b'X';
        let result = decode(&raw, r#"{"request":"sender data"}"#);
        assert_eq!(result.code, AckCode::InvalidProtocol);
        assert!(result.body.to_string().contains(r#"{"request":"sender data"}"#));
    }

    #[test]
    fn test_bad_version_byte_is_invalid() {
        let mut raw = frame(r#"{"info":"failed: 0"}"#);
        raw[4] = 0x02;
        assert_eq!(decode(&raw, "").code, AckCode::InvalidProtocol);
    }

    #[test]
    fn test_short_payload_is_read_failure() {
        let mut raw = frame(r#"{"info":"failed: 0"}"#);
        raw.truncate(raw.len() - 3);
        assert_eq!(decode(&raw, "").code, AckCode::ReadFailed);
    }

    #[test]
    fn test_codes() {
        assert_eq!(AckCode::Success.as_i32(), 0);
        assert_eq!(AckCode::Failed.as_i32(), 1);
        assert_eq!(AckCode::Unparseable.as_i32(), 2);
        assert_eq!(AckCode::InvalidProtocol.as_i32(), 253);
        assert_eq!(AckCode::ReadFailed.as_i32(), 254);
        assert_eq!(AckCode::ConnectFailed.as_i32(), 255);
    }
}
