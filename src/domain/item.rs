use serde::{Deserialize, Serialize};
use std::fmt;

/// A single metric observation queued for the trapper.
///
/// Field order is the wire order: `host`, `key`, `value`, `clock`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricItem {
    pub host: String,
    pub key: String,
    pub value: String,
    /// Epoch seconds.
    pub clock: i64,
}

impl MetricItem {
    pub fn new(
        host: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
        clock: i64,
    ) -> Self {
        Self {
            host: host.into(),
            key: key.into(),
            value: value.into(),
            clock,
        }
    }
}

impl fmt::Display for MetricItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.host, self.key, self.clock, self.value)
    }
}
