use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};
use std::fmt;

/// One `{#MACRO}` / value pair reported by a discovery rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroPair {
    pub name: String,
    pub value: String,
}

impl MacroPair {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// A pair without a macro name carries nothing the server can expand.
    pub fn is_conforming(&self) -> bool {
        !self.name.is_empty()
    }
}

impl<N: Into<String>, V: Into<String>> From<(N, V)> for MacroPair {
    fn from((name, value): (N, V)) -> Self {
        Self::new(name, value)
    }
}

// Serialized as a single-entry object: {"{$LOCATION}": "LEFT"}
impl Serialize for MacroPair {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.name, &self.value)?;
        map.end()
    }
}

/// Identity of a discovery entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DiscoveryKey {
    pub host: String,
    pub key: String,
}

impl DiscoveryKey {
    pub fn new(host: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            key: key.into(),
        }
    }
}

/// Rendered as the composite `host,key` string used on the wire.
impl fmt::Display for DiscoveryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.host, self.key)
    }
}

/// All macro pairs accumulated for one (host, key), in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryEntry {
    pub id: DiscoveryKey,
    pub pairs: Vec<MacroPair>,
}

impl DiscoveryEntry {
    pub fn new(id: DiscoveryKey) -> Self {
        Self {
            id,
            pairs: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl fmt::Display for DiscoveryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)?;
        for pair in &self.pairs {
            write!(f, " {}={}", pair.name, pair.value)?;
        }
        Ok(())
    }
}
