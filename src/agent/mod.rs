pub mod config_file;
pub mod resolver;

pub use config_file::{parse_file_kvp, parse_kvp};
pub use resolver::resolve;

use crate::sender::TransportConfig;
use std::collections::HashMap;
use std::path::PathBuf;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/zabbix/zabbix_agentd.conf";
pub const DEFAULT_SERVER: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 10051;
pub const FALLBACK_NODE_NAME: &str = "localhost";

/// Built-in values used when neither an override nor the agent config file
/// provides one. Built once at startup and passed by reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentDefaults {
    pub config_path: PathBuf,
    pub server: String,
    pub port: u16,
    pub node_name: String,
}

impl AgentDefaults {
    /// Built-in defaults with the local fully-qualified domain name as node
    /// name.
    pub fn detect() -> Self {
        let short_name = hostname::get()
            .ok()
            .and_then(|name| name.into_string().ok())
            .filter(|name| !name.is_empty());
        let canonical = short_name.as_deref().and_then(canonical_name);

        Self {
            node_name: preferred_node_name(short_name, canonical),
            ..Self::default()
        }
    }
}

/// The canonical name wins when it is qualified; otherwise the short name,
/// then [`FALLBACK_NODE_NAME`].
fn preferred_node_name(short_name: Option<String>, canonical: Option<String>) -> String {
    canonical
        .filter(|name| name.contains('.'))
        .or(short_name)
        .unwrap_or_else(|| FALLBACK_NODE_NAME.to_string())
}

#[cfg(unix)]
fn canonical_name(short_name: &str) -> Option<String> {
    use dns_lookup::{AddrInfoHints, getaddrinfo};

    let hints = AddrInfoHints {
        flags: libc::AI_CANONNAME,
        ..AddrInfoHints::default()
    };

    match getaddrinfo(Some(short_name), None, Some(hints)) {
        Ok(mut infos) => infos
            .find_map(|info| info.ok().and_then(|info| info.canonname))
            .filter(|name| !name.is_empty()),
        Err(e) => {
            tracing::debug!("Canonical name lookup for {} failed: {:?}", short_name, e);
            None
        }
    }
}

#[cfg(not(unix))]
fn canonical_name(_short_name: &str) -> Option<String> {
    None
}

impl Default for AgentDefaults {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
            server: DEFAULT_SERVER.to_string(),
            port: DEFAULT_PORT,
            node_name: FALLBACK_NODE_NAME.to_string(),
        }
    }
}

/// Explicit call-time values. `None` defers to the config file, then to
/// [`AgentDefaults`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentOverrides {
    pub host: Option<String>,
    /// `address` or `address:port`; only the first comma-separated entry is used.
    pub server: Option<String>,
    pub port: Option<u16>,
    pub time: Option<i64>,
    pub config_path: Option<PathBuf>,
    /// When false the agent config file is not read at all.
    pub read_config: bool,
}

impl Default for AgentOverrides {
    fn default() -> Self {
        Self {
            host: None,
            server: None,
            port: None,
            time: None,
            config_path: None,
            read_config: true,
        }
    }
}

/// Effective agent identity and trapper endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub host: String,
    pub server: String,
    pub port: u16,
    /// Reference clock, epoch seconds.
    pub time: i64,
    /// Every directive of the config file not consumed above.
    pub raw: HashMap<String, String>,
}

impl AgentConfig {
    /// Read the agent config file (unless disabled) and resolve.
    pub fn load(overrides: &AgentOverrides, defaults: &AgentDefaults) -> Self {
        let config = if overrides.read_config {
            let path = overrides
                .config_path
                .as_ref()
                .unwrap_or(&defaults.config_path);
            parse_file_kvp(path)
        } else {
            HashMap::new()
        };

        resolve(overrides, &config, defaults)
    }

    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig::new(self.server.clone(), self.port)
    }
}
