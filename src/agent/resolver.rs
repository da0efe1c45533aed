use super::{AgentConfig, AgentDefaults, AgentOverrides};
use chrono::Utc;
use std::collections::HashMap;
use tracing::{debug, warn};

pub const HOSTNAME_DIRECTIVE: &str = "Hostname";
pub const SERVER_ACTIVE_DIRECTIVE: &str = "ServerActive";
pub const SERVER_DIRECTIVE: &str = "Server";

/// Combine call-time overrides, a parsed agent config mapping and built-in
/// defaults into the effective agent configuration. Never fails.
///
/// Only the first entry of a comma-separated server list is used, and the
/// `address:port` split does not understand IPv6 literals.
pub fn resolve(
    overrides: &AgentOverrides,
    config: &HashMap<String, String>,
    defaults: &AgentDefaults,
) -> AgentConfig {
    let host = match &overrides.host {
        Some(host) => host.clone(),
        None => directive(config, HOSTNAME_DIRECTIVE)
            .map(|value| first_entry(value).0.to_string())
            .unwrap_or_else(|| defaults.node_name.clone()),
    };

    let server_entry = overrides
        .server
        .as_deref()
        .or_else(|| directive(config, SERVER_ACTIVE_DIRECTIVE))
        .or_else(|| directive(config, SERVER_DIRECTIVE))
        .unwrap_or(defaults.server.as_str());
    let (server, listed_port) = first_entry(server_entry);

    let port = match (overrides.port, listed_port) {
        (Some(port), _) => port,
        (None, Some(raw)) => parse_port(raw).unwrap_or_else(|| {
            warn!(
                "Ignoring invalid port '{}' for {}, using {}",
                raw, server, defaults.port
            );
            defaults.port
        }),
        (None, None) => defaults.port,
    };

    let time = overrides.time.unwrap_or_else(|| Utc::now().timestamp());

    let raw: HashMap<String, String> = config
        .iter()
        .filter(|(name, _)| !is_consumed(name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();

    debug!(
        "Resolved agent config: host={} server={}:{} time={}",
        host, server, port, time
    );

    AgentConfig {
        host,
        server: server.to_string(),
        port,
        time,
        raw,
    }
}

fn directive<'a>(config: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    config
        .get(name)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

fn is_consumed(name: &str) -> bool {
    matches!(
        name,
        HOSTNAME_DIRECTIVE | SERVER_ACTIVE_DIRECTIVE | SERVER_DIRECTIVE
    )
}

/// `"a:1, b:2"` -> `("a", Some("1"))`
fn first_entry(value: &str) -> (&str, Option<&str>) {
    let first = value.split(',').next().unwrap_or_default().trim();
    let mut parts = first.split(':');
    let address = parts.next().unwrap_or_default().trim();
    let port = parts.next().map(str::trim);
    (address, port)
}

fn parse_port(raw: &str) -> Option<u16> {
    raw.parse::<u16>().ok().filter(|port| *port != 0)
}
