use super::ConfigError;
use crate::agent::{AgentConfig, AgentOverrides};
use crate::app::initialization::LogLevel;
use crate::sender::{SendOptions, TransportConfig};
use clap::Parser;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "Send one or more key/value pairs to a trapper server.",
    long_about = None
)]
pub struct Config {
    /// Agent configuration file. Default is /etc/zabbix/zabbix_agentd.conf
    #[arg(short = 'c', long = "config", env = "TRAPPER_AGENT_CONFIG", value_name = "FILE")]
    pub agent_config: Option<PathBuf>,

    /// Do not read the agent configuration file
    #[arg(long)]
    pub no_agent_config: bool,

    /// Hostname or IP address of the server, optionally `address:port`
    #[arg(short = 'z', long = "zabbix-server", env = "TRAPPER_SERVER", value_name = "SERVER")]
    pub server: Option<String>,

    /// Trapper port on the server. Default is 10051
    #[arg(
        short = 'p',
        long,
        env = "TRAPPER_PORT",
        value_name = "PORT",
        value_parser = clap::value_parser!(u16).range(1..)
    )]
    pub port: Option<u16>,

    /// Host name the values are reported for
    #[arg(short = 's', long = "host", env = "TRAPPER_HOST", value_name = "HOSTNAME")]
    pub host: Option<String>,

    /// Source IP address to connect from
    #[arg(short = 'I', long, value_name = "IP")]
    pub source_address: Option<IpAddr>,

    /// Item key
    #[arg(short = 'k', long, value_name = "KEY")]
    pub key: Option<String>,

    /// Item value
    #[arg(short = 'o', long, value_name = "VALUE")]
    pub value: Option<String>,

    /// Load values from a file, `-` for standard input. Each line holds
    /// `<hostname> <key> <value>`; `-` as hostname uses the default host
    #[arg(short = 'i', long, value_name = "FILE")]
    pub input_file: Option<PathBuf>,

    /// Input lines carry a timestamp: `<hostname> <key> <timestamp> <value>`
    #[arg(short = 'T', long)]
    pub with_timestamps: bool,

    /// Send every input line as soon as it is read
    #[arg(short = 'r', long)]
    pub real_time: bool,

    /// Print the queued values instead of sending them
    #[arg(long)]
    pub dry_run: bool,

    /// Connect/read timeout in seconds
    #[arg(long, env = "TRAPPER_TIMEOUT", default_value = "5")]
    pub timeout_secs: u64,

    /// Verbose mode, -vv for more details
    #[arg(short = 'v', long, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Disable all output
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Extra `target=level` log filter, repeatable. Ignored when RUST_LOG is set
    #[arg(long = "log-directive", value_name = "TARGET=LEVEL")]
    pub log_directives: Vec<String>,

    /// Derived from `timeout_secs`
    #[arg(skip)]
    pub timeout: Duration,
}

impl Config {
    pub fn from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let mut config = Config::try_parse_from(args)?;
        config.post_process();
        config.validate()?;
        Ok(config)
    }

    pub fn post_process(&mut self) {
        self.timeout = Duration::from_secs(self.timeout_secs);
    }

    pub fn log_level(&self) -> LogLevel {
        LogLevel::from_verbosity(self.quiet, self.verbose)
    }

    pub fn agent_overrides(&self) -> AgentOverrides {
        AgentOverrides {
            host: self.host.clone(),
            server: self.server.clone(),
            port: self.port,
            time: None,
            config_path: self.agent_config.clone(),
            read_config: !self.no_agent_config,
        }
    }

    pub fn transport_config(&self, agent: &AgentConfig) -> TransportConfig {
        TransportConfig {
            timeout: self.timeout,
            source_address: self.source_address,
            ..agent.transport_config()
        }
    }

    pub fn send_options(&self) -> SendOptions {
        SendOptions {
            print_only: self.dry_run,
            iterate_each: false,
        }
    }
}
