pub mod config;
pub mod initialization;
pub mod input;
pub mod logging_system;

pub use config::{Config, ConfigError};
pub use initialization::{InitializationError, LogLevel};
pub use input::{InputError, InputLine, parse_line};
pub use logging_system::{LoggingSystem, build_logging_system, setup_logging_safe};

use crate::agent::{AgentConfig, AgentDefaults};
use crate::buffer::BatchKind;
use crate::domain::TrapperError;
use crate::sender::{SendOutcome, TrapperSender};
use clap::error::ErrorKind;
use std::io::Write;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{debug, error, info};

/// Exit status for argument, input and setup failures.
pub const EXIT_FAILURE: i32 = 1;

/// `--input-file` value that reads standard input.
pub const STDIN_MARKER: &str = "-";

pub struct App {
    config: Config,
    sender: TrapperSender,
}

impl App {
    pub fn from_args<I, T>(args: I, defaults: &AgentDefaults) -> Result<Self, TrapperError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let config = Config::from_args(args)?;
        Ok(Self::from_config(config, defaults))
    }

    pub fn from_config(config: Config, defaults: &AgentDefaults) -> Self {
        let agent = AgentConfig::load(&config.agent_overrides(), defaults);
        let transport = config.transport_config(&agent);
        info!("Reporting as {} to {}", agent.host, transport.endpoint());

        Self {
            sender: TrapperSender::with_transport(agent, transport),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sender(&self) -> &TrapperSender {
        &self.sender
    }

    /// Queue and send what the command line asks for. Returns the exit
    /// status: the code of the last send cycle, or 0 when nothing was sent.
    pub async fn run<W>(&mut self, out: &mut W) -> Result<i32, TrapperError>
    where
        W: Write + Send,
    {
        let mut last = None;

        if let Some(key) = self.config.key.clone() {
            let value = self.config.value.clone().unwrap_or_default();
            self.sender.add_item(&key, &value)?;
            last = self.send(out).await?;
        } else if let Some(path) = self.config.input_file.clone() {
            last = self.run_input(&path, out).await?;
        }

        Ok(last.map_or(0, |outcome| outcome.exit_code()))
    }

    async fn run_input<W>(
        &mut self,
        path: &Path,
        out: &mut W,
    ) -> Result<Option<SendOutcome>, TrapperError>
    where
        W: Write + Send,
    {
        let reader = open_input(path).await?;
        let mut lines = BufReader::new(reader).lines();
        let mut line_no = 0;
        let mut last = None;

        loop {
            let line = lines.next_line().await.map_err(|source| InputError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            let Some(line) = line else {
                break;
            };
            line_no += 1;

            let Some(entry) = parse_line(&line, line_no, self.config.with_timestamps)? else {
                continue;
            };
            self.sender
                .add_item_with(&entry.key, &entry.value, entry.host.as_deref(), entry.clock)?;

            if self.config.real_time {
                last = self.send(out).await?;
                self.sender.clear();
            }
        }

        debug!("Read {} input lines from {}", line_no, path.display());
        if !self.config.real_time {
            last = self.send(out).await?;
        }
        Ok(last)
    }

    async fn send<W>(&mut self, out: &mut W) -> Result<Option<SendOutcome>, TrapperError>
    where
        W: Write + Send,
    {
        let outcomes = self
            .sender
            .send_with_output(BatchKind::Items, self.config.send_options(), out)
            .await?;

        for outcome in &outcomes {
            self.report(outcome, out)?;
        }
        Ok(outcomes.into_iter().last())
    }

    fn report<W: Write>(&self, outcome: &SendOutcome, out: &mut W) -> Result<(), TrapperError> {
        if self.config.quiet || self.config.verbose == 0 {
            return Ok(());
        }

        match outcome.body.info() {
            Some(info) => writeln!(out, "info from server: \"{info}\"")?,
            None => writeln!(out, "{}", outcome.body)?,
        }
        if self.config.verbose > 1 {
            match &outcome.entry {
                Some(entry) => writeln!(out, "{entry}: code {}", outcome.code)?,
                None => writeln!(out, "code {}", outcome.code)?,
            }
        }
        Ok(())
    }
}

async fn open_input(path: &Path) -> Result<Box<dyn AsyncRead + Unpin + Send>, InputError> {
    if path == Path::new(STDIN_MARKER) {
        return Ok(Box::new(tokio::io::stdin()));
    }

    let file = File::open(path).await.map_err(|source| InputError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Box::new(file))
}

pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Print a clap error (or help/version text) and map it to an exit status.
fn report_cli_error(e: &clap::Error) -> i32 {
    if let Err(print_err) = e.print() {
        debug!("Failed to print argument error: {}", print_err);
    }
    match e.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        _ => EXIT_FAILURE,
    }
}

/// Parse the process arguments, run, and return the exit status.
pub async fn main() -> i32 {
    let config = match Config::from_args(std::env::args_os()) {
        Ok(config) => config,
        Err(ConfigError::Cli(e)) => return report_cli_error(&e),
        Err(e) => {
            eprintln!("{e}");
            return EXIT_FAILURE;
        }
    };

    if let Err(e) = setup_logging_safe(config.log_level(), &config.log_directives) {
        eprintln!("{e}");
    }
    debug!("trapper-sender v{}", get_version());

    let defaults = AgentDefaults::detect();
    let mut app = App::from_config(config, &defaults);
    let mut stdout = std::io::stdout();

    match app.run(&mut stdout).await {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            if !app.config().quiet {
                eprintln!("{e}");
            }
            EXIT_FAILURE
        }
    }
}
