mod cli;
mod validation;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Cli(#[from] clap::Error),
    #[error("Sending failed. {0}")]
    Conflict(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub use cli::Config;
