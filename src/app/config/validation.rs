use super::{Config, ConfigError};
use crate::app::initialization::LogDirective;

impl Config {
    /// Argument combinations clap cannot express on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.key.is_some() && self.input_file.is_some() {
            return Err(ConfigError::Conflict(
                "-k and -i cannot be used together.".to_string(),
            ));
        }

        if self.key.is_some() && self.value.is_none() {
            return Err(ConfigError::Conflict("-k requires -o.".to_string()));
        }

        if self.value.is_some() && self.key.is_none() {
            return Err(ConfigError::Conflict("-o requires -k.".to_string()));
        }

        if self.key.is_none() && self.input_file.is_none() {
            return Err(ConfigError::InvalidConfig(
                "nothing to send, use -k/-o or -i".to_string(),
            ));
        }

        if self.input_file.is_none() && (self.with_timestamps || self.real_time) {
            return Err(ConfigError::InvalidConfig(
                "-T and -r only apply to -i".to_string(),
            ));
        }

        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "Timeout must be greater than 0".to_string(),
            ));
        }

        for directive in &self.log_directives {
            LogDirective::parse(directive)
                .map_err(|e| ConfigError::InvalidConfig(e.to_string()))?;
        }

        Ok(())
    }
}
