use super::initialization::{InitializationError, LogDirective, LogLevel};
use parking_lot::{Mutex, RwLock, const_mutex};
use std::sync::{Arc, Once};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Dependency targets held at `warn` whatever the verbosity.
const QUIET_TARGETS: [&str; 2] = ["tokio", "mio"];

pub struct LoggingSystem {
    directives: Arc<RwLock<Vec<LogDirective>>>,
}

impl LoggingSystem {
    pub fn new() -> Self {
        Self {
            directives: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn add_directive(&self, directive: &str) -> Result<(), InitializationError> {
        let directive = LogDirective::parse(directive)?;
        self.directives.write().push(directive);
        Ok(())
    }

    pub fn add_default_directives(&self) {
        let mut directives = self.directives.write();
        for target in QUIET_TARGETS {
            directives.push(LogDirective::new(target, LogLevel::Warn));
        }
    }

    /// Default level first, then every directive in insertion order.
    pub fn build_filter_string(&self, default_level: LogLevel) -> String {
        let directives = self.directives.read();

        let mut parts = Vec::with_capacity(directives.len() + 1);
        parts.push(default_level.as_str().to_string());
        parts.extend(directives.iter().map(LogDirective::to_filter_string));
        parts.join(",")
    }

    /// `RUST_LOG` when set and valid, otherwise the built filter.
    pub fn env_filter(&self, default_level: LogLevel) -> Result<EnvFilter, InitializationError> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }

        let filter_string = self.build_filter_string(default_level);
        EnvFilter::try_new(&filter_string).map_err(|e| InitializationError::LoggingInitFailed {
            details: format!("Failed to create EnvFilter with '{filter_string}'"),
            source: Box::new(e),
        })
    }

    /// Install the global subscriber: compact lines on stderr.
    pub fn initialize_tracing(&self, default_level: LogLevel) -> Result<(), InitializationError> {
        let subscriber = tracing_subscriber::registry()
            .with(self.env_filter(default_level)?)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_level(true)
                    .compact(),
            );

        tracing::subscriber::set_global_default(subscriber).map_err(|e| {
            InitializationError::LoggingInitFailed {
                details: "Failed to set global tracing subscriber".to_string(),
                source: Box::new(e),
            }
        })
    }
}

impl Default for LoggingSystem {
    fn default() -> Self {
        Self::new()
    }
}

/// Default directives followed by the caller's `target=level` directives.
pub fn build_logging_system(directives: &[String]) -> Result<LoggingSystem, InitializationError> {
    let logging_system = LoggingSystem::new();
    logging_system.add_default_directives();
    for directive in directives {
        logging_system.add_directive(directive)?;
    }
    Ok(logging_system)
}

/// Install logging once per process. Later calls report the outcome of the
/// first one without reinstalling.
pub fn setup_logging_safe(
    level: LogLevel,
    directives: &[String],
) -> Result<(), InitializationError> {
    static INIT: Once = Once::new();
    static INIT_FAILURE: Mutex<Option<String>> = const_mutex(None);

    INIT.call_once(|| {
        let result = build_logging_system(directives)
            .and_then(|logging_system| logging_system.initialize_tracing(level));

        if let Err(e) = result {
            *INIT_FAILURE.lock() = Some(e.to_string());
        }
    });

    match INIT_FAILURE.lock().as_ref() {
        None => Ok(()),
        Some(details) => Err(InitializationError::LoggingInitFailed {
            details: details.clone(),
            source: Box::new(std::io::Error::other("logging already failed to initialize")),
        }),
    }
}
