use thiserror::Error;

/// Top-level error type surfaced by the binary.
///
/// Protocol outcomes (partial failure, unparseable ack, transport faults) are
/// not errors: they travel as `SendOutcome` values.
#[derive(Error, Debug)]
pub enum TrapperError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::app::ConfigError),

    #[error("Input error: {0}")]
    Input(#[from] crate::app::InputError),

    #[error("Logging error: {0}")]
    Logging(#[from] crate::app::InitializationError),

    #[error("Rejected entry: {0}")]
    Batch(#[from] crate::buffer::BatchError),

    #[error("Send error: {0}")]
    Transmission(#[from] crate::sender::TransmissionError),

    #[error("Collector error: {0}")]
    Collector(#[from] crate::collector::CollectorError),

    #[error("Output error: {0}")]
    Output(#[from] std::io::Error),
}

