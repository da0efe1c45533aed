pub mod mysql;

pub use mysql::{MetricsSource, MysqlSnapshot, SchemaSize, collect, queue_snapshot};

use crate::buffer::BatchError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("Metrics source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("Failed to queue collected value: {0}")]
    Batch(#[from] BatchError),
}
