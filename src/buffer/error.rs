use thiserror::Error;

/// Validation failures on add-item / add-discovery. The batch is left
/// unchanged whenever one of these is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    #[error("Missing field: {field}")]
    MissingField { field: &'static str },

    #[error("No conforming macro pairs for discovery key '{key}'")]
    NoConformingPairs { key: String },
}
