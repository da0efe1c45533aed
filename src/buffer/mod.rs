pub mod batch;
pub mod error;

pub use batch::{BatchKind, ItemBatch};
pub use error::BatchError;
