//! Domain layer for trapper-sender.
//!
//! Contains the canonical types shared across all modules:
//! - `MetricItem`: one metric observation (host, key, value, clock)
//! - `DiscoveryEntry`: accumulated low-level discovery macros for one host/key
//! - `TrapperError`: Top-level error type

pub mod discovery;
pub mod error;
pub mod item;

pub use discovery::{DiscoveryEntry, DiscoveryKey, MacroPair};
pub use error::TrapperError;
pub use item::MetricItem;
