// Specific pedantic lints enforced (not blanket allow):
#![deny(
    clippy::explicit_iter_loop,
    clippy::manual_let_else,
    clippy::semicolon_if_nothing_returned,
    clippy::inconsistent_struct_constructor
)]
#![allow(
    clippy::cast_lossless,
    clippy::cast_possible_truncation, // u32 wire lengths, bounded payloads
    clippy::missing_errors_doc,
    clippy::module_name_repetitions, // e.g. TransportError in sender::transport
    clippy::must_use_candidate,
    clippy::doc_markdown
)]

pub mod agent;
pub mod app;
pub mod buffer;
pub mod collector;
pub mod domain;
pub mod sender;

pub use agent::{AgentConfig, AgentDefaults, AgentOverrides};
pub use buffer::{BatchError, BatchKind, ItemBatch};
pub use domain::{DiscoveryEntry, MacroPair, MetricItem, TrapperError};
pub use sender::{AckCode, SendOptions, SendOutcome, TrapperSender};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
