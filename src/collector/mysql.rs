//! MySQL/MariaDB health snapshot and its mapping onto trapper items.

use super::CollectorError;
use crate::domain::MacroPair;
use crate::sender::TrapperSender;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

pub const STATUS_KEY: &str = "mysql.status";
pub const VARIABLE_KEY: &str = "mysql.variable";
pub const SIZE_KEY: &str = "mysql.size";
pub const DISCOVERY_KEY: &str = "mysql.db.discovery";
pub const DBNAME_MACRO: &str = "{#DBNAME}";

/// On-disk footprint of one schema's InnoDB tables, in bytes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaSize {
    pub data_length: u64,
    pub index_length: u64,
    pub total_length: u64,
    /// Highest AUTO_INCREMENT usage across the schema's tables, as a
    /// percentage of the column type's range. `None` without such columns.
    pub max_autoincrement_pct: Option<f64>,
}

/// Raw values read from one server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MysqlSnapshot {
    pub on_disk_size: BTreeMap<String, SchemaSize>,
    pub status: BTreeMap<String, String>,
    pub variables: BTreeMap<String, String>,
}

#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn snapshot(&self) -> Result<MysqlSnapshot, CollectorError>;
}

/// Queue every value of `snapshot` on `sender`, plus one discovery entry
/// listing the schemas. Empty values are skipped. Returns the number of items
/// queued.
pub fn queue_snapshot(
    snapshot: &MysqlSnapshot,
    sender: &mut TrapperSender,
) -> Result<usize, CollectorError> {
    let mut queued = 0;

    for (name, value) in &snapshot.status {
        queued += queue_value(sender, &format!("{STATUS_KEY}[{name}]"), value)?;
    }
    for (name, value) in &snapshot.variables {
        queued += queue_value(sender, &format!("{VARIABLE_KEY}[{name}]"), value)?;
    }

    for (schema, size) in &snapshot.on_disk_size {
        let fields = [
            ("data_length", Some(size.data_length.to_string())),
            ("index_length", Some(size.index_length.to_string())),
            ("total_length", Some(size.total_length.to_string())),
            (
                "max_autoincrement_pct",
                size.max_autoincrement_pct.map(|pct| format!("{pct:.4}")),
            ),
        ];
        for (field, value) in fields {
            if let Some(value) = value {
                queued += queue_value(sender, &format!("{SIZE_KEY}[{schema},{field}]"), &value)?;
            }
        }
    }

    let pairs: Vec<MacroPair> = snapshot
        .on_disk_size
        .keys()
        .map(|schema| MacroPair::new(DBNAME_MACRO, schema.as_str()))
        .collect();
    sender.add_discovery(DISCOVERY_KEY, pairs)?;

    debug!(
        "Queued {} MySQL items and {} schemas for discovery",
        queued,
        snapshot.on_disk_size.len()
    );
    Ok(queued)
}

fn queue_value(sender: &mut TrapperSender, key: &str, value: &str) -> Result<usize, CollectorError> {
    if value.is_empty() {
        debug!("Skipping {} with empty value", key);
        return Ok(0);
    }
    sender.add_item(key, value)?;
    Ok(1)
}

/// Pull a snapshot from `source` and queue it.
pub async fn collect<S>(source: &S, sender: &mut TrapperSender) -> Result<usize, CollectorError>
where
    S: MetricsSource + ?Sized,
{
    let snapshot = source.snapshot().await?;
    queue_snapshot(&snapshot, sender)
}
