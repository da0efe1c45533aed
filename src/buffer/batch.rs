use super::error::BatchError;
use crate::domain::{DiscoveryEntry, DiscoveryKey, MacroPair, MetricItem};
use std::collections::HashMap;
use tracing::debug;

/// Which collection of the batch an envelope is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchKind {
    Items,
    Discovery,
}

/// In-memory collection of queued metric items and discovery entries.
///
/// Items are kept in call order with no deduplication. Discovery entries are
/// merged per (host, key): later calls append to the existing sequence.
/// Nothing is removed implicitly; call [`ItemBatch::clear`] after a send when
/// the queued entries should not go out again.
#[derive(Debug, Clone)]
pub struct ItemBatch {
    default_host: String,
    reference_clock: i64,
    items: Vec<MetricItem>,
    discovery: Vec<DiscoveryEntry>,
    discovery_index: HashMap<DiscoveryKey, usize>,
}

impl ItemBatch {
    pub fn new(default_host: impl Into<String>, reference_clock: i64) -> Self {
        Self {
            default_host: default_host.into(),
            reference_clock,
            items: Vec::new(),
            discovery: Vec::new(),
            discovery_index: HashMap::new(),
        }
    }

    pub fn default_host(&self) -> &str {
        &self.default_host
    }

    /// Clock used for items without their own and for the envelope header.
    pub fn reference_clock(&self) -> i64 {
        self.reference_clock
    }

    /// Queue an item for the default host at the reference clock.
    pub fn add_item(&mut self, key: &str, value: &str) -> Result<(), BatchError> {
        self.add_item_with(key, value, None, None)
    }

    pub fn add_item_with(
        &mut self,
        key: &str,
        value: &str,
        host: Option<&str>,
        clock: Option<i64>,
    ) -> Result<(), BatchError> {
        if key.is_empty() {
            return Err(BatchError::MissingField { field: "key" });
        }
        if value.is_empty() {
            return Err(BatchError::MissingField { field: "value" });
        }

        let item = MetricItem::new(
            host.unwrap_or(&self.default_host),
            key,
            value,
            clock.unwrap_or(self.reference_clock),
        );
        debug!("Queued item {} for host {}", item.key, item.host);
        self.items.push(item);
        Ok(())
    }

    /// Queue discovery pairs for `key` on the default host.
    pub fn add_discovery<I, P>(&mut self, key: &str, entries: I) -> Result<(), BatchError>
    where
        I: IntoIterator<Item = P>,
        P: Into<MacroPair>,
    {
        self.add_discovery_for(None, key, entries)
    }

    /// Queue discovery pairs for (`host`, `key`).
    ///
    /// An empty `entries` declares the key with an empty sequence, replacing
    /// whatever was accumulated before. Pairs without a macro name are
    /// skipped; if none survive, the call is rejected.
    pub fn add_discovery_for<I, P>(
        &mut self,
        host: Option<&str>,
        key: &str,
        entries: I,
    ) -> Result<(), BatchError>
    where
        I: IntoIterator<Item = P>,
        P: Into<MacroPair>,
    {
        if key.is_empty() {
            return Err(BatchError::MissingField { field: "key" });
        }

        let id = DiscoveryKey::new(host.unwrap_or(&self.default_host), key);
        let mut offered = 0usize;
        let surviving: Vec<MacroPair> = entries
            .into_iter()
            .map(Into::into)
            .inspect(|_| offered += 1)
            .filter(MacroPair::is_conforming)
            .collect();

        if offered == 0 {
            let slot = self.entry_mut(id);
            slot.pairs.clear();
            return Ok(());
        }

        if surviving.is_empty() {
            return Err(BatchError::NoConformingPairs { key: id.to_string() });
        }

        debug!(
            "Queued {} discovery pairs for {} ({} skipped)",
            surviving.len(),
            id,
            offered - surviving.len()
        );
        self.entry_mut(id).pairs.extend(surviving);
        Ok(())
    }

    fn entry_mut(&mut self, id: DiscoveryKey) -> &mut DiscoveryEntry {
        let index = match self.discovery_index.get(&id).copied() {
            Some(index) => index,
            None => {
                self.discovery.push(DiscoveryEntry::new(id.clone()));
                let index = self.discovery.len() - 1;
                self.discovery_index.insert(id, index);
                index
            }
        };
        &mut self.discovery[index]
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn discovery_key_count(&self) -> usize {
        self.discovery.len()
    }

    pub fn items(&self) -> &[MetricItem] {
        &self.items
    }

    /// Discovery entries in first-seen order.
    pub fn discovery(&self) -> &[DiscoveryEntry] {
        &self.discovery
    }

    pub fn discovery_entry(&self, host: &str, key: &str) -> Option<&DiscoveryEntry> {
        self.discovery_index
            .get(&DiscoveryKey::new(host, key))
            .map(|&index| &self.discovery[index])
    }

    pub fn is_empty(&self, kind: BatchKind) -> bool {
        match kind {
            BatchKind::Items => self.items.is_empty(),
            BatchKind::Discovery => self.discovery.is_empty(),
        }
    }

    /// Drop every queued item and discovery entry.
    pub fn clear(&mut self) {
        self.items.clear();
        self.discovery.clear();
        self.discovery_index.clear();
    }
}
