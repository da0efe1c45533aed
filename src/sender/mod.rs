pub mod ack;
pub mod serialization;
pub mod transmission;
pub mod transport;

pub use ack::{AckBody, AckCode, AckResult};
pub use serialization::{BatchSerializer, EncodedRequest, SendEnvelope, SerializationError};
pub use transmission::{BatchTransmitter, SendPhase, TransmissionError, TransmissionStats};
pub use transport::{TcpTransport, TransportConfig, TransportError, TrapperConnection};

use crate::agent::AgentConfig;
use crate::buffer::{BatchError, BatchKind, ItemBatch};
use crate::domain::MacroPair;
use std::io::{self, Write};
use std::slice;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// Write the queued entries out instead of talking to the server.
    pub print_only: bool,
    /// One connect/send/ack cycle per queued entry instead of one per batch.
    pub iterate_each: bool,
}

/// Result of one send cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct SendOutcome {
    pub code: AckCode,
    pub failed: Option<u64>,
    pub body: AckBody,
    /// `host,key` of the entry this cycle carried, in iterate-each mode.
    pub entry: Option<String>,
}

impl SendOutcome {
    fn from_ack(result: AckResult, entry: Option<String>) -> Self {
        Self {
            code: result.code,
            failed: result.failed,
            body: result.body,
            entry,
        }
    }

    /// Numeric protocol code, as used for the process exit status.
    pub fn exit_code(&self) -> i32 {
        self.code.as_i32()
    }
}

/// Queues items and discovery data for one agent and pushes them to the
/// trapper.
///
/// A sender owns its batch and drives at most one connection at a time.
/// The batch survives sends; call [`TrapperSender::clear`] to drop it.
#[derive(Debug)]
pub struct TrapperSender {
    agent: AgentConfig,
    batch: ItemBatch,
    transmitter: BatchTransmitter,
}

impl TrapperSender {
    pub fn new(agent: AgentConfig) -> Self {
        let transport = agent.transport_config();
        Self::with_transport(agent, transport)
    }

    pub fn with_transport(agent: AgentConfig, transport: TransportConfig) -> Self {
        let batch = ItemBatch::new(agent.host.clone(), agent.time);
        Self {
            agent,
            batch,
            transmitter: BatchTransmitter::new(TcpTransport::new(transport)),
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.agent
    }

    pub fn batch(&self) -> &ItemBatch {
        &self.batch
    }

    pub fn add_item(&mut self, key: &str, value: &str) -> Result<(), BatchError> {
        self.batch.add_item(key, value)
    }

    pub fn add_item_with(
        &mut self,
        key: &str,
        value: &str,
        host: Option<&str>,
        clock: Option<i64>,
    ) -> Result<(), BatchError> {
        self.batch.add_item_with(key, value, host, clock)
    }

    pub fn add_discovery<I, P>(&mut self, key: &str, entries: I) -> Result<(), BatchError>
    where
        I: IntoIterator<Item = P>,
        P: Into<MacroPair>,
    {
        self.batch.add_discovery(key, entries)
    }

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
        self.batch.add_discovery_for(host, key, entries)
    }

    pub fn item_count(&self) -> usize {
        self.batch.item_count()
    }

    pub fn discovery_key_count(&self) -> usize {
        self.batch.discovery_key_count()
    }

    pub fn clear(&mut self) {
        self.batch.clear();
    }

    /// Phase reached by the last send cycle.
    pub fn phase(&self) -> SendPhase {
        self.transmitter.phase()
    }

    pub fn stats(&self) -> &TransmissionStats {
        self.transmitter.stats()
    }

    /// Send the queued items. Print-only output goes to stdout.
    pub async fn send(
        &mut self,
        options: SendOptions,
    ) -> Result<Vec<SendOutcome>, TransmissionError> {
        self.send_with_output(BatchKind::Items, options, &mut io::stdout())
            .await
    }

    /// Send the queued discovery entries. Print-only output goes to stdout.
    pub async fn send_discovery(
        &mut self,
        options: SendOptions,
    ) -> Result<Vec<SendOutcome>, TransmissionError> {
        self.send_with_output(BatchKind::Discovery, options, &mut io::stdout())
            .await
    }

    /// Send one collection of the batch, writing print-only output to `out`.
    ///
    /// Returns one outcome per cycle: a single one in bulk mode, one per
    /// queued entry with `iterate_each`, none at all with `print_only`.
    pub async fn send_with_output<W>(
        &mut self,
        kind: BatchKind,
        options: SendOptions,
        out: &mut W,
    ) -> Result<Vec<SendOutcome>, TransmissionError>
    where
        W: Write + Send,
    {
        if options.print_only {
            match kind {
                BatchKind::Items => self.print_items(out)?,
                BatchKind::Discovery => self.print_discovery(out)?,
            }
            return Ok(Vec::new());
        }

        let clock = self.batch.reference_clock();
        if !options.iterate_each {
            let envelope = SendEnvelope::from_batch(kind, &self.batch, clock);
            let result = self.transmitter.transmit(&envelope).await?;
            return Ok(vec![SendOutcome::from_ack(result, None)]);
        }

        let mut outcomes = Vec::new();
        match kind {
            BatchKind::Items => {
                debug!("Sending {} items one per cycle", self.batch.item_count());
                for item in self.batch.items() {
                    let envelope = SendEnvelope::items(slice::from_ref(item), clock);
                    let result = self.transmitter.transmit(&envelope).await?;
                    let label = format!("{},{}", item.host, item.key);
                    outcomes.push(SendOutcome::from_ack(result, Some(label)));
                }
            }
            BatchKind::Discovery => {
                debug!(
                    "Sending {} discovery entries one per cycle",
                    self.batch.discovery_key_count()
                );
                for entry in self.batch.discovery() {
                    let envelope = SendEnvelope::discovery(slice::from_ref(entry), clock);
                    let result = self.transmitter.transmit(&envelope).await?;
                    outcomes.push(SendOutcome::from_ack(result, Some(entry.id.to_string())));
                }
            }
        }
        Ok(outcomes)
    }

    /// One `host key clock value` line per queued item.
    pub fn print_items<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for item in self.batch.items() {
            writeln!(out, "{item}")?;
        }
        out.flush()
    }

    /// One `host,key name=value ...` line per discovery entry.
    pub fn print_discovery<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for entry in self.batch.discovery() {
            writeln!(out, "{entry}")?;
        }
        out.flush()
    }
}
