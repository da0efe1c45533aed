use super::ack::{self, AckCode, AckResult};
use super::serialization::{
    BatchSerializer, EncodedRequest, LENGTH_FIELD_LEN, PROTOCOL_HEADER, SendEnvelope,
    SerializationError,
};
use super::transport::{TcpTransport, TransportError, TrapperConnection};
use std::io;
use std::time::Instant;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Upper bound on a declared ack payload; anything larger is treated as a
/// corrupt length field.
pub const MAX_RESPONSE_LEN: usize = 16 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum TransmissionError {
    #[error("Serialization failed: {0}")]
    SerializationFailed(#[from] SerializationError),
    #[error("Failed to write queued entries: {0}")]
    Output(#[from] io::Error),
}

/// Where the current (or last) send cycle is.
///
/// `Done` means an outcome was decoded from the server, whatever its code.
/// `Failed` means a transport fault ended the cycle first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendPhase {
    Idle,
    Encoding,
    Sending,
    AwaitingAck,
    Done,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransmissionStats {
    pub attempts: u64,
    pub accepted: u64,
    pub partially_failed: u64,
    pub unparseable: u64,
    pub protocol_errors: u64,
    pub transport_faults: u64,
}

impl TransmissionStats {
    fn record(&mut self, code: AckCode) {
        self.attempts += 1;
        match code {
            AckCode::Success => self.accepted += 1,
            AckCode::Failed => self.partially_failed += 1,
            AckCode::Unparseable => self.unparseable += 1,
            AckCode::InvalidProtocol => self.protocol_errors += 1,
            AckCode::ReadFailed | AckCode::ConnectFailed => self.transport_faults += 1,
        }
    }
}

/// Runs connect / send / ack cycles against one trapper endpoint.
#[derive(Debug)]
pub struct BatchTransmitter {
    transport: TcpTransport,
    serializer: BatchSerializer,
    phase: SendPhase,
    stats: TransmissionStats,
}

impl BatchTransmitter {
    pub fn new(transport: TcpTransport) -> Self {
        Self {
            transport,
            serializer: BatchSerializer::new(),
            phase: SendPhase::Idle,
            stats: TransmissionStats::default(),
        }
    }

    pub fn transport(&self) -> &TcpTransport {
        &self.transport
    }

    pub fn phase(&self) -> SendPhase {
        self.phase
    }

    pub fn stats(&self) -> &TransmissionStats {
        &self.stats
    }

    /// One full cycle on a fresh connection.
    pub async fn transmit(
        &mut self,
        envelope: &SendEnvelope<'_>,
    ) -> Result<AckResult, SerializationError> {
        let attempt_id = Uuid::new_v4();
        let start = Instant::now();

        self.phase = SendPhase::Encoding;
        let request = match self.serializer.encode_envelope(envelope) {
            Ok(request) => request,
            Err(e) => {
                self.phase = SendPhase::Failed;
                return Err(e);
            }
        };
        debug!(
            "Attempt {} encoded {} payload bytes",
            attempt_id,
            request.payload.len()
        );

        self.phase = SendPhase::Sending;
        let result = match self.transport.connect().await {
            Ok(mut conn) => {
                let exchanged = exchange(&mut conn, &request, &mut self.phase).await;
                conn.close().await;
                exchanged
            }
            Err(e) => Err(e),
        };

        let result = match result {
            Ok(result) => {
                self.phase = SendPhase::Done;
                result
            }
            Err(e) => {
                self.phase = SendPhase::Failed;
                error!(
                    "Attempt {} to {} failed: {}",
                    attempt_id,
                    self.transport.config().endpoint(),
                    e
                );
                AckResult::diagnostic(e.code(), format!("{e}\n"))
            }
        };

        self.stats.record(result.code);
        match result.code {
            AckCode::Success => info!(
                "Attempt {} accepted by {} in {:?}",
                attempt_id,
                self.transport.config().endpoint(),
                start.elapsed()
            ),
            AckCode::Failed => {
                warn!(
                    "Attempt {}: server reported {} failed entries",
                    attempt_id,
                    result.failed.unwrap_or_default()
                );
                debug!("Rejected payload: {}", request.payload);
            }
            AckCode::Unparseable => warn!(
                "Attempt {}: unable to parse server response: {}",
                attempt_id, result.body
            ),
            AckCode::InvalidProtocol => warn!(
                "Attempt {}: invalid response header from {}",
                attempt_id,
                self.transport.config().endpoint()
            ),
            AckCode::ReadFailed | AckCode::ConnectFailed => {}
        }

        Ok(result)
    }
}

/// Write `request` and read the server's ack on an open connection.
///
/// A response with the wrong header is an outcome (code 253), not an error;
/// only transport faults come back as `Err`.
pub async fn exchange<S>(
    conn: &mut TrapperConnection<S>,
    request: &EncodedRequest,
    phase: &mut SendPhase,
) -> Result<AckResult, TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    conn.send_frame(&request.frame).await?;
    *phase = SendPhase::AwaitingAck;

    let header = conn.recv_exact(PROTOCOL_HEADER.len()).await?;
    if !ack::is_valid_header(&header) {
        return Ok(ack::invalid_header(&request.payload));
    }

    let field: [u8; LENGTH_FIELD_LEN] = conn
        .recv_exact(LENGTH_FIELD_LEN)
        .await?
        .try_into()
        .map_err(|_| TransportError::Read("malformed length field".to_string()))?;

    let length = ack::declared_length(&field) as usize;
    if length > MAX_RESPONSE_LEN {
        return Err(TransportError::Read(format!(
            "declared response length {length} exceeds {MAX_RESPONSE_LEN} bytes"
        )));
    }

    let payload = conn.recv_exact(length).await?;
    Ok(ack::interpret_payload(&payload))
}
