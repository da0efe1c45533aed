//! Request side of the trapper wire protocol.
//!
//! ```text
//! ┌──────────────┬─────────────┬──────────────┬──────────────┬─────────────┐
//! │ "ZBXD" (4)   │ version (1) │ length (4)   │ reserved (4) │ JSON ...    │
//! │              │ 0x01        │ little-endian│ zero         │             │
//! └──────────────┴─────────────┴──────────────┴──────────────┴─────────────┘
//! ```

use crate::buffer::{BatchKind, ItemBatch};
use crate::domain::{DiscoveryEntry, MetricItem};
use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};
use thiserror::Error;

/// Magic plus protocol version, first five bytes of every frame.
pub const PROTOCOL_HEADER: [u8; 5] = *b"ZBXD\x01";
/// Length field: 4-byte little-endian payload length followed by 4 zero bytes.
pub const LENGTH_FIELD_LEN: usize = 8;
pub const FRAME_PREFIX_LEN: usize = PROTOCOL_HEADER.len() + LENGTH_FIELD_LEN;

const REQUEST_SENDER_DATA: &str = "sender data";

#[derive(Error, Debug)]
pub enum SerializationError {
    #[error("JSON serialization failed: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Payload of {0} bytes does not fit the length field")]
    PayloadTooLarge(usize),
}

/// The JSON object sent to the trapper.
///
/// `clock` is left out entirely when there is nothing to send, and `data`
/// becomes `{}` rather than `[]`; servers reject the other shapes.
#[derive(Debug, Serialize)]
pub struct SendEnvelope<'a> {
    request: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    clock: Option<i64>,
    data: EnvelopeData<'a>,
}

#[derive(Debug)]
enum EnvelopeData<'a> {
    Items(&'a [MetricItem]),
    Discovery(&'a [DiscoveryEntry]),
    Empty,
}

impl Serialize for EnvelopeData<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            EnvelopeData::Items(items) => serializer.collect_seq(items.iter()),
            EnvelopeData::Discovery(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for entry in entries.iter() {
                    map.serialize_entry(&entry.id.to_string(), &entry.pairs)?;
                }
                map.end()
            }
            EnvelopeData::Empty => serializer.serialize_map(Some(0))?.end(),
        }
    }
}

impl<'a> SendEnvelope<'a> {
    pub fn items(items: &'a [MetricItem], clock: i64) -> Self {
        if items.is_empty() {
            return Self::empty();
        }
        Self {
            request: REQUEST_SENDER_DATA,
            clock: Some(clock),
            data: EnvelopeData::Items(items),
        }
    }

    pub fn discovery(entries: &'a [DiscoveryEntry], clock: i64) -> Self {
        if entries.is_empty() {
            return Self::empty();
        }
        Self {
            request: REQUEST_SENDER_DATA,
            clock: Some(clock),
            data: EnvelopeData::Discovery(entries),
        }
    }

    pub fn empty() -> Self {
        Self {
            request: REQUEST_SENDER_DATA,
            clock: None,
            data: EnvelopeData::Empty,
        }
    }

    pub fn from_batch(kind: BatchKind, batch: &'a ItemBatch, clock: i64) -> Self {
        match kind {
            BatchKind::Items => Self::items(batch.items(), clock),
            BatchKind::Discovery => Self::discovery(batch.discovery(), clock),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.data, EnvelopeData::Empty)
    }
}

/// A serialized envelope together with its framed bytes.
///
/// The JSON payload is kept alongside the frame so diagnostics can echo what
/// was sent.
#[derive(Debug, Clone)]
pub struct EncodedRequest {
    pub payload: String,
    pub frame: Bytes,
}

#[derive(Debug, Clone, Default)]
pub struct BatchSerializer;

impl BatchSerializer {
    pub fn new() -> Self {
        Self
    }

    pub fn serialize_json(&self, envelope: &SendEnvelope<'_>) -> Result<String, SerializationError> {
        serde_json::to_string(envelope).map_err(SerializationError::JsonError)
    }

    pub fn frame(&self, payload: &[u8]) -> Result<Bytes, SerializationError> {
        let length = u32::try_from(payload.len())
            .map_err(|_| SerializationError::PayloadTooLarge(payload.len()))?;

        let mut frame = BytesMut::with_capacity(FRAME_PREFIX_LEN + payload.len());
        frame.put_slice(&PROTOCOL_HEADER);
        frame.put_u32_le(length);
        frame.put_u32_le(0);
        frame.put_slice(payload);
        Ok(frame.freeze())
    }

    pub fn encode_envelope(
        &self,
        envelope: &SendEnvelope<'_>,
    ) -> Result<EncodedRequest, SerializationError> {
        let payload = self.serialize_json(envelope)?;
        let frame = self.frame(payload.as_bytes())?;
        Ok(EncodedRequest { payload, frame })
    }

    /// Build the envelope for `kind` from the whole batch and frame it.
    pub fn encode(
        &self,
        kind: BatchKind,
        batch: &ItemBatch,
        clock: i64,
    ) -> Result<EncodedRequest, SerializationError> {
        self.encode_envelope(&SendEnvelope::from_batch(kind, batch, clock))
    }
}
