//! Compact byte encoding for cached ticket records.
//!
//! Records are serialized with bincode and then zstd-compressed.

use thiserror::Error;

use crate::ticket::TicketRecord;

/// Default zstd level (fast).
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// Errors from encoding or decoding a record.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Failed to serialize ticket record: {0}")]
    Serialize(String),

    #[error("Failed to deserialize ticket record: {0}")]
    Deserialize(String),

    #[error("Failed to compress ticket record: {0}")]
    Compress(#[source] std::io::Error),

    #[error("Failed to decompress ticket record: {0}")]
    Decompress(#[source] std::io::Error),
}

/// Encodes and decodes [`TicketRecord`]s to their cached byte form.
#[derive(Debug, Clone, Copy)]
pub struct TicketCodec {
    level: i32,
}

impl TicketCodec {
    /// Create a codec using the given zstd compression level (1-22).
    pub fn new(level: i32) -> Self {
        Self { level }
    }

    pub fn level(&self) -> i32 {
        self.level
    }

    /// Serialize and compress a record.
    pub fn encode(&self, record: &TicketRecord) -> Result<Vec<u8>, CodecError> {
        let raw = bincode::serialize(record).map_err(|e| CodecError::Serialize(e.to_string()))?;
        zstd::encode_all(raw.as_slice(), self.level).map_err(CodecError::Compress)
    }

    /// Decompress and deserialize a record.
    pub fn decode(&self, bytes: &[u8]) -> Result<TicketRecord, CodecError> {
        let raw = zstd::decode_all(bytes).map_err(CodecError::Decompress)?;
        bincode::deserialize(&raw).map_err(|e| CodecError::Deserialize(e.to_string()))
    }
}

impl Default for TicketCodec {
    fn default() -> Self {
        Self::new(DEFAULT_COMPRESSION_LEVEL)
    }
}
