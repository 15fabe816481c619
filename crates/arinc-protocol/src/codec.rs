//! Codec errors and JSON encoding.
//!
//! Telemetry leaves the process as JSON text, either as WebSocket text
//! frames or as HTTP request bodies. Word-level failures and message-level
//! failures share one error type.

use arinc_core::Field;
use serde::Serialize;
use thiserror::Error;

/// Errors that can occur while encoding or decoding telemetry.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Engineering value outside the field's envelope.
    #[error("{field} value {value} is outside its envelope")]
    Range { field: Field, value: f64 },

    /// Word carries a label that maps to no field.
    #[error("Unknown label: {0:#04X}")]
    UnknownLabel(u8),

    /// Raw word has an even number of set bits.
    #[error("Parity check failed for word {0:#010X}")]
    Parity(u32),

    /// Wire record could not be parsed back into a word.
    #[error("Malformed word record: {0}")]
    Malformed(String),

    /// JSON serialization failed.
    #[error("Failed to serialize message: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Encode any wire message to a JSON string.
pub fn encode_message<T: Serialize>(msg: &T) -> Result<String, CodecError> {
    serde_json::to_string(msg).map_err(CodecError::from)
}
