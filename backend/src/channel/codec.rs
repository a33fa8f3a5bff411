//! Serialization strategy for channel payloads

use shared::{ReadingMessage, MESSAGE_SCHEMA_VERSION};

use crate::error::{AppError, AppResult};

/// Encodes reading messages to bytes and back
pub trait MessageCodec: Send + Sync {
    fn encode(&self, message: &ReadingMessage) -> AppResult<Vec<u8>>;

    fn decode(&self, payload: &[u8]) -> AppResult<ReadingMessage>;
}

/// camelCase JSON envelope, schema version 1
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl MessageCodec for JsonCodec {
    fn encode(&self, message: &ReadingMessage) -> AppResult<Vec<u8>> {
        serde_json::to_vec(message)
            .map_err(|e| AppError::Codec(format!("Failed to encode message: {}", e)))
    }

    fn decode(&self, payload: &[u8]) -> AppResult<ReadingMessage> {
        let message: ReadingMessage = serde_json::from_slice(payload)
            .map_err(|e| AppError::Codec(format!("Failed to decode message: {}", e)))?;

        if message.schema_version != MESSAGE_SCHEMA_VERSION {
            return Err(AppError::Codec(format!(
                "Unsupported schema version {}",
                message.schema_version
            )));
        }
        Ok(message)
    }
}
