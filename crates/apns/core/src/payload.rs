//! Notification payload encoding.

use bytes::Bytes;

/// Payload could not be rendered as JSON.
#[derive(Debug, thiserror::Error)]
#[error("failed to encode payload as JSON: {0}")]
pub struct EncodingError(#[from] serde_json::Error);

/// A notification payload.
///
/// Text and raw bytes are assumed to already hold JSON and are sent as-is.
/// Only [`Payload::Json`] goes through serialization.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Pre-serialized JSON text.
    Text(String),
    /// Pre-serialized JSON bytes.
    Raw(Vec<u8>),
    /// Structured value, serialized compactly on encode.
    Json(serde_json::Value),
}

impl Payload {
    /// Capture any serializable value as a structured payload.
    ///
    /// Struct fields keep their declared order and map keys keep their
    /// iteration order.
    pub fn structured<T>(value: &T) -> Result<Self, EncodingError>
    where
        T: serde::Serialize + ?Sized,
    {
        Ok(Self::Json(serde_json::to_value(value)?))
    }

    /// Render the wire body.
    pub fn encode(&self) -> Result<Bytes, EncodingError> {
        match self {
            Self::Text(text) => Ok(Bytes::copy_from_slice(text.as_bytes())),
            Self::Raw(raw) => Ok(Bytes::copy_from_slice(raw)),
            Self::Json(value) => Ok(Bytes::from(serde_json::to_vec(value)?)),
        }
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(raw: Vec<u8>) -> Self {
        Self::Raw(raw)
    }
}

impl From<&[u8]> for Payload {
    fn from(raw: &[u8]) -> Self {
        Self::Raw(raw.to_vec())
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}
