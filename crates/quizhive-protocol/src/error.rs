//! Error types for the protocol layer.
//!
//! Each crate in QuizHive defines its own error enum, so a
//! `ProtocolError` always means a serialization problem — never
//! networking or lobby state.

/// Errors that can occur while encoding or decoding wire events.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed. Common causes: malformed JSON, an unknown
    /// `event` tag, missing fields, or wrong field types.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message parsed but violates a protocol rule — e.g. a `hello`
    /// carrying neither a token nor a guest name.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
