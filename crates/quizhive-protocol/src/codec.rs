//! Codec trait and implementations for serializing/deserializing events.
//!
//! The protocol layer doesn't care HOW events become bytes — anything
//! implementing [`Codec`] will do. We ship [`JsonCodec`] (behind the
//! `json` feature, on by default) because the reference client is a
//! browser; a binary codec could be added without touching other crates.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because codecs are stored inside long-lived
/// server state shared across Tokio tasks. The methods are generic so the
/// same codec handles [`ClientEvent`](crate::ClientEvent) inbound and
/// [`ServerEvent`](crate::ServerEvent) outbound.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if serialization fails.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// Events travel as UTF-8 JSON text frames, so they're inspectable in
/// browser DevTools and server logs.
///
/// ## Example
///
/// ```rust
/// use quizhive_protocol::{JsonCodec, Codec, ClientEvent};
///
/// let codec = JsonCodec;
///
/// let event = ClientEvent::Answer { answer_index: 2 };
/// let bytes = codec.encode(&event).unwrap();
/// let decoded: ClientEvent = codec.decode(&bytes).unwrap();
/// assert_eq!(event, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{ClientEvent, ErrorCode, ServerEvent};

    #[test]
    fn test_json_codec_round_trip_client_event() {
        let codec = JsonCodec;
        let event = ClientEvent::JoinLobby {
            code: "AB12CD".into(),
            character: "wizard".into(),
        };
        let bytes = codec.encode(&event).unwrap();
        let decoded: ClientEvent = codec.decode(&bytes).unwrap();
        assert_eq!(event, decoded);
    }

    #[test]
    fn test_json_codec_round_trip_server_event() {
        let codec = JsonCodec;
        let event = ServerEvent::Error {
            code: ErrorCode::BadState,
            message: "game already running".into(),
        };
        let bytes = codec.encode(&event).unwrap();
        let decoded: ServerEvent = codec.decode(&bytes).unwrap();
        assert_eq!(event, decoded);
    }

    #[test]
    fn test_json_codec_decode_rejects_garbage() {
        let codec = JsonCodec;
        let result: Result<ClientEvent, _> = codec.decode(b"{{{{");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_json_codec_decode_rejects_wrong_shape() {
        let codec = JsonCodec;
        // Valid JSON, but no "event" tag.
        let result: Result<ClientEvent, _> =
            codec.decode(br#"{"code": "AB12CD"}"#);
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }
}
