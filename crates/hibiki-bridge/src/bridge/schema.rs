//! Payload schema seam.
//!
//! The bridge moves opaque frames; turning a frame payload into a typed
//! notification is delegated to a [`MessageSchema`]. A generated codec for
//! the engine's native schema plugs in here without touching the bridge.

use tokio_util::bytes::Bytes;

use crate::error::SchemaError;

use super::protocol::{Notification, Request};

/// Decodes inbound frame payloads into notifications.
pub trait MessageSchema: Send + Sync + 'static {
    type Notification: Send + Sync + 'static;

    fn decode(&self, payload: &Bytes) -> Result<Self::Notification, SchemaError>;
}

/// serde_json encoding of [`Request`] / [`Notification`].
///
/// A stand-in for engines and test doubles that speak JSON. The stock
/// `hbk-play` decodes its own binary schema and will not accept these
/// payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSchema;

impl JsonSchema {
    pub fn encode_request(request: &Request) -> Result<Bytes, SchemaError> {
        let json = serde_json::to_vec(request).map_err(SchemaError::Encode)?;
        Ok(Bytes::from(json))
    }
}

impl MessageSchema for JsonSchema {
    type Notification = Notification;

    fn decode(&self, payload: &Bytes) -> Result<Notification, SchemaError> {
        serde_json::from_slice(payload).map_err(SchemaError::Decode)
    }
}

/// Hands every payload through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawSchema;

impl MessageSchema for RawSchema {
    type Notification = Bytes;

    fn decode(&self, payload: &Bytes) -> Result<Bytes, SchemaError> {
        Ok(payload.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_decodes_log_notification() {
        let payload = Bytes::from_static(br#"{"type":"log","message":"engine ready"}"#);

        let n = JsonSchema.decode(&payload).unwrap();

        assert_eq!(
            n,
            Notification::Log {
                message: "engine ready".to_string()
            }
        );
    }

    #[test]
    fn json_decodes_track_levels() {
        let payload = Bytes::from_static(
            br#"{"type":"track_levels","levels":[{"track_index":2,"left":0.25,"right":0.5}]}"#,
        );

        match JsonSchema.decode(&payload).unwrap() {
            Notification::TrackLevels { levels } => {
                assert_eq!(levels.len(), 1);
                assert_eq!(levels[0].track_index, 2);
                assert!((levels[0].right - 0.5).abs() < f32::EPSILON);
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn json_rejects_unknown_kind() {
        let payload = Bytes::from_static(br#"{"type":"telemetry","cpu":3}"#);
        assert!(matches!(
            JsonSchema.decode(&payload),
            Err(SchemaError::Decode(_))
        ));
    }

    #[test]
    fn json_rejects_garbage() {
        let payload = Bytes::from_static(&[0xff, 0x00, 0x13]);
        assert!(JsonSchema.decode(&payload).is_err());
    }

    #[test]
    fn encoded_request_is_tagged_json() {
        let bytes = JsonSchema::encode_request(&Request::SetBpm { bpm: 128.0 }).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(value["type"], "set_bpm");
        assert_eq!(value["bpm"], 128.0);
    }

    #[test]
    fn raw_passes_payload_through() {
        let payload = Bytes::from_static(b"\x00\x01opaque");
        assert_eq!(RawSchema.decode(&payload).unwrap(), payload);
    }
}
