//! # Wire Envelope
//!
//! `NetworkMessage` is the one structure that ever crosses the wire. Its
//! `Data` field carries an opaque, per-kind payload (an [`ImagePacket`],
//! [`SlaveRegistrationData`], [`SlaveStatistics`], or the literal `"OK"`),
//! base64-encoded inside the envelope's own JSON so that binary image data
//! survives a text-based protocol.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::net::IpAddr;

/// Discriminates the payload carried in a [`NetworkMessage`]'s `Data` field.
///
/// The wire encoding accepts either the integer discriminant or the variant
/// name as a string on the way in (`"the decoder must accept both"`); this
/// crate always serializes the integer form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    ImageRequest = 0,
    ImageResponse = 1,
    SlaveRegister = 2,
    Acknowledgment = 3,
    SlaveStatistics = 4,
}

impl MessageKind {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::ImageRequest),
            1 => Some(Self::ImageResponse),
            2 => Some(Self::SlaveRegister),
            3 => Some(Self::Acknowledgment),
            4 => Some(Self::SlaveStatistics),
            _ => None,
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "ImageRequest" => Some(Self::ImageRequest),
            "ImageResponse" => Some(Self::ImageResponse),
            "SlaveRegister" => Some(Self::SlaveRegister),
            "Acknowledgment" => Some(Self::Acknowledgment),
            "SlaveStatistics" => Some(Self::SlaveStatistics),
            _ => None,
        }
    }
}

impl Serialize for MessageKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

impl<'de> Deserialize<'de> for MessageKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct KindVisitor;

        impl<'de> Visitor<'de> for KindVisitor {
            type Value = MessageKind;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a message kind, as an integer discriminant or variant name")
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<MessageKind, E> {
                MessageKind::from_u8(value as u8)
                    .ok_or_else(|| de::Error::custom(format!("unknown message kind {}", value)))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<MessageKind, E> {
                self.visit_u64(value as u64)
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<MessageKind, E> {
                MessageKind::from_name(value)
                    .ok_or_else(|| de::Error::custom(format!("unknown message kind {:?}", value)))
            }
        }

        deserializer.deserialize_any(KindVisitor)
    }
}

/// The unit that actually crosses the wire: one frame body.
///
/// `sender_ip`/`sender_port` are always overwritten by the receiver from the
/// connection's observed remote endpoint before the message is published to
/// the dispatcher — whatever a peer puts in these fields on the wire is
/// discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkMessage {
    #[serde(rename = "Type")]
    pub kind: MessageKind,
    #[serde(rename = "Data", with = "super::data_field")]
    pub payload: Vec<u8>,
    #[serde(rename = "MessageId")]
    pub message_id: String,
    #[serde(rename = "SenderIp")]
    pub sender_ip: IpAddr,
    #[serde(rename = "SenderPort")]
    pub sender_port: u16,
    #[serde(rename = "Timestamp")]
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl NetworkMessage {
    /// Build a message whose sender fields are placeholders; the reader
    /// loop overwrites them from the socket's peer address on receipt, and
    /// the sender doesn't need to fill in its own address to send.
    pub fn new(kind: MessageKind, payload: Vec<u8>) -> Self {
        Self {
            kind,
            payload,
            message_id: uuid::Uuid::new_v4().to_string(),
            sender_ip: IpAddr::from([0, 0, 0, 0]),
            sender_port: 0,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Serialize `body` as JSON and wrap it as this message's payload.
    pub fn with_json_body<T: Serialize>(kind: MessageKind, body: &T) -> serde_json::Result<Self> {
        Ok(Self::new(kind, serde_json::to_vec(body)?))
    }

    /// Parse this message's payload as JSON.
    pub fn json_body<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.payload)
    }

    /// The literal `"OK"` acknowledgment body.
    pub fn acknowledgment() -> Self {
        Self::new(MessageKind::Acknowledgment, b"OK".to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_kind_decodes_integer_and_name() {
        assert_eq!(
            serde_json::from_str::<MessageKind>("0").unwrap(),
            MessageKind::ImageRequest
        );
        assert_eq!(
            serde_json::from_str::<MessageKind>("\"ImageRequest\"").unwrap(),
            MessageKind::ImageRequest
        );
        assert_eq!(
            serde_json::from_str::<MessageKind>("4").unwrap(),
            MessageKind::SlaveStatistics
        );
    }

    #[test]
    fn network_message_round_trips_through_json() {
        let msg = NetworkMessage::new(MessageKind::ImageRequest, vec![9, 9, 9]);
        let json = serde_json::to_string(&msg).unwrap();
        let decoded: NetworkMessage = serde_json::from_str(&json).unwrap();

        assert_eq!(decoded.kind, MessageKind::ImageRequest);
        assert_eq!(decoded.payload, vec![9, 9, 9]);
        assert_eq!(decoded.message_id, msg.message_id);
    }

    #[test]
    fn acknowledgment_payload_is_literal_ok() {
        let ack = NetworkMessage::acknowledgment();
        assert_eq!(ack.payload, b"OK");
        assert_eq!(ack.kind, MessageKind::Acknowledgment);
    }
}
