//! # Framed Transport
//!
//! Length-prefixed JSON messages over persistent TCP connections, binding
//! submitters, the master, and workers into one uniform protocol. A
//! connection initiated outbound is serviced by the same reader loop as an
//! accepted one, so a single socket carries outbound requests and inbound
//! responses for the node that dialed it.

pub mod connection;
pub mod frame;
pub mod message;
pub mod server;

pub use connection::{connect, Connection, ConnectionId, Inbound};
pub use frame::{read_frame, write_frame, MAX_FRAME_BYTES};
pub use message::{MessageKind, NetworkMessage};
pub use server::Server;

/// Base64 (de)serialization for the envelope's opaque `Data` field.
mod data_field {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        serializer.serialize_str(&encoded)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
