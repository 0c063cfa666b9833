//! # Payload Models
//!
//! The structured bodies carried in a [`crate::transport::NetworkMessage`]'s
//! `Data` field. Each corresponds to one kind of message the wire protocol
//! carries.

use serde::{Deserialize, Serialize};

/// A single image-filter job, carried both as the request (input bytes,
/// filter parameters) and the response (output bytes, same identifiers).
///
/// `packet_id` is preserved verbatim end-to-end; `slave_port` is only
/// meaningful on the response, where the worker echoes its own listening
/// port so the master can resolve which [`crate::master::WorkerRecord`]
/// just freed up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagePacket {
    #[serde(rename = "PacketId")]
    pub packet_id: String,
    #[serde(rename = "FileName")]
    pub file_name: String,
    /// Raw encoded image bytes (PNG/JPEG container). Input on the request,
    /// output on the response.
    #[serde(rename = "ImageData", with = "base64_bytes")]
    pub image_data: Vec<u8>,
    #[serde(rename = "Width")]
    pub width: u32,
    #[serde(rename = "Height")]
    pub height: u32,
    #[serde(rename = "Format")]
    pub format: String,
    /// Odd positive kernel dimension requested by the submitter.
    #[serde(rename = "FilterSize")]
    pub filter_size: u32,
    /// Echoed by the worker on response; absent/ignored on the request.
    #[serde(rename = "SlavePort", default, skip_serializing_if = "Option::is_none")]
    pub slave_port: Option<u16>,
}

/// Registration payload a worker sends on connecting to the master.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SlaveRegistrationData {
    #[serde(rename = "IpAddress")]
    pub ip_address: std::net::IpAddr,
    #[serde(rename = "Port")]
    pub port: u16,
}

/// Periodic self-reported statistics a worker sends after each completed job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SlaveStatistics {
    #[serde(rename = "Port")]
    pub port: u16,
    #[serde(rename = "TasksCompleted")]
    pub tasks_completed: u64,
    #[serde(rename = "TotalProcessingTime")]
    pub total_processing_time: f64,
    #[serde(rename = "AverageProcessingTime")]
    pub average_processing_time: f64,
}

impl SlaveStatistics {
    pub fn zero(port: u16) -> Self {
        Self {
            port,
            tasks_completed: 0,
            total_processing_time: 0.0,
            average_processing_time: 0.0,
        }
    }

    /// Fold one more job's wall-clock processing time into the running
    /// average: `average = total / completed`.
    pub fn record(&mut self, elapsed_secs: f64) {
        self.tasks_completed += 1;
        self.total_processing_time += elapsed_secs;
        self.average_processing_time = self.total_processing_time / self.tasks_completed as f64;
    }
}

/// Base64 (de)serialization helper for `Vec<u8>` fields, since the wire
/// protocol carries `ImageData` as base64 text inside JSON rather than raw
/// bytes.
mod base64_bytes {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_packet_round_trips_through_json() {
        let packet = ImagePacket {
            packet_id: "p1".to_string(),
            file_name: "cat.png".to_string(),
            image_data: vec![1, 2, 3, 4, 5],
            width: 10,
            height: 10,
            format: "png".to_string(),
            filter_size: 3,
            slave_port: Some(9100),
        };

        let json = serde_json::to_string(&packet).unwrap();
        let decoded: ImagePacket = serde_json::from_str(&json).unwrap();

        assert_eq!(decoded.packet_id, packet.packet_id);
        assert_eq!(decoded.file_name, packet.file_name);
        assert_eq!(decoded.image_data, packet.image_data);
        assert_eq!(decoded.filter_size, packet.filter_size);
        assert_eq!(decoded.slave_port, packet.slave_port);
    }

    #[test]
    fn slave_statistics_average_tracks_total_over_completed() {
        let mut stats = SlaveStatistics::zero(9100);
        stats.record(5.0);
        stats.record(3.0);

        assert_eq!(stats.tasks_completed, 2);
        assert_eq!(stats.total_processing_time, 8.0);
        assert_eq!(stats.average_processing_time, 4.0);
    }
}
