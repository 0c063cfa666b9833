//! # Error Types
//!
//! Leaf-level structured errors for the transport layer. Everything above
//! the transport (dispatch core, worker pipeline, binaries) runs these
//! through `?` into `anyhow::Error`, matching the rest of the crate's use
//! of `anyhow::Result` for application-level propagation.

use thiserror::Error;

/// Errors that can occur while reading or writing a single frame.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame body too large: {len} bytes (limit {limit})")]
    FrameTooLarge { len: usize, limit: usize },

    #[error("peer sent a short read on the length word")]
    ShortRead,

    #[error("peer disconnected")]
    Disconnected,

    #[error("failed to decode message body: {0}")]
    Decode(#[from] serde_json::Error),
}
