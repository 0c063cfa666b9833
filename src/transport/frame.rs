//! # Wire Frame Codec
//!
//! Every message is `[u32 little-endian length][length bytes of UTF-8 JSON
//! body]`. The length word is the body's byte count and does not include
//! itself.

use crate::error::TransportError;
use crate::transport::NetworkMessage;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::warn;

/// Frame bodies above this size are rejected outright.
pub const MAX_FRAME_BYTES: usize = 50_000_000;

/// How many discard bytes to buffer at a time while draining an oversized
/// frame's body off the wire.
const DISCARD_CHUNK_BYTES: usize = 64 * 1024;

/// Read one frame from `stream` and parse it as a [`NetworkMessage`].
///
/// A zero-byte read on the length word means the peer disconnected
/// cleanly; a short read (1-3 bytes) is peer misbehavior, reported
/// distinctly as [`TransportError::ShortRead`] so the caller can tell a
/// graceful close from a misbehaving peer even though both abandon the
/// connection. An oversized frame is rejected but does NOT abandon the
/// connection: its body is drained off the wire and discarded so the stream
/// stays byte-aligned, and the next frame is read in its place.
pub async fn read_frame<R: tokio::io::AsyncRead + Unpin>(
    stream: &mut R,
) -> Result<NetworkMessage, TransportError> {
    loop {
        let mut len_bytes = [0u8; 4];
        let mut read_so_far = 0usize;
        while read_so_far < len_bytes.len() {
            match stream.read(&mut len_bytes[read_so_far..]).await {
                Ok(0) if read_so_far == 0 => return Err(TransportError::Disconnected),
                Ok(0) => return Err(TransportError::ShortRead),
                Ok(n) => read_so_far += n,
                Err(e) => return Err(TransportError::Io(e)),
            }
        }

        let len = u32::from_le_bytes(len_bytes) as usize;
        if len > MAX_FRAME_BYTES {
            warn!(len, limit = MAX_FRAME_BYTES, "discarding oversized frame");
            discard_bytes(stream, len).await?;
            continue;
        }

        let mut body = vec![0u8; len];
        stream.read_exact(&mut body).await?;

        let message: NetworkMessage = serde_json::from_slice(&body)?;
        return Ok(message);
    }
}

/// Read and drop exactly `len` bytes from `stream` without buffering the
/// whole body at once.
async fn discard_bytes<R: tokio::io::AsyncRead + Unpin>(
    stream: &mut R,
    mut len: usize,
) -> Result<(), TransportError> {
    let mut scratch = [0u8; DISCARD_CHUNK_BYTES];
    while len > 0 {
        let take = len.min(scratch.len());
        stream.read_exact(&mut scratch[..take]).await?;
        len -= take;
    }
    Ok(())
}

/// Serialize `message`, length-prefix it, and write the whole frame,
/// flushing afterward. Returning `Ok(())` only means the bytes left the
/// local write buffer, not that the peer received them.
pub async fn write_frame<W: tokio::io::AsyncWrite + Unpin>(
    stream: &mut W,
    message: &NetworkMessage,
) -> Result<(), TransportError> {
    let body = serde_json::to_vec(message)?;
    if body.len() > MAX_FRAME_BYTES {
        return Err(TransportError::FrameTooLarge {
            len: body.len(),
            limit: MAX_FRAME_BYTES,
        });
    }

    let len = body.len() as u32;
    stream.write_all(&len.to_le_bytes()).await?;
    stream.write_all(&body).await?;
    stream.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MessageKind;

    #[tokio::test]
    async fn frame_round_trips_over_an_in_memory_duplex() {
        let (mut a, mut b) = tokio::io::duplex(64 * 1024);

        let sent = NetworkMessage::new(MessageKind::ImageRequest, vec![1, 2, 3]);
        write_frame(&mut a, &sent).await.unwrap();

        let received = read_frame(&mut b).await.unwrap();
        assert_eq!(received.kind, sent.kind);
        assert_eq!(received.payload, sent.payload);
        assert_eq!(received.message_id, sent.message_id);
    }

    #[tokio::test]
    async fn oversized_frame_is_discarded_and_reader_continues() {
        let (mut a, mut b) = tokio::io::duplex(64 * 1024);

        // Claim an oversized body directly, bypassing write_frame's own
        // check, to exercise the reader's discard-and-continue path — then
        // follow it with a normal frame the reader should still pick up.
        // The writer side runs on its own task since the oversized body is
        // far larger than the duplex's internal buffer and would otherwise
        // deadlock against a reader that hasn't started draining yet.
        let writer = tokio::spawn(async move {
            let len = (MAX_FRAME_BYTES + 1) as u32;
            tokio::io::AsyncWriteExt::write_all(&mut a, &len.to_le_bytes())
                .await
                .unwrap();
            tokio::io::AsyncWriteExt::write_all(&mut a, &vec![0u8; len as usize])
                .await
                .unwrap();

            let sent = NetworkMessage::new(MessageKind::ImageRequest, vec![7, 7, 7]);
            write_frame(&mut a, &sent).await.unwrap();
            sent
        });

        let received = read_frame(&mut b).await.unwrap();
        let sent = writer.await.unwrap();
        assert_eq!(received.payload, sent.payload);
    }

    #[tokio::test]
    async fn disconnect_before_any_bytes_is_reported_as_disconnected() {
        let (a, mut b) = tokio::io::duplex(64);
        drop(a);

        let err = read_frame(&mut b).await.unwrap_err();
        assert!(matches!(err, TransportError::Disconnected));
    }

    #[tokio::test]
    async fn disconnect_mid_length_word_is_reported_as_short_read() {
        let (mut a, mut b) = tokio::io::duplex(64);
        tokio::io::AsyncWriteExt::write_all(&mut a, &[1, 2])
            .await
            .unwrap();
        drop(a);

        let err = read_frame(&mut b).await.unwrap_err();
        assert!(matches!(err, TransportError::ShortRead));
    }
}
