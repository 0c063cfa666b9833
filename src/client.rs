//! # Submitter
//!
//! Opens one persistent connection to the master, pushes one or more image
//! jobs (each tagged with a unique `packetId`), and receives the completed
//! artifacts back on the same connection in arbitrary order.
//!
//! Reading source bytes from disk and writing result bytes back are the
//! out-of-scope "image file loading from disk" collaborator; this module's
//! job is only to drive the wire protocol around that I/O. Peeking at an
//! image's width/height to fill in [`ImagePacket`]'s metadata fields is the
//! one place this binary reaches for the `image` crate, since the wire
//! format requires that metadata up front and nothing else in the core
//! supplies it.

use crate::model::ImagePacket;
use crate::transport::{connect, MessageKind, NetworkMessage};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Submit every image in `images` to `master` as one job each, then wait
/// for every response before returning. Writes each result to
/// `output_dir/<original file stem>_filtered.<ext>`.
pub async fn submit_all(
    master: SocketAddr,
    images: &[PathBuf],
    filter_size: u32,
    output_dir: &Path,
) -> Result<()> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output directory {output_dir:?}"))?;

    let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let (conn, mut rx) = connect(master, shutdown_rx).await.context("failed to dial master")?;

    let mut pending: HashMap<String, PathBuf> = HashMap::new();
    for path in images {
        let packet = read_packet(path, filter_size)
            .with_context(|| format!("failed to prepare job for {path:?}"))?;
        pending.insert(packet.packet_id.clone(), path.clone());
        conn.send(&NetworkMessage::with_json_body(MessageKind::ImageRequest, &packet)?)
            .await
            .context("failed to send ImageRequest")?;
        tracing::info!(packet_id = %packet.packet_id, path = %path.display(), "submitted job");
    }

    while !pending.is_empty() {
        let (_, msg) = rx
            .recv()
            .await
            .context("master connection closed before all results arrived")?;
        if msg.kind != MessageKind::ImageResponse {
            tracing::debug!(kind = ?msg.kind, "submitter ignoring non-response message");
            continue;
        }
        let packet: ImagePacket = msg.json_body().context("failed to decode ImageResponse")?;
        let Some(source) = pending.remove(&packet.packet_id) else {
            tracing::warn!(packet_id = %packet.packet_id, "received response for unknown packetId, discarding");
            continue;
        };
        write_result(&source, output_dir, &packet)?;
        tracing::info!(packet_id = %packet.packet_id, "received result");
    }

    Ok(())
}

fn read_packet(path: &Path, filter_size: u32) -> Result<ImagePacket> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {path:?}"))?;
    let (width, height) = image::ImageReader::new(std::io::Cursor::new(&bytes))
        .with_guessed_format()
        .context("could not guess image container format")?
        .into_dimensions()
        .context("failed to read image dimensions")?;

    let format = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("png")
        .to_ascii_lowercase();

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unnamed".to_string());

    Ok(ImagePacket {
        packet_id: uuid::Uuid::new_v4().to_string(),
        file_name,
        image_data: bytes,
        width,
        height,
        format,
        filter_size,
        slave_port: None,
    })
}

fn write_result(source: &Path, output_dir: &Path, packet: &ImagePacket) -> Result<()> {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "result".to_string());
    let ext = source
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("png");
    let dest = output_dir.join(format!("{stem}_filtered.{ext}"));
    std::fs::write(&dest, &packet.image_data)
        .with_context(|| format!("failed to write result to {dest:?}"))?;
    Ok(())
}
