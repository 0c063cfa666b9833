//! # Worker Process Loop
//!
//! Pulls jobs from the master, runs the filter pipeline, and pushes back
//! results and statistics. Dials the master, sends a `SlaveRegister` with
//! its own advertised port, awaits an `Acknowledgment`, then enters the same
//! reader loop as the server. The decode-filter-encode transform always
//! runs on a background blocking thread (`spawn_blocking`) so the
//! connection's reader task is never blocked by it.

use crate::filter::image_buf::{format_from_name, PixelBuffer};
use crate::filter::{self, FilterMode};
use crate::model::{ImagePacket, SlaveRegistrationData, SlaveStatistics};
use crate::transport::{connect, MessageKind, NetworkMessage};
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::time::Instant;
use tracing::{info, warn};

/// An encoded artifact above this size is re-encoded as JPEG for transport.
const MAX_PNG_TRANSPORT_BYTES: usize = 500_000;

/// JPEG quality used for the oversized-artifact transport fallback.
const TRANSPORT_FALLBACK_JPEG_QUALITY: u8 = 75;

/// Dial `master`, register as `advertise` (the address other components
/// should know this worker by), and serve jobs forever until the master's
/// connection closes or `shutdown` fires.
///
/// Runs the worker end to end: this is the whole of what `id-worker`'s
/// `main` needs to call after parsing its CLI arguments.
pub async fn run(
    master: SocketAddr,
    advertise: SocketAddr,
    mode: FilterMode,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) -> Result<()> {
    let (conn, mut rx) = connect(master, shutdown.clone())
        .await
        .context("failed to dial master")?;

    let registration = SlaveRegistrationData {
        ip_address: advertise.ip(),
        port: advertise.port(),
    };
    conn.send(&NetworkMessage::with_json_body(
        MessageKind::SlaveRegister,
        &registration,
    )?)
    .await
    .context("failed to send SlaveRegister")?;

    let (_, ack) = rx.recv().await.context("master closed connection before acknowledging registration")?;
    if ack.kind != MessageKind::Acknowledgment {
        anyhow::bail!("expected Acknowledgment, got {:?}", ack.kind);
    }
    info!(master = %master, advertise = %advertise, mode = ?mode, "registered with master");

    let mut stats = SlaveStatistics::zero(advertise.port());

    loop {
        tokio::select! {
            received = rx.recv() => {
                let Some((_, msg)) = received else {
                    info!("master connection closed, worker exiting");
                    return Ok(());
                };
                match msg.kind {
                    MessageKind::ImageRequest => {
                        if let Err(e) = process_job(&conn, &msg, mode, advertise.port(), &mut stats).await {
                            warn!(error = %e, "filter pipeline failed, no response sent for this job");
                        }
                    }
                    other => {
                        warn!(kind = ?other, "worker received unexpected message kind, ignoring");
                    }
                }
            }
            _ = shutdown.changed() => {
                info!("shutdown signal received, worker exiting");
                return Ok(());
            }
        }
    }
}

/// Decode, filter, re-encode, and reply with statistics then the response.
/// The master does not depend on this order, but the worker sends the
/// statistics frame first, then the response.
async fn process_job(
    conn: &crate::transport::Connection,
    msg: &NetworkMessage,
    mode: FilterMode,
    own_port: u16,
    stats: &mut SlaveStatistics,
) -> Result<()> {
    let mut packet: ImagePacket = msg.json_body().context("failed to decode ImagePacket")?;
    let packet_id = packet.packet_id.clone();
    let filter_size = packet.filter_size as usize;
    let format = format_from_name(&packet.format);
    let input_bytes = std::mem::take(&mut packet.image_data);

    let started = Instant::now();
    let encoded = tokio::task::spawn_blocking(move || -> Result<Vec<u8>> {
        let input = PixelBuffer::decode(&input_bytes).context("failed to decode input image")?;
        let output = filter::apply(mode, &input, filter_size);
        let mut encoded = output.encode(format).context("failed to encode output image")?;
        if encoded.len() > MAX_PNG_TRANSPORT_BYTES {
            encoded = output
                .encode_jpeg_quality(TRANSPORT_FALLBACK_JPEG_QUALITY)
                .context("failed to re-encode oversized output as JPEG")?;
        }
        Ok(encoded)
    })
    .await
    .context("filter task panicked")??;
    let elapsed = started.elapsed().as_secs_f64();

    stats.record(elapsed);
    conn.send(&NetworkMessage::with_json_body(
        MessageKind::SlaveStatistics,
        &*stats,
    )?)
    .await
    .context("failed to send SlaveStatistics")?;

    packet.image_data = encoded;
    packet.slave_port = Some(own_port);
    conn.send(&NetworkMessage::with_json_body(MessageKind::ImageResponse, &packet)?)
        .await
        .context("failed to send ImageResponse")?;

    info!(packet_id = %packet_id, elapsed_secs = elapsed, "job completed");
    Ok(())
}
