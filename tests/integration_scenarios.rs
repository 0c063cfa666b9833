//! End-to-end scenarios from the dispatch core's testable-properties list:
//! real TCP loopback connections, a real master dispatcher, and real worker
//! processes (in-process tasks dialing the master exactly as the `id-worker`
//! binary would).

use anyhow::Result;
use image_dispatch::filter::FilterMode;
use image_dispatch::master::Dispatcher;
use image_dispatch::master::policy::{MinAvgLatencyPolicy, RoundRobinPolicy};
use image_dispatch::model::ImagePacket;
use image_dispatch::transport::{connect, Connection, MessageKind, NetworkMessage, Server};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

async fn spawn_master(policy: Box<dyn image_dispatch::master::SelectionPolicy>) -> (Arc<Dispatcher>, SocketAddr) {
    let server = Server::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
    let addr = server.local_addr().unwrap();
    let (tx, rx) = mpsc::channel(1024);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(server.serve(tx, shutdown_rx));

    let dispatcher = Dispatcher::new(policy);
    tokio::spawn(dispatcher.clone().run(rx));
    (dispatcher, addr)
}

fn spawn_worker(master_addr: SocketAddr, worker_port: u16, mode: FilterMode) {
    let advertise: SocketAddr = format!("127.0.0.1:{worker_port}").parse().unwrap();
    let (_tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        let _ = image_dispatch::worker::run(master_addr, advertise, mode, rx).await;
    });
}

async fn connect_submitter(master_addr: SocketAddr) -> (Arc<Connection>, mpsc::Receiver<(Arc<Connection>, NetworkMessage)>) {
    connect(master_addr, tokio::sync::watch::channel(false).1).await.unwrap()
}

fn tiny_png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    let mut img = image::RgbImage::new(width, height);
    for pixel in img.pixels_mut() {
        *pixel = image::Rgb(color);
    }
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

fn sample_packet(id: &str, width: u32, height: u32, filter_size: u32) -> ImagePacket {
    ImagePacket {
        packet_id: id.to_string(),
        file_name: format!("{id}.png"),
        image_data: tiny_png(width, height, [60, 90, 200]),
        width,
        height,
        format: "png".to_string(),
        filter_size,
        slave_port: None,
    }
}

#[tokio::test]
async fn single_job_single_worker_round_trips() -> Result<()> {
    let (master, master_addr) = spawn_master(Box::new(RoundRobinPolicy::new())).await;
    spawn_worker(master_addr, 19100, FilterMode::Light);

    // Wait for registration.
    for _ in 0..200 {
        if master.worker_count() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(master.worker_count(), 1);

    let (submitter, mut rx) = connect_submitter(master_addr).await;
    let packet = sample_packet("p1", 10, 10, 3);
    submitter
        .send(&NetworkMessage::with_json_body(MessageKind::ImageRequest, &packet)?)
        .await?;

    let (_, msg) = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for response")
        .expect("channel closed");
    assert_eq!(msg.kind, MessageKind::ImageResponse);
    let response: ImagePacket = msg.json_body()?;
    assert_eq!(response.packet_id, "p1");

    let (received, completed) = master.counters();
    assert_eq!(received, 1);
    assert_eq!(completed, 1);
    Ok(())
}

#[tokio::test]
async fn three_requests_to_one_worker_complete_in_fifo_order() -> Result<()> {
    let (master, master_addr) = spawn_master(Box::new(RoundRobinPolicy::new())).await;
    spawn_worker(master_addr, 19200, FilterMode::Light);

    for _ in 0..200 {
        if master.worker_count() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(master.worker_count(), 1);

    let (submitter, mut rx) = connect_submitter(master_addr).await;
    for id in ["p1", "p2", "p3"] {
        let packet = sample_packet(id, 4, 4, 3);
        submitter
            .send(&NetworkMessage::with_json_body(MessageKind::ImageRequest, &packet)?)
            .await?;
    }

    let mut order = Vec::new();
    for _ in 0..3 {
        let (_, msg) = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for response")
            .expect("channel closed");
        let response: ImagePacket = msg.json_body()?;
        order.push(response.packet_id);
    }

    assert_eq!(order, vec!["p1", "p2", "p3"]);
    Ok(())
}

#[tokio::test]
async fn round_robin_alternates_across_two_free_workers() -> Result<()> {
    let (master, master_addr) = spawn_master(Box::new(RoundRobinPolicy::new())).await;
    spawn_worker(master_addr, 19300, FilterMode::Light);
    spawn_worker(master_addr, 19301, FilterMode::Light);

    for _ in 0..200 {
        if master.worker_count() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(master.worker_count(), 2);

    let (submitter, mut rx) = connect_submitter(master_addr).await;

    let mut ports = Vec::new();
    for i in 0..4 {
        let packet = sample_packet(&format!("p{i}"), 4, 4, 3);
        submitter
            .send(&NetworkMessage::with_json_body(MessageKind::ImageRequest, &packet)?)
            .await?;

        // Wait for this job's response before sending the next, so both
        // workers are free again when the next request is dispatched.
        let (_, msg) = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for response")
            .expect("channel closed");
        let response: ImagePacket = msg.json_body()?;
        ports.push(response.slave_port.expect("worker must echo its port"));
    }

    assert_eq!(ports[0], 19300);
    assert_eq!(ports[1], 19301);
    assert_eq!(ports[2], 19300);
    assert_eq!(ports[3], 19301);
    Ok(())
}

#[tokio::test]
async fn min_latency_policy_prefers_untested_worker_end_to_end() -> Result<()> {
    let (master, master_addr) = spawn_master(Box::new(MinAvgLatencyPolicy::new())).await;
    spawn_worker(master_addr, 19400, FilterMode::Light);

    for _ in 0..200 {
        if master.worker_count() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let (submitter, mut rx) = connect_submitter(master_addr).await;
    let packet = sample_packet("p1", 4, 4, 3);
    submitter
        .send(&NetworkMessage::with_json_body(MessageKind::ImageRequest, &packet)?)
        .await?;
    let (_, msg) = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out")
        .expect("closed");
    let response: ImagePacket = msg.json_body()?;
    assert_eq!(response.packet_id, "p1");
    Ok(())
}
