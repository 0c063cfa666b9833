//! `id-master` — binds a listening port and runs the dispatch core.

use anyhow::{Context, Result};
use clap::Parser;
use image_dispatch::cli::MasterArgs;
use image_dispatch::master::Dispatcher;
use image_dispatch::transport::Server;
use tokio::sync::{mpsc, watch};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let args = MasterArgs::parse();
    let _log_guard = image_dispatch::logging::init(&args.log, "id-master");

    let server = Server::bind(args.listen)
        .await
        .with_context(|| format!("failed to bind {}", args.listen))?;
    info!(addr = %args.listen, policy = ?args.policy, "master listening");

    let (tx, rx) = mpsc::channel(4096);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let dispatcher = Dispatcher::new(args.policy.build());
    let dispatch_task = tokio::spawn(dispatcher.run(rx));
    let accept_task = tokio::spawn(server.serve(tx, shutdown_rx));

    tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    let _ = accept_task.await;
    drop(dispatch_task);
    Ok(())
}
