//! `id-worker` — dials the master, registers, and serves filter jobs.

use anyhow::Result;
use clap::Parser;
use image_dispatch::cli::WorkerArgs;
use tokio::sync::watch;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let args = WorkerArgs::parse();
    let _log_guard = image_dispatch::logging::init(&args.log, "id-worker");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mode = args.mode.into();
    let mut worker = tokio::spawn(image_dispatch::worker::run(
        args.master,
        args.listen,
        mode,
        shutdown_rx,
    ));

    tokio::select! {
        result = &mut worker => {
            result.context_log();
        }
        ctrl_c = tokio::signal::ctrl_c() => {
            ctrl_c.ok();
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
            worker.await.context_log();
        }
    }

    Ok(())
}

/// Log a worker-loop result instead of propagating it, since the binary's
/// job is done either way once the loop exits.
trait LogResult {
    fn context_log(self);
}

impl LogResult for std::result::Result<Result<()>, tokio::task::JoinError> {
    fn context_log(self) {
        match self {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "worker loop exited with an error"),
            Err(e) => tracing::error!(error = %e, "worker task panicked"),
        }
    }
}
