//! `id-client` — submits one or more images to the master and writes the
//! processed results back to disk.

use anyhow::Result;
use clap::Parser;
use image_dispatch::cli::{validate_filter_size, ClientArgs};

#[tokio::main]
async fn main() -> Result<()> {
    let args = ClientArgs::parse();
    let _log_guard = image_dispatch::logging::init(&args.log, "id-client");

    validate_filter_size(args.filter_size)?;

    image_dispatch::client::submit_all(
        args.master,
        &args.images,
        args.filter_size,
        &args.output_dir,
    )
    .await
}
