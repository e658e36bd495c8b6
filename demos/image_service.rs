//! REST service demo
//!
//! Runs the image downloader behind its REST API until Ctrl+C or SIGTERM.
//!
//! ```bash
//! cargo run --example image_service -- [config.json]
//! ```
//!
//! After starting, you can:
//! - View Swagger UI at http://localhost:9002/swagger-ui
//! - Download a batch via POST http://localhost:9002/download
//! - Stream events via GET http://localhost:9002/events

use image_batch_dl::{BatchDownloader, Config, run_with_shutdown};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_json_file(path)?,
        None => Config::default(),
    };
    let address = config.api.bind_address;

    let downloader = BatchDownloader::new(config)?;

    // Log every batch event alongside the request traces
    let mut events = downloader.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            tracing::info!(?event, "batch event");
        }
    });

    println!("Image downloader listening on http://{address}");
    println!("Swagger UI: http://{address}/swagger-ui");
    println!();
    println!("Example:");
    println!("  curl -X POST http://{address}/download \\");
    println!("    -H 'Content-Type: application/json' \\");
    println!(
        "    -d '{{\"downloads\": [{{\"image_url\": \"https://upload.wikimedia.org/wikipedia/commons/7/73/Lion_waiting_in_Namibia.jpg\", \"name\": \"Lion\", \"source\": \"wikipedia\", \"category\": \"animals\"}}], \"max_concurrent\": 5}}'"
    );

    run_with_shutdown(downloader).await?;
    Ok(())
}
