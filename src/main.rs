use log::{error, info};
use std::time::Duration;
use tokio::sync::broadcast;

use vedirect_bridge::prelude::*;

#[tokio::main]
async fn main() {
    let options = Options::new();

    let config = ConfigWrapper::new(options.config_file.clone()).unwrap_or_else(|err| {
        eprintln!("Failed to load config {}: {:?}", options.config_file, err);
        std::process::exit(255);
    });

    vedirect_bridge::init_logging(&config.loglevel());

    // Create a channel for shutdown signaling
    let (shutdown_tx, _) = broadcast::channel(1);

    // Handle Ctrl+C
    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
        let _ = shutdown_tx_clone.send(());
    });

    if let Some(runtime) = options.runtime {
        info!("Will stop after {}s", runtime);
        let shutdown_tx_clone = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(runtime)).await;
            let _ = shutdown_tx_clone.send(());
        });
    }

    let app_handle = tokio::spawn(vedirect_bridge::app(shutdown_tx.subscribe(), config));

    match app_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            error!("Application error: {}", e);
            std::process::exit(1);
        }
        Err(e) => {
            error!("Application task failed: {}", e);
            std::process::exit(1);
        }
    }
}
