use anyhow::Result;
use log::{error, info};
use tokio::sync::broadcast;

use hoymiles_bridge::prelude::Options;

#[tokio::main]
async fn main() -> Result<()> {
    let options = Options::new();

    // Create a channel for shutdown signaling
    let (shutdown_tx, _) = broadcast::channel(1);

    // Handle Ctrl+C
    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
        if let Err(e) = shutdown_tx_clone.send(()) {
            error!("Failed to send shutdown signal: {}", e);
        }
    });

    // Stop after the requested runtime, if any
    if let Some(runtime) = options.runtime {
        let shutdown_tx_clone = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_secs(runtime)).await;
            info!("Runtime limit of {}s reached", runtime);
            let _ = shutdown_tx_clone.send(());
        });
    }

    // Run the application
    let app_handle = tokio::spawn(hoymiles_bridge::app(shutdown_tx.subscribe(), options));

    // Wait for the application to complete
    if let Err(e) = app_handle.await? {
        error!("Application error: {:#}", e);
        std::process::exit(255);
    }

    Ok(())
}
