use std::sync::Arc;

use annonsplats::{config, logger::setup_logger, web};
use anyhow::Result;
use config::Config;
use log::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger
    setup_logger()?;

    let config: Arc<Config> = Arc::new(config::read_config());
    let state = web::AppState::from_config(config)?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel::<()>(1);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("shutdown requested"),
            Err(err) => {
                error!("failed to listen for ctrl-c: {err}");
                std::future::pending::<()>().await;
            }
        }
        let _ = shutdown_tx.send(());
    });

    web::start_http_server(state, shutdown_rx).await
}
