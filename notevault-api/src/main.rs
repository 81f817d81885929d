use std::sync::Arc;

use anyhow::Result;
use notevault_core::{logging, Config, StorageManager};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    logging::init_logging(&config.logging)?;

    info!("NoteVault API server starting...");

    let manager = StorageManager::bootstrap(&config)
        .await
        .inspect_err(|e| error!(error = %e, "failed to bootstrap storage manager"))?;
    let manager = Arc::new(manager);

    let bind_address = config.bind_address();
    let config = Arc::new(config);
    let app = notevault_api::http::build_router(manager.clone(), config.clone());

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!(address = %bind_address, "listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    info!("shutting down");
    match Arc::try_unwrap(manager) {
        Ok(manager) => manager.shutdown().await?,
        Err(_) => error!("storage manager still has outstanding references; skipping graceful drain"),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let mut signal = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        signal.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
