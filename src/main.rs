// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::process::ExitCode;
use std::sync::Arc;

use client_vault::{api::router, config, ClientContext};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    config::init_tracing();

    match serve().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Server failed");
            ExitCode::FAILURE
        }
    }
}

async fn serve() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let server_config = config::ServerConfig::from_env();
    let addr = server_config.bind_addr()?;

    let context = ClientContext::open(&server_config.data_dir)?;
    info!(data_dir = %server_config.data_dir.display(), "Opened client store");

    // Resolve the signing key before the JWKS endpoint is reachable
    let key = context.credentials().get_key_pair();
    info!(kid = key.key_id(), thumbprint = %key.thumbprint(), "Client signing key ready");

    let shutdown = CancellationToken::new();
    let coordinator = Arc::new(context.http_coordinator()?);
    let maintenance = tokio::spawn(context.maintenance(coordinator).run(shutdown.clone()));

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Client vault listening");

    axum::serve(listener, router(context))
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    if let Err(e) = maintenance.await {
        error!(error = %e, "Avatar cache maintenance task failed");
    }
    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("Received Ctrl+C, shutting down");
    shutdown.cancel();
}
