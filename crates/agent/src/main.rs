//! Binary that runs a service instance's registration lifecycle and health endpoints.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::redundant_pub_crate)]

mod args;
mod error;
mod routes;
mod runner;

use args::Args;
use error::{Error, Result};
use routes::registry_router;
use runner::run_until;

use std::sync::Arc;

use clap::Parser;
use roster_bootable::Bootable;
use roster_health::{HealthAggregator, health_router};
use roster_registration::{HostFacts, LifecycleController, RegistrationCoordinator};
use roster_registry_memory::MemoryRegistry;
use sysinfo::System;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    tracing::subscriber::set_global_default(
        FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .finish(),
    )?;

    let args = Args::parse();
    let config = args.registration_config();
    info!("Loaded configuration: {:?}", config);

    let host = HostFacts {
        hostname: System::host_name().unwrap_or_else(|| "localhost".to_string()),
        process_id: std::process::id(),
    };

    let registry = Arc::new(MemoryRegistry::new());
    let coordinator = Arc::new(RegistrationCoordinator::new(registry, config, &host)?);
    let health = Arc::new(HealthAggregator::new(Some(
        env!("CARGO_PKG_VERSION").to_string(),
    )));
    let controller = LifecycleController::new(coordinator.clone(), health.clone());

    let router = health_router(health).merge(registry_router(coordinator));
    let listener = tokio::net::TcpListener::bind(args.listen_addr())
        .await
        .map_err(Error::Bind)?;
    info!("Health endpoints listening on http://{}", args.listen_addr());

    let server_token = CancellationToken::new();
    let server = tokio::spawn({
        let server_token = server_token.clone();
        async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(server_token.cancelled_owned())
                .await
        }
    });

    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    };

    if let Err(e) = run_until(&controller, shutdown_signal).await {
        error!("Lifecycle failed: {}", e);
        if let Err(server_error) = stop_server(&server_token, server).await {
            error!("{}", server_error);
        }
        return Err(e.into());
    }

    stop_server(&server_token, server).await?;

    controller.wait().await;
    info!("Stopped");

    Ok(())
}

async fn stop_server(
    server_token: &CancellationToken,
    server: JoinHandle<std::io::Result<()>>,
) -> Result<()> {
    server_token.cancel();

    match server.await {
        Ok(result) => result.map_err(Error::Server),
        Err(e) => {
            error!("Health server task failed: {}", e);
            Ok(())
        }
    }
}
