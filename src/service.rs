use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum_server::Handle;
use tokio::signal;
use tracing::info;

use crate::code_extractor::CodeExtractor;
use crate::config::ServerConfig;
use crate::image_builder::ImageBuilder;
use crate::orchestrator::Orchestrator;
use crate::routes::{create_routes, RouteState};
use crate::toolchain::{DockerCli, ImageToolchain};

pub struct Service {
    pub config: ServerConfig,
    orchestrator: Arc<Orchestrator>,
}

impl Service {
    pub fn new(config: ServerConfig) -> Result<Self> {
        config.validate()?;

        let catalog = Arc::new(config.runtime_catalog());
        let toolchain: Arc<dyn ImageToolchain> = Arc::new(match &config.toolchain_binary {
            Some(binary) => DockerCli::with_binary(binary.clone()),
            None => DockerCli::new(),
        });
        let builder = ImageBuilder::new(
            toolchain.clone(),
            catalog.clone(),
            config.registry.clone(),
        );
        let extractor = CodeExtractor::new(toolchain, config.registry.external_host.clone());
        let orchestrator = Arc::new(Orchestrator::new(catalog, builder, extractor));

        Ok(Self {
            config,
            orchestrator,
        })
    }

    pub async fn start(&self) -> Result<()> {
        let handle = Handle::new();
        let handle_sh = handle.clone();
        tokio::spawn(async move {
            shutdown_signal(handle_sh).await;
            info!("graceful shutdown signal received, shutting down server gracefully");
        });

        let addr: SocketAddr = self.config.listen_addr.parse()?;
        info!("server api listening on {}", self.config.listen_addr);
        let routes = create_routes(RouteState {
            orchestrator: self.orchestrator.clone(),
        });
        axum_server::bind(addr)
            .handle(handle)
            .serve(routes.into_make_service())
            .await?;

        Ok(())
    }
}

async fn shutdown_signal(handle: Handle) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
        },
        _ = terminate => {
        },
    }
    handle.shutdown();
    info!("signal received, shutting down server gracefully");
}
