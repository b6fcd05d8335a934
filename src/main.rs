use std::path::PathBuf;

use ::tracing::{error, info_span};
use clap::Parser;

mod archive;
mod code_extractor;
mod config;
mod error;
mod http_objects;
mod image_builder;
mod orchestrator;
mod routes;
mod runtime;
mod scaffold;
mod service;
mod toolchain;
mod tracing;

#[cfg(test)]
mod testing;

use service::Service;
use tracing::setup_tracing;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[arg(short, long, value_name = "config file", help = "Path to config file")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = match cli.config {
        Some(path) => config::ServerConfig::from_path(path.to_str().unwrap()).unwrap(),
        None => config::ServerConfig::default(),
    };

    setup_tracing(&config)
        .inspect_err(|e| {
            error!("Error setting up tracing: {:?}", e);
        })
        .unwrap();

    let root_span = info_span!("forge", env = config.env);
    let _guard = root_span.enter();

    let service = Service::new(config);
    if let Err(err) = service {
        error!("Error creating service: {:?}", err);
        return;
    }
    if let Err(err) = service.unwrap().start().await {
        error!("Error starting service: {:?}", err);
    }
}
