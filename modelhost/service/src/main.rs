use std::path::{Path, PathBuf};

use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use modelhost_service::{configure, AppState, RegistryTarget, ServiceConfig, ServiceTelemetry};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "modelhost", version, about = "Train, publish and score tabular classifiers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Runs the HTTP service.
    Serve {
        #[arg(long)]
        config: Option<PathBuf>,
        /// Listen address, overrides the config file.
        #[arg(long)]
        bind: Option<String>,
        /// Listen port, overrides the config file and MODELHOST_PORT.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Prints the registry base used for a data-source URL.
    ResolveHost {
        url: String,
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn load_config(path: Option<&Path>) -> Result<ServiceConfig> {
    match path {
        Some(path) => ServiceConfig::load(path),
        None => Ok(ServiceConfig::default()),
    }
}

fn build_telemetry(config: &ServiceConfig) -> Result<ServiceTelemetry> {
    let builder = ServiceTelemetry::builder("modelhost")
        .min_level(config.log_level()?)
        .stderr(true);
    let builder = match &config.logging.path {
        Some(path) => builder.log_path(path),
        None => builder,
    };
    builder.build().context("opening structured log")
}

async fn serve(config: ServiceConfig, bind: Option<String>, port: Option<u16>) -> Result<()> {
    let bind = bind.unwrap_or_else(|| config.server.bind.clone());
    let port = config.port(port)?;
    let telemetry = build_telemetry(&config)?;
    let state = web::Data::new(AppState::from_config(&config, telemetry)?);

    info!(%bind, port, registry = ?config.registry.base_url, "starting modelhost");
    let mut server = HttpServer::new(move || App::new().app_data(state.clone()).configure(configure));
    if let Some(workers) = config.server.workers {
        server = server.workers(workers);
    }
    server
        .bind((bind.as_str(), port))
        .with_context(|| format!("binding {bind}:{port}"))?
        .run()
        .await
        .context("running http server")?;
    info!("modelhost stopped");
    Ok(())
}

#[actix_web::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve { config, bind, port } => {
            let config = load_config(config.as_deref())?;
            serve(config, bind, port).await
        }
        Commands::ResolveHost { url, config } => {
            let config = load_config(config.as_deref())?;
            let base = RegistryTarget::new(config.registry.base_url.clone())
                .resolve(&url)
                .with_context(|| format!("resolving registry for {url}"))?;
            println!("{base}");
            Ok(())
        }
    }
}
