use anyhow::Context;
use clap::Parser;
use explainer_api::Server;
use explainer_core::{ConfigManager, LoggingConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Explain Python code snippets with a local CodeLlama model
#[derive(Parser, Debug)]
#[command(name = "code-explainer", version, about)]
struct Cli {
    /// Address to bind (overrides EXPLAINER_HOST and the config file)
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides EXPLAINER_PORT and the config file)
    #[arg(long)]
    port: Option<u16>,

    /// Explicit TOML config file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Write a default config file to PATH and exit
    #[arg(long, value_name = "PATH")]
    init_config: Option<PathBuf>,
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_new(&logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match logging.format.as_str() {
        "json" => registry.with(fmt::layer().json()).init(),
        "compact" => registry.with(fmt::layer().compact()).init(),
        _ => registry.with(fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(path) = cli.init_config {
        ConfigManager::create_default_config(&path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    let config = ConfigManager::load_from(cli.config.as_deref())
        .context("failed to load configuration")?;
    init_tracing(&config.config().logging);
    config.log_status();

    let server_config = &config.config().server;
    let host = cli.host.unwrap_or_else(|| server_config.host.clone());
    let port = cli.port.unwrap_or(server_config.port);

    let addr = tokio::net::lookup_host((host.as_str(), port))
        .await
        .with_context(|| format!("failed to resolve {}:{}", host, port))?
        .next()
        .with_context(|| format!("no address found for {}:{}", host, port))?;

    let server = Server::new(addr, Arc::new(config))?;
    server.run().await?;

    Ok(())
}
