//! docconv RPC server - JSON-RPC backend for the desktop shell.
//!
//! Wraps the docconv-core toolchain API so the shell can discover, update
//! and invoke pandoc over a local HTTP connection.

mod handlers;
mod server;
mod wrapper;

use anyhow::{Context, Result};
use clap::Parser;
use docconv_core::ToolchainApi;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "docconv-rpc")]
#[command(about = "JSON-RPC server for the docconv toolchain")]
struct Args {
    /// Port to listen on (0 = auto-assign)
    #[arg(short, long, default_value = "0")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    /// Application data directory (defaults to the platform data dir)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Directory holding bundled tool binaries
    #[arg(long)]
    resource_dir: Option<PathBuf>,

    /// Base URL of the release registry API
    #[arg(long)]
    registry_url: Option<String>,
}

fn init_logging(debug: bool, json: bool) {
    let level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug, args.log_json);

    info!("Starting docconv RPC server");

    let data_dir = match args.data_dir {
        Some(dir) => dir,
        None => docconv_core::platform::default_data_dir()
            .context("could not determine the application data directory")?,
    };
    info!("Data directory: {}", data_dir.display());

    let mut builder = ToolchainApi::builder(data_dir);
    if let Some(dir) = args.resource_dir {
        builder = builder.resource_dir(dir);
    }
    if let Some(url) = args.registry_url {
        builder = builder.registry_base_url(url);
    }
    let api = Arc::new(builder.build().await?);

    // Discovery probes every candidate binary; run it after the port is published.
    let warmup = Arc::clone(&api);
    tokio::spawn(async move {
        let selected = warmup.initialize().await;
        for (tool, manager) in selected {
            match manager {
                Some(m) => info!("Active {}: {}", tool, m.source()),
                None => info!("No working {} found", tool),
            }
        }
    });

    let addr = server::start_server(api, &args.host, args.port).await?;

    // The shell reads this line from stdout to find the server.
    println!("RPC_PORT={}", addr.port());

    info!("RPC server running on {}", addr);

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, exiting");

    Ok(())
}
