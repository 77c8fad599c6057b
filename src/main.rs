//! opensift - AI-powered search augmentation layer.
//!
//! ## Usage
//!
//! ### HTTP server mode
//! ```bash
//! opensift serve --port 8080 --config opensift.yaml
//! ```
//!
//! ### One-shot CLI mode
//! ```bash
//! opensift search "transformer models for solar nowcasting"
//! opensift plan "transformer models for solar nowcasting"
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use opensift::config::Settings;
use opensift::engine::SiftEngine;
use opensift::models::{SearchOptions, SearchRequest};
use opensift::server::{app_router, register_configured_adapters, AppState};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// opensift - AI augmentation layer for search backends
#[derive(Parser)]
#[command(name = "opensift")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Path to YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Bind address (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run one search through the full pipeline and print the JSON response
    Search {
        /// Natural language query
        query: String,

        /// Skip LLM verification
        #[arg(long)]
        no_verify: bool,

        /// Skip classification (return raw verified results)
        #[arg(long)]
        no_classify: bool,

        /// Comma-separated adapter names (default: all enabled)
        #[arg(long)]
        adapters: Option<String>,

        /// Max results per query per adapter
        #[arg(long)]
        max_results: Option<u32>,
    },

    /// Generate search queries and criteria only, and print them
    Plan {
        /// Natural language query
        query: String,
    },
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load(cli.config.as_deref())
        .context("Failed to load configuration")?;

    init_logging(&settings, cli.debug);

    match cli.command {
        Commands::Serve { host, port } => {
            let mut settings = settings;
            if let Some(host) = host {
                settings.server.host = host;
            }
            if let Some(port) = port {
                settings.server.port = port;
            }
            run_server(settings).await
        }
        Commands::Search {
            query,
            no_verify,
            no_classify,
            adapters,
            max_results,
        } => {
            let engine = build_engine(settings).await;
            let options = SearchOptions {
                verify: !no_verify,
                classify: !no_classify,
                adapters: adapters
                    .map(|names| names.split(',').map(|s| s.trim().to_string()).collect()),
                max_results: max_results.unwrap_or(10),
                ..Default::default()
            }
            .normalized();
            let request = SearchRequest {
                query,
                options,
                context: Default::default(),
            };

            let response = engine.search(&request).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
            engine.shutdown().await;
            Ok(())
        }
        Commands::Plan { query } => {
            let engine = build_engine(settings).await;
            let request = SearchRequest {
                query,
                options: Default::default(),
                context: Default::default(),
            };
            let response = engine.plan(&request).await;
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
    }
}

fn init_logging(settings: &Settings, debug: bool) {
    let default_level = if debug {
        "debug".to_string()
    } else {
        settings.observability.log_level.clone()
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if settings.observability.log_format == "json" {
        fmt().with_env_filter(filter).json().init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(false)
            .init();
    }
}

async fn build_engine(settings: Settings) -> Arc<SiftEngine> {
    let settings = Arc::new(settings);
    let engine = Arc::new(SiftEngine::new(Arc::clone(&settings)));
    engine.initialize().await;
    register_configured_adapters(&engine, &settings).await;
    engine
}

// ============================================================================
// HTTP Server
// ============================================================================

async fn run_server(settings: Settings) -> Result<()> {
    let host = settings.server.host.clone();
    let port = settings.server.port;
    info!(host = %host, port = port, "Starting HTTP server");

    let engine = build_engine(settings).await;
    let app = app_router(AppState {
        engine: Arc::clone(&engine),
    });

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .context("Invalid host:port")?;

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
            let holders = port_holders(port);
            error!(port = port, holders = %holders, "Port is already in use");
            eprintln!("Error: port {port} is already bound{holders}");
            std::process::exit(1);
        }
        Err(e) => return Err(e).context("Failed to bind listener"),
    };

    println!("Listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    engine.shutdown().await;
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Received shutdown signal");
    }
}

/// Best-effort lookup of the PIDs holding a port, for the bind diagnostic.
fn port_holders(port: u16) -> String {
    let output = Command::new("lsof")
        .args(["-t", "-i", &format!(":{port}")])
        .output();
    match output {
        Ok(out) if out.status.success() => {
            let pids: Vec<&str> = std::str::from_utf8(&out.stdout)
                .unwrap_or_default()
                .split_whitespace()
                .collect();
            if pids.is_empty() {
                String::new()
            } else {
                format!(" (held by PID {})", pids.join(", "))
            }
        }
        _ => String::new(),
    }
}
