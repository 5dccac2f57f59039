//! panelgen command line
//!
//! Compiles a schema catalog into editor configurations and either prints them
//! or serves them over HTTP.
//!
//! # Example
//!
//! ```bash
//! panelgen compile --catalog schemas.json --route /posts --pretty
//! panelgen serve --catalog schemas.json --port 8080
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use panelgen_core::{EditorConfig, SchemaCatalog};
use panelgen_runtime::config::HttpConfig;
use panelgen_runtime::http;
use std::collections::BTreeMap;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Admin panel configuration generator
#[derive(Parser, Debug)]
#[command(name = "panelgen")]
#[command(about = "Compile collection schemas into admin editor configurations")]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, env = "PANELGEN_LOG_JSON", global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print compiled editor configurations as JSON
    Compile {
        /// Schema catalog file (JSON object keyed by collection name)
        #[arg(long, env = "PANELGEN_CATALOG")]
        catalog: PathBuf,

        /// Print only the editor mounted at this root path
        #[arg(long)]
        route: Option<String>,

        /// Pretty-print the output
        #[arg(long)]
        pretty: bool,
    },
    /// Serve compiled editor configurations over HTTP
    Serve {
        /// Schema catalog file (JSON object keyed by collection name)
        #[arg(long, env = "PANELGEN_CATALOG")]
        catalog: PathBuf,

        /// Bind address
        #[arg(long, default_value = "0.0.0.0", env = "PANELGEN_HOST")]
        host: String,

        /// Listen port
        #[arg(long, default_value = "8080", env = "PANELGEN_PORT")]
        port: u16,

        /// Request timeout in seconds
        #[arg(long, default_value = "30", env = "PANELGEN_TIMEOUT_SECS")]
        timeout_secs: u64,

        /// Allowed CORS origin, repeatable. Defaults to any.
        #[arg(long = "cors-origin")]
        cors_origins: Vec<String>,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_editors(path: &Path) -> anyhow::Result<BTreeMap<String, EditorConfig>> {
    let document = std::fs::read_to_string(path)
        .with_context(|| format!("reading catalog {}", path.display()))?;
    let catalog = SchemaCatalog::from_json(&document)
        .with_context(|| format!("parsing catalog {}", path.display()))?;
    let editors = catalog.compile_all();
    info!(
        collections = catalog.len(),
        editors = editors.len(),
        "catalog compiled"
    );
    Ok(editors)
}

fn print_json(value: &impl serde::Serialize, pretty: bool) -> anyhow::Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{text}");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Compile {
            catalog,
            route,
            pretty,
        } => {
            let editors = load_editors(&catalog)?;
            match route {
                Some(route) => {
                    let editor = editors
                        .get(&route)
                        .ok_or_else(|| anyhow!("no editor mounted at {route}"))?;
                    print_json(editor, pretty)
                }
                None => print_json(&editors, pretty),
            }
        }
        Command::Serve {
            catalog,
            host,
            port,
            timeout_secs,
            cors_origins,
        } => {
            let editors = load_editors(&catalog)?;
            let defaults = HttpConfig::default();
            let config = HttpConfig {
                host,
                port,
                cors_origins: if cors_origins.is_empty() {
                    defaults.cors_origins
                } else {
                    cors_origins
                },
                request_timeout: Duration::from_secs(timeout_secs),
            };
            let listener = http::bind(&config).await?;
            http::serve(listener, http::build_router(editors, &config), shutdown_signal()).await
        }
    }
}
