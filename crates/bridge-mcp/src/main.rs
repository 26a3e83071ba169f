//! Commit bridge server
//!
//! # Usage
//!
//! ```bash
//! bridge-mcp [--config <file>] [--port <n>] [--bind <addr>]
//! ```
//!
//! # Environment Variables
//!
//! - `GITHUB_OWNER`, `GITHUB_REPO`, `GITHUB_PAT`: target repository (required)
//! - `DEFAULT_BRANCH`: branch used when a request names none (default `main`)
//! - `RENDER_API_KEY`, `RENDER_SERVICE_ID`: enable deploys
//! - `PORT`, `BIND_ADDRESS`: listener (default `0.0.0.0:3000`)
//! - `RUST_LOG`: log verbosity (default: `bridge_mcp=info`)

use std::path::PathBuf;

use bridge_config::BridgeConfig;
use bridge_mcp::AppState;
use clap::Parser;

/// HTTP/MCP bridge for atomic GitHub commits and Render deploys
#[derive(Parser)]
#[command(name = "bridge-mcp")]
#[command(about = "HTTP/MCP bridge for atomic GitHub commits and Render deploys")]
#[command(version)]
struct Args {
    /// TOML config file; environment variables override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Address to bind
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so stdout stays free for tooling.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("bridge_mcp=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = BridgeConfig::load(args.config.as_deref(), |key| std::env::var(key).ok())?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    let addr = config.server.socket_addr()?;

    tracing::info!(
        repository = %format!("{}/{}", config.github.owner, config.github.repo),
        default_branch = %config.github.default_branch,
        "Starting bridge-mcp server"
    );

    let state = AppState::from_config(&config)?;
    bridge_mcp::serve(addr, state).await?;

    Ok(())
}
