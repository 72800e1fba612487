//! gtasks MCP Server
//!
//! Model Context Protocol server exposing task-list operations (list, create,
//! complete, link) to LLM agents over stdio. Logs go to stderr so the
//! protocol stream on stdout stays clean.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use rmcp::ServiceExt;
use tracing_subscriber::EnvFilter;

use gtasks_client::{ClientConfig, CredentialManager, TaskOperations};
use gtasks_mcp::server::GTasksMcpServer;
use gtasks_mcp::verify::verify_credentials;

#[derive(Debug, Parser)]
#[command(
    name = "gtasks-mcp",
    about = "MCP server for task lists",
    version,
    after_help = "Configuration: ./gtasks-mcp.toml or <config_dir>/gtasks-mcp/config.toml, \
                  overridden by GTASKS_* environment variables"
)]
struct Cli {
    /// Path to a TOML config file (overrides discovery)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run the authorization flow, print the task lists, and exit
    #[arg(long)]
    auth: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("gtasks_mcp=info".parse()?)
                .add_directive("gtasks_client=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => ClientConfig::load_from_path(path)?,
        None => ClientConfig::load()?,
    };
    tracing::debug!(
        token_path = %config.token_path.display(),
        api_base_url = %config.api_base_url,
        "Configuration loaded"
    );

    let credentials = Arc::new(CredentialManager::new(config)?);

    if cli.auth {
        let report = verify_credentials(&TaskOperations::new(credentials)).await?;
        println!("{report}");
        return Ok(());
    }

    tracing::info!("gtasks-mcp starting (stdio transport)");

    let server = GTasksMcpServer::with_credentials(credentials);
    let transport = rmcp::transport::io::stdio();

    let service = server.serve(transport).await?;
    service.waiting().await?;

    Ok(())
}
