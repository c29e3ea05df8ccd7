//! Autobridge - MCP adapter for a device automation backend
//!
//! Usage:
//!   autobridge mcp                         Start MCP server on stdio
//!   autobridge tools                       List operations
//!   autobridge call list_devices           Invoke one operation
//!   autobridge read autobridge://devices   Read one resource
//!   autobridge --help                      Show all commands

use anyhow::Result;
use clap::Parser;

use autobridge::cli::output::{print_error, OutputMode};
use autobridge::cli::{Cli, Commands};
use autobridge::init::AppContext;
use autobridge::mcp::server::run_mcp_server;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Tracing to stderr (safe for MCP stdio transport)
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("autobridge=info".parse()?),
        )
        .init();

    let mode = OutputMode::from_json_flag(cli.json);

    match &cli.command {
        Commands::Mcp => {
            let ctx = AppContext::new(cli.data_path.clone()).await?;
            run_mcp_server(ctx).await?;
        }
        cmd => {
            let ctx = AppContext::new(cli.data_path.clone()).await?;
            if let Err(e) = autobridge::cli::execute(cmd, &ctx, mode).await {
                print_error(&format!("{:#}", e));
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
