//! CLI interface for autobridge.

pub mod commands;
pub mod output;

use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

use output::OutputMode;

/// Autobridge - MCP adapter for a device automation backend
#[derive(Parser)]
#[command(name = "autobridge", version, about, long_about = None)]
pub struct Cli {
    /// Override data directory (default: ~/.autobridge)
    #[arg(long, env = "AUTOBRIDGE_DATA_PATH", global = true)]
    pub data_path: Option<PathBuf>,

    /// Output as JSON instead of human-readable format
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start MCP server (stdio transport)
    Mcp,

    /// List registered operations, or show one operation's parameters
    Tools {
        /// Operation name
        name: Option<String>,
    },

    /// List resources and resource templates
    Resources,

    /// Invoke one operation, as an MCP client would
    Call {
        /// Operation name (e.g. list_devices)
        tool: String,
        /// Arguments as a JSON object
        #[arg(long, default_value = "{}")]
        args: String,
    },

    /// Read one resource by URI
    Read {
        /// Resource URI (e.g. autobridge://devices)
        uri: String,
    },

    /// Show the effective configuration
    Config,

    /// Generate shell completions
    Completions {
        /// Shell type (bash, zsh, fish, elvish, powershell)
        shell: clap_complete::Shell,
    },
}

/// Execute a non-MCP command.
pub async fn execute(
    command: &Commands,
    ctx: &crate::init::AppContext,
    mode: OutputMode,
) -> anyhow::Result<()> {
    match command {
        Commands::Mcp => unreachable!("MCP handled in main"),
        Commands::Tools { name } => commands::handle_tools(ctx, name.as_deref(), mode)?,
        Commands::Resources => commands::handle_resources(ctx, mode)?,
        Commands::Call { tool, args } => commands::handle_call(ctx, tool, args, mode).await?,
        Commands::Read { uri } => commands::handle_read(ctx, uri, mode).await?,
        Commands::Config => commands::handle_config(ctx, mode)?,
        Commands::Completions { shell } => {
            clap_complete::generate(
                *shell,
                &mut Cli::command(),
                "autobridge",
                &mut std::io::stdout(),
            );
        }
    }
    Ok(())
}
