//! Command-line surface: transport selection and upstream settings.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::error::BiolinkMcpError;
use crate::sources::ClientConfig;
use crate::sources::biolink::BiolinkClient;
use crate::tools::ToolRegistry;

pub mod health;

#[derive(Parser, Debug)]
#[command(name = "biolink-mcp", version, about = "MCP server for the Monarch Biolink API")]
#[command(
    long_about = "Biolink MCP exposes the Monarch Initiative knowledge graph (entities, search, \
                  term normalization and association tables) as Model Context Protocol tools \
                  over stdio or HTTP/SSE."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub upstream: UpstreamArgs,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve over the transport named by --transport / MCP_TRANSPORT
    Run {
        #[arg(long, value_enum, env = "MCP_TRANSPORT", default_value_t = Transport::Sse)]
        transport: Transport,

        #[command(flatten)]
        bind: BindArgs,
    },
    /// Serve over stdin/stdout for MCP clients that spawn the server
    Stdio,
    /// Serve over HTTP with Server-Sent Events
    Sse {
        #[command(flatten)]
        bind: BindArgs,
    },
    /// Check the upstream API and print a health report
    Health,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Stdio,
    Sse,
}

#[derive(Args, Debug, Clone)]
pub struct BindArgs {
    /// Interface address to listen on
    #[arg(long, env = "MCP_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// TCP port to listen on
    #[arg(long, env = "MCP_PORT", default_value_t = 3001)]
    pub port: u16,
}

impl BindArgs {
    pub fn socket_addr(&self) -> Result<SocketAddr, BiolinkMcpError> {
        let ip: IpAddr = self.host.trim().parse().map_err(|e| {
            BiolinkMcpError::Config(format!("Invalid host address '{}': {e}", self.host))
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

#[derive(Args, Debug, Clone)]
pub struct UpstreamArgs {
    /// Base URL of the Biolink REST API
    #[arg(
        long,
        global = true,
        env = "BIOLINK_API_BASE",
        default_value = "https://api-v3.monarchinitiative.org/v3/api/"
    )]
    pub api_base: String,

    /// Per-request timeout in seconds
    #[arg(long, global = true, env = "BIOLINK_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,

    /// Retries for connect errors, timeouts, 429 and 5xx responses
    #[arg(long, global = true, env = "BIOLINK_MAX_RETRIES", default_value_t = 2)]
    pub max_retries: u32,

    /// Prefix prepended to every tool name
    #[arg(long, global = true, env = "BIOLINK_TOOL_PREFIX", default_value = "biolink_")]
    pub tool_prefix: String,
}

impl UpstreamArgs {
    pub(crate) fn client_config(&self) -> Result<ClientConfig, BiolinkMcpError> {
        if self.timeout_secs == 0 {
            return Err(BiolinkMcpError::Config(
                "Timeout must be at least one second".into(),
            ));
        }
        Ok(ClientConfig {
            base_url: self.api_base.trim().to_string(),
            timeout: Duration::from_secs(self.timeout_secs),
            max_retries: self.max_retries,
            ..ClientConfig::default()
        })
    }
}

/// Builds the upstream client and registers the Biolink tool table.
///
/// # Errors
///
/// Returns [`BiolinkMcpError::Config`] for an invalid base URL or timeout.
pub fn build_registry(upstream: &UpstreamArgs) -> Result<ToolRegistry, BiolinkMcpError> {
    let client = Arc::new(BiolinkClient::new(&upstream.client_config()?)?);
    let mut registry = ToolRegistry::new();
    crate::tools::biolink::register_tools(&mut registry, client, &upstream.tool_prefix)?;
    Ok(registry)
}

#[derive(Debug)]
pub enum CommandOutput {
    /// A transport ran until shutdown.
    Served,
    Report { text: String, healthy: bool },
}

/// Executes a parsed command.
///
/// # Errors
///
/// Returns an error for invalid configuration or transport startup failure.
pub async fn run(cli: Cli) -> anyhow::Result<CommandOutput> {
    match cli.command {
        Commands::Run { transport, bind } => {
            serve(transport, &bind, &cli.upstream).await?;
            Ok(CommandOutput::Served)
        }
        Commands::Stdio => {
            let registry = build_registry(&cli.upstream)?;
            crate::mcp::run_stdio(Arc::new(registry)).await?;
            Ok(CommandOutput::Served)
        }
        Commands::Sse { bind } => {
            serve(Transport::Sse, &bind, &cli.upstream).await?;
            Ok(CommandOutput::Served)
        }
        Commands::Health => {
            let report = health::run(&cli.upstream).await?;
            Ok(CommandOutput::Report {
                text: report.to_markdown(),
                healthy: report.ok,
            })
        }
    }
}

async fn serve(
    transport: Transport,
    bind: &BindArgs,
    upstream: &UpstreamArgs,
) -> anyhow::Result<()> {
    let registry = Arc::new(build_registry(upstream)?);
    match transport {
        Transport::Stdio => crate::mcp::run_stdio(registry).await,
        Transport::Sse => crate::mcp::run_sse(bind.socket_addr()?, registry).await,
    }
}
