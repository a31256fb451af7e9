//! Toolhost MCP Server
//!
//! Run with: toolhost-server

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use toolhost::config::{OverflowPolicy, ServerConfig, TransportKind};
use toolhost::dispatch::Dispatcher;
use toolhost::filter::FilterPolicy;
use toolhost::observe::TracingObserver;
use toolhost::registry::ToolRegistry;
use toolhost::transport::{HttpServer, StdioServer};
use toolhost::weather::register_weather_tools;

#[derive(Parser, Debug)]
#[command(name = "toolhost-server")]
#[command(about = "MCP server exposing pure functions as tools")]
struct Args {
    /// Server name reported to clients
    #[arg(long, env = "TOOLHOST_SERVER_NAME", default_value = "toolhost")]
    server_name: String,

    /// Transport (stdio or http)
    #[arg(long, env = "TOOLHOST_TRANSPORT", default_value = "stdio")]
    transport: String,

    /// Bind host for the HTTP transport
    #[arg(long, env = "TOOLHOST_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Bind port for the HTTP transport
    #[arg(long, env = "TOOLHOST_PORT", default_value = "8000")]
    port: u16,

    /// Per-call timeout in milliseconds
    #[arg(long, env = "TOOLHOST_CALL_TIMEOUT_MS", default_value = "30000")]
    call_timeout_ms: u64,

    /// Maximum simultaneous in-flight calls
    #[arg(long, env = "TOOLHOST_MAX_CONCURRENCY", default_value = "10")]
    max_concurrency: usize,

    /// What to do past the concurrency ceiling (queue or reject)
    #[arg(long, env = "TOOLHOST_OVERFLOW", default_value = "queue")]
    overflow: String,

    /// Bound on waiting calls under the queue policy
    #[arg(long, env = "TOOLHOST_QUEUE_DEPTH", default_value = "64")]
    queue_depth: usize,

    /// Only expose these function names (comma separated)
    #[arg(long, env = "TOOLHOST_ALLOW_FUNCTIONS", value_delimiter = ',')]
    allow_functions: Option<Vec<String>>,

    /// Never expose these function names (comma separated)
    #[arg(long, env = "TOOLHOST_DENY_FUNCTIONS", value_delimiter = ',')]
    deny_functions: Option<Vec<String>>,

    /// Only expose tools from these domains (comma separated)
    #[arg(long, env = "TOOLHOST_ALLOW_DOMAINS", value_delimiter = ',')]
    allow_domains: Option<Vec<String>>,

    /// Only expose tools from these categories (comma separated)
    #[arg(long, env = "TOOLHOST_ALLOW_CATEGORIES", value_delimiter = ',')]
    allow_categories: Option<Vec<String>>,
}

impl Args {
    fn into_config(self) -> anyhow::Result<ServerConfig> {
        let transport: TransportKind = self.transport.parse()?;
        let overflow: OverflowPolicy = self.overflow.parse()?;

        let config = ServerConfig {
            server_name: self.server_name,
            server_version: toolhost::VERSION.to_string(),
            transport,
            host: self.host,
            port: self.port,
            call_timeout_ms: self.call_timeout_ms,
            max_concurrency: self.max_concurrency,
            overflow,
            queue_depth: self.queue_depth,
            filter: FilterPolicy {
                function_allowlist: self.allow_functions,
                function_denylist: self.deny_functions,
                domain_allowlist: self.allow_domains,
                category_allowlist: self.allow_categories,
            },
        };
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logging goes to stderr; stdout belongs to the MCP protocol
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = args.into_config().context("invalid configuration")?;

    // Start-up registration; any failure here is fatal
    let mut registry = ToolRegistry::new();
    register_weather_tools(&mut registry).context("tool registration failed")?;
    registry.seal();

    let dispatcher = Arc::new(
        Dispatcher::new(&registry, &config)
            .context("dispatcher setup failed")?
            .with_observer(Arc::new(TracingObserver)),
    );

    tracing::info!(
        server = %config.server_name,
        version = %config.server_version,
        tools = dispatcher.view().len(),
        "toolhost starting"
    );

    match config.transport {
        TransportKind::Stdio => {
            StdioServer::new(dispatcher).run().await?;
        }
        TransportKind::Http => {
            let addr: SocketAddr = format!("{}:{}", config.host, config.port)
                .parse()
                .with_context(|| format!("invalid bind address {}:{}", config.host, config.port))?;
            HttpServer::new(dispatcher, addr).start().await?;
        }
    }

    Ok(())
}
