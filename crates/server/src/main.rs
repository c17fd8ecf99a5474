use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

mod config;
mod prompts;
mod resources;
mod tools;

use config::ServerConfig;
use prompts::StorePrompts;
use resources::CatalogResources;
use storefront_mcp::messages::Implementation;
use storefront_mcp::{McpServer, ToolRegistry};
use storefront_sdk::StoreClient;
use tools::{GetOrderTool, ListOrdersTool, ListProductsTool, SearchProductsTool};

#[derive(Parser, Debug)]
#[command(name = "storefront")]
#[command(about = "MCP server for the storefront e-commerce API", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "storefront.toml")]
    config: PathBuf,

    /// Base URL of the storefront API (overrides the config file)
    #[arg(long, env = "STOREFRONT_API_URL")]
    api_url: Option<String>,

    /// Bearer token for order endpoints
    #[arg(long, env = "STOREFRONT_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // All diagnostics go to stderr; stdout carries protocol traffic only.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storefront=info".into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let args = Args::parse();

    tracing::info!("Starting storefront MCP server");

    let mut config = ServerConfig::load(&args.config)?;
    if let Some(api_url) = args.api_url {
        config.backend.base_url = api_url;
    }
    if let Some(api_token) = args.api_token {
        config.backend.api_token = Some(api_token);
    }
    tracing::info!(backend = %config.backend.base_url, "Backend configured");

    let mut builder = StoreClient::builder()
        .base_url(&config.backend.base_url)
        .timeout(config.timeout());
    if let Some(token) = &config.backend.api_token {
        builder = builder.api_token(token);
    }
    let client = Arc::new(builder.build()?);

    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(ListProductsTool::new(client.clone())));
    registry.register(Arc::new(SearchProductsTool::new(client.clone())));
    registry.register(Arc::new(ListOrdersTool::new(client.clone())));
    registry.register(Arc::new(GetOrderTool::new(client.clone())));
    tracing::info!("Registered {} tools", registry.len());

    let mut server = McpServer::new(Implementation {
        name: "storefront".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
    .with_instructions(
        "Browse and search the storefront catalog, and inspect customer orders. \
         Product data is also available as store:// resources.",
    );

    server.attach_tools(Arc::new(registry));
    server.attach_resources(Arc::new(CatalogResources::new(client.clone())));
    server.attach_prompts(Arc::new(StorePrompts::new()));

    server.run_stdio().await
}
