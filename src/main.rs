//! Gold token wallet MCP server
//!
//! Serves the wallet tools over stdio.

use std::sync::Arc;

use rmcp::ServiceExt;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use goldtoken_wallet::{Config, GoldTokenServer, HttpWallet, ProviderAdapter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    tracing::info!("Starting gold token wallet server");

    let provider = match &config.wallet_rpc_url {
        Some(url) => {
            let wallet = HttpWallet::new(url, config.account_poll_interval)?;
            ProviderAdapter::new(Arc::new(wallet))
        }
        None => {
            tracing::warn!("WALLET_RPC_URL not set; running without a wallet");
            ProviderAdapter::unavailable()
        }
    };

    let server = GoldTokenServer::new(&config, provider).await?;

    // Run with stdio transport
    let transport = rmcp::transport::stdio();
    let running = server.clone().serve(transport).await?;

    running.waiting().await?;
    server.session().teardown();

    Ok(())
}
