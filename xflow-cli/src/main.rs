//! Command-line driver for the X.com login flow.
//!
//! Runs one login attempt end to end and exits 0 on full success, 1 on any
//! failure. Proxy configuration falls back to the standard environment
//! variables when `--proxy` is absent.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use xflow::{
    AuthConfig, EncryptionConfig, FlowOrchestrator, HttpTransport, ProxyConfig,
    RandomTransactionSigner, StaticSolver, Transport,
};

/// Multi-step X.com login flow with Castle token support.
#[derive(Parser)]
#[command(name = "xflow", version, about)]
struct Cli {
    /// Username or email to authenticate with
    identifier: String,

    /// Proxy URL (e.g. http://127.0.0.1:8080); defaults to HTTPS_PROXY/HTTP_PROXY
    #[arg(long)]
    proxy: Option<String>,

    /// Enable debug-level logging
    #[arg(long)]
    debug: bool,

    /// API key for the Castle issuance endpoint (higher quota)
    #[arg(long)]
    api_key: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("login flow failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let proxy = cli.proxy.or_else(|| ProxyConfig::from_env().url);
    if let Some(url) = &proxy {
        tracing::info!(proxy = %url, "routing through proxy");
    }

    let transport: Arc<dyn Transport> =
        Arc::new(HttpTransport::new(proxy.as_deref()).context("failed to build http transport")?);

    let auth = AuthConfig {
        castle_api_key: cli.api_key,
        ..AuthConfig::default()
    };

    let mut orchestrator = FlowOrchestrator::new(
        transport,
        auth,
        EncryptionConfig::default(),
        Box::new(RandomTransactionSigner),
        Box::new(StaticSolver::new(r#"{"rf":{},"s":""}"#)),
    );

    orchestrator
        .execute_login_flow(&cli.identifier)
        .await
        .context("login flow did not complete")?;
    Ok(())
}
