//! Agent jury backend - binary entry point.
//!
//! ```text
//! main() -> JuryConfig::load() -> Jury::from_config() -> server::serve()
//! ```
//!
//! Configuration comes from the optional `$JURY_CONFIG` TOML file and the
//! environment (see [`jury_engine::config`]). Logging goes to stderr, filtered
//! by `RUST_LOG` (default `info`).

mod server;

use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use jury_engine::{Jury, JuryConfig};

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = JuryConfig::load().context("failed to load configuration")?;
    tracing::info!(
        provider = config.provider.as_str(),
        model = %config.models.primary(),
        fallbacks = config.models.fallbacks().len(),
        "Configuration loaded"
    );

    let jury = Jury::from_config(&config).context("failed to initialise the LLM provider")?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("Agent Jury backend listening on http://{addr}");

    server::serve(listener, Arc::new(jury))
        .await
        .context("server error")
}
