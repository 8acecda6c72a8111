use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::Config;
use crate::server;

pub async fn run(config: Config) -> Result<()> {
    let config = Arc::new(config);

    let state = server::build_state(config.clone()).context("building app state")?;
    if state.gemini.is_none() {
        warn!("GEMINI_API_KEY not configured — /translate and /analyze will return errors");
    }
    if state.exa.is_none() {
        warn!("EXA_API_KEY not configured — /search will return errors");
    }

    let router = server::build_router(state);
    let listener = tokio::net::TcpListener::bind(&config.rasad.listen)
        .await
        .with_context(|| format!("binding to {}", config.rasad.listen))?;

    info!(listen = %config.rasad.listen, "HTTP server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(wait_for_shutdown())
        .await
        .context("serving HTTP")?;

    info!("shutdown complete");
    Ok(())
}

async fn wait_for_shutdown() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to register SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {},
            _ = sigterm.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
}
