//! Axum server bootstrap - the composition root.
//!
//! This module is the only place where the engine is wired to the web
//! adapter: it builds the task manager from settings, attaches the SSE
//! broadcaster as an observer and runs the HTTP server until a shutdown
//! signal arrives.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use vhunter_core::{ObserverId, Settings};
use vhunter_download::{TaskManager, build_task_manager};

use crate::routes::create_router;
use crate::sse::SseBroadcaster;

/// CORS configuration for the web server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CorsConfig {
    /// Allow all origins.
    #[default]
    AllowAll,
    /// Allow specific origins.
    AllowOrigins(Vec<String>),
}

impl CorsConfig {
    /// `*` anywhere in the list, or an empty list, allows everything.
    pub fn from_origins(origins: &[String]) -> Self {
        if origins.is_empty() || origins.iter().any(|o| o.trim() == "*") {
            Self::AllowAll
        } else {
            Self::AllowOrigins(origins.to_vec())
        }
    }
}

/// Application context for the Axum adapter.
pub struct AxumContext {
    pub manager: Arc<TaskManager>,
    /// Broadcast-backed observer feeding `/api/events`.
    pub sse: Arc<SseBroadcaster>,
    pub settings: Arc<Settings>,
    /// Fired on shutdown so long-lived streams and sockets close.
    pub shutdown: CancellationToken,
    sse_observer: ObserverId,
}

impl AxumContext {
    /// Wrap a running manager and subscribe the SSE broadcaster to it.
    pub async fn new(manager: Arc<TaskManager>, settings: Settings) -> Self {
        let sse = Arc::new(SseBroadcaster::with_defaults());
        let sse_observer = manager.subscribe(sse.clone()).await;
        Self {
            manager,
            sse,
            settings: Arc::new(settings),
            shutdown: CancellationToken::new(),
            sse_observer,
        }
    }

    /// Detach the SSE observer, close live connections and stop the workers.
    pub async fn close(&self) {
        self.shutdown.cancel();
        self.manager.unsubscribe(self.sse_observer).await;
        self.manager.shutdown().await;
    }
}

/// Scratch directory for task-less direct downloads.
pub fn scratch_dir() -> PathBuf {
    std::env::temp_dir().join("vhunter")
}

/// Build the engine and adapter context from settings.
pub async fn bootstrap(settings: Settings) -> Result<AxumContext> {
    let output_dir = &settings.downloader.output_dir;
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("creating output directory {}", output_dir.display()))?;
    let scratch = scratch_dir();
    std::fs::create_dir_all(&scratch)
        .with_context(|| format!("creating scratch directory {}", scratch.display()))?;

    info!(
        output_dir = %output_dir.display(),
        scratch_dir = %scratch.display(),
        ytdlp = %settings.ytdlp.path,
        max_concurrent = settings.downloader.max_concurrent,
        douyin_direct_api = settings.douyin.enable_direct_api,
        "bootstrapping vhunter"
    );

    let manager = build_task_manager(&settings, scratch)?;
    Ok(AxumContext::new(manager, settings).await)
}

/// Start the web server and run until Ctrl-C or SIGTERM.
pub async fn start_server(settings: Settings) -> Result<()> {
    let cors = CorsConfig::from_origins(&settings.server.cors_origins);
    let addr = format!("{}:{}", settings.server.host, settings.server.port);

    let ctx = Arc::new(bootstrap(settings).await?);
    let app = create_router(Arc::clone(&ctx), &cors);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(addr = %addr, "vhunter listening on http://{}", addr);

    let shutdown = ctx.shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("shutdown signal received");
            shutdown.cancel();
        })
        .await?;

    ctx.close().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_from_origins() {
        assert_eq!(CorsConfig::from_origins(&[]), CorsConfig::AllowAll);
        assert_eq!(
            CorsConfig::from_origins(&["*".to_string()]),
            CorsConfig::AllowAll
        );
        let origins = vec!["http://localhost:3000".to_string()];
        assert_eq!(
            CorsConfig::from_origins(&origins),
            CorsConfig::AllowOrigins(origins.clone())
        );
    }
}
