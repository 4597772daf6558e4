use std::net::SocketAddr;
use std::sync::Arc;

use adaptive_backend::config::Config;
use adaptive_backend::db::migrate::run_migrations;
use adaptive_backend::db::operations::sessions;
use adaptive_backend::db::DatabaseProxy;
use adaptive_backend::logging::init_tracing;
use adaptive_backend::services::llm_provider::{LLMProvider, TextGenerator};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();
    let _log_guard = init_tracing(&config.log_level);

    if config.jwt_secret.is_none() {
        tracing::warn!("JWT_SECRET is not set; authenticated routes will answer 503");
    }

    let db_proxy = match DatabaseProxy::connect(&config).await {
        Ok(proxy) => {
            if let Err(err) = run_migrations(proxy.pool()).await {
                tracing::error!(error = %err, "database migrations failed");
            }
            match sessions::purge_expired(&proxy).await {
                Ok(purged) => tracing::info!(purged, "expired refresh sessions removed"),
                Err(err) => tracing::warn!(error = %err, "refresh session cleanup failed"),
            }
            Some(proxy)
        }
        Err(err) => {
            tracing::warn!(error = %err, "database not initialized, data routes will answer 503");
            None
        }
    };

    let llm = Arc::new(LLMProvider::from_env());
    if !llm.is_available() {
        tracing::warn!("LLM_API_KEY is not set; generation routes will answer 503");
    }

    let addr = config.bind_addr();
    let app = adaptive_backend::create_app_with(config, db_proxy, llm);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(error = %err, %addr, "bind listener failed");
            return;
        }
    };
    tracing::info!(%addr, "adaptive-backend listening");

    let server = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal());

    if let Err(err) = server.await {
        tracing::error!(error = %err, "server error");
    }

    tracing::info!("Graceful shutdown complete");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
