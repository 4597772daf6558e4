pub mod auth;
pub mod config;
pub mod db;
pub mod logging;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod services;
pub mod state;

use std::sync::Arc;

use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Config;
use crate::db::DatabaseProxy;
use crate::services::llm_provider::{LLMProvider, TextGenerator};
use crate::state::AppState;

/// Application wired from the environment; runs without a database when none is reachable.
pub async fn create_app() -> axum::Router {
    let config = Config::from_env();
    let db_proxy = match DatabaseProxy::connect(&config).await {
        Ok(proxy) => Some(proxy),
        Err(err) => {
            tracing::warn!(error = %err, "database not initialized");
            None
        }
    };

    create_app_with(config, db_proxy, Arc::new(LLMProvider::from_env()))
}

pub fn create_app_with(
    config: Config,
    db_proxy: Option<Arc<DatabaseProxy>>,
    llm: Arc<dyn TextGenerator>,
) -> axum::Router {
    let state = AppState::new(Arc::new(config), db_proxy, llm);

    routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
