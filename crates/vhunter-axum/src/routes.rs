//! Route definitions and router construction.
//!
//! Axum 0.8 uses brace syntax for path parameters: `{id}`.

use axum::Router;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};

use crate::bootstrap::CorsConfig;
use crate::handlers;
use crate::state::AppState;

fn build_cors_layer(config: &CorsConfig) -> CorsLayer {
    match config {
        CorsConfig::AllowAll => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
        CorsConfig::AllowOrigins(origins) => {
            let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            CorsLayer::new()
                .allow_origin(allowed)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    }
}

/// API routes without the `/api` prefix and without state applied.
pub(crate) fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/download", post(handlers::tasks::create))
        .route("/downloads", get(handlers::tasks::list))
        .route("/downloads/clear", post(handlers::tasks::clear))
        .route("/downloads/{id}", get(handlers::tasks::get))
        .route("/downloads/{id}/cancel", post(handlers::tasks::cancel))
        .route("/downloads/{id}/download", get(handlers::files::download))
        .route("/video-info", get(handlers::info::video_info))
        .route("/events", get(handlers::events::stream))
}

/// Create the main router: `/api/*`, `/ws`, `/direct-download` and `/health`.
pub fn create_router(state: AppState, cors_config: &CorsConfig) -> Router {
    let cors = build_cors_layer(cors_config);

    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/ws", get(handlers::ws::upgrade))
        .route("/direct-download", post(handlers::direct::direct_download))
        .nest("/api", api_routes())
        .layer(cors)
        .with_state(state)
}
