pub mod broadcast;
pub mod config;
pub mod error;
pub mod health;
pub mod room_manager;
pub mod state;
pub mod ws;

use axum::Router;
use axum::http::HeaderValue;
use tower_http::cors::{AllowOrigin, CorsLayer};

use config::ServerConfig;
use state::AppState;

/// Build the Axum router and application state from a config.
pub fn build_app(config: ServerConfig) -> (Router<()>, AppState) {
    let state = AppState::new(config);
    (router(state.clone()), state)
}

/// Routes for an existing state; used directly by tests that pin the CTF
/// config.
pub fn router(state: AppState) -> Router<()> {
    let cors = cors_layer(&state.config);
    Router::new()
        .route("/ws", axum::routing::get(ws::ws_handler))
        .route("/health", axum::routing::get(health::health_check))
        .route("/", axum::routing::get(health::status))
        .route("/status", axum::routing::get(health::status))
        .fallback(health::not_found)
        .layer(cors)
        .with_state(state)
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins = if config.allows_any_origin() {
        AllowOrigin::any()
    } else {
        let list: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(v) => Some(v),
                Err(e) => {
                    tracing::warn!(origin = %o, error = %e, "Ignoring unusable origin");
                    None
                },
            })
            .collect();
        AllowOrigin::list(list)
    };
    CorsLayer::new().allow_origin(origins)
}
