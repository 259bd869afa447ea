//! Axum router wiring (HTTP API, WS upgrade, ops endpoints).

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::{api, app_state::AppState, ops, transport};

pub fn build_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.cfg().gateway.cors_origins);

    Router::new()
        .route("/v1/ws", get(transport::ws::ws_upgrade))
        .route("/v1/messages/:to", post(api::send_message))
        .route("/v1/presence", get(api::presence))
        .route("/healthz", get(ops::healthz))
        .route("/readyz", get(ops::readyz))
        .route("/metrics", get(ops::metrics))
        .with_state(state)
        .layer(cors)
}

/// Permissive when no origins are configured; unparsable entries are skipped.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| o.trim().parse().ok())
        .collect();
    if parsed.is_empty() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(parsed))
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([
                header::AUTHORIZATION,
                header::CONTENT_TYPE,
                HeaderName::from_static(transport::USER_HEADER),
            ])
            .allow_credentials(true)
    }
}
