//! HTTP route definitions

use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::app::AppState;
use crate::game::RegistryStats;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.client_origins);

    Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(cors),
        )
        .with_state(state)
}

/// CORS from the configured allow-list; any origin when the list is empty
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|s| s.parse::<HeaderValue>().ok())
        .collect();

    let allow_origin = if allowed.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(allowed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    queue_size: usize,
    connections: usize,
    #[serde(flatten)]
    matches: RegistryStats,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let queue_size = state.matchmaker.queue_size().await;

    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        queue_size,
        connections: state.hub.len(),
        matches: state.registry.stats(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_body_flattens_registry_stats() {
        let body = HealthResponse {
            status: "ok",
            uptime_secs: 3,
            queue_size: 1,
            connections: 2,
            matches: RegistryStats {
                active_matches: 4,
                ..RegistryStats::default()
            },
        };
        let value = serde_json::to_value(body).unwrap();
        assert_eq!(value["status"], "ok");
        assert_eq!(value["active_matches"], 4);
        assert_eq!(value["queue_size"], 1);
    }

    #[test]
    fn unparseable_origins_are_skipped() {
        // Must not panic on garbage, and an all-invalid list falls back to any origin
        let _ = cors_layer(&["http://ok.test".to_string(), "bad\norigin".to_string()]);
        let _ = cors_layer(&[]);
    }
}
