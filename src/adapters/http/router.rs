//! Top-level router: billing routes plus the tower-http middleware stack.

use axum::http::{header, HeaderValue, Method};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;

use super::billing::{billing_routes, BillingAppState, SIGNATURE_HEADER};

/// Build the application router.
///
/// Layers, outermost first: request id, tracing, CORS for the web client,
/// request timeout.
pub fn app_router(state: BillingAppState, server: &ServerConfig) -> Router {
    billing_routes()
        .with_state(state)
        .layer(TimeoutLayer::new(server.request_timeout()))
        .layer(cors_layer(server.client_base()))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// CORS restricted to the web client's origin.
fn cors_layer(client_origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::HeaderName::from_static(SIGNATURE_HEADER),
        ]);

    match HeaderValue::from_str(client_origin) {
        Ok(origin) => layer.allow_origin(origin),
        Err(_) => {
            tracing::warn!(client_origin, "Client URL is not a valid origin; CORS disabled");
            layer
        }
    }
}
