// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP route handlers.

pub mod api;
pub mod auth;
pub mod stream;

use crate::middleware::auth::require_auth;
use crate::AppState;
use axum::http::{header, Method, Uri};
use axum::{middleware, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct HealthResponse {
    pub status: String,
    pub build_id: String,
}

/// Health check response
async fn health_check() -> Json<HealthResponse> {
    let build_id = option_env!("BUILD_ID").unwrap_or("unknown").to_string();
    Json(HealthResponse {
        status: "ok".to_string(),
        build_id,
    })
}

/// The configured frontend, or a plain-http dev server on this machine.
fn is_allowed_origin(origin: &str, frontend_url: &str) -> bool {
    if origin == frontend_url {
        return true;
    }

    let Ok(uri) = origin.parse::<Uri>() else {
        return false;
    };
    uri.scheme_str() == Some("http")
        && matches!(uri.host(), Some("localhost" | "127.0.0.1"))
        && uri.path_and_query().is_none_or(|p| p.as_str() == "/")
}

/// Build the complete router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    // CORS layer - allow requests from frontend URL and local dev servers
    let frontend_url = state.config.frontend_url.clone();
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::AllowOrigin::predicate(
            move |origin: &axum::http::HeaderValue, _request_parts: &axum::http::request::Parts| {
                origin
                    .to_str()
                    .is_ok_and(|origin| is_allowed_origin(origin, &frontend_url))
            },
        ))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .merge(auth::routes());

    // Protected routes (auth required)
    let protected_routes = api::routes()
        .merge(stream::routes())
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(middleware::from_fn(
            crate::middleware::security::add_security_headers,
        ))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRONTEND: &str = "https://chat.example.com";

    #[test]
    fn frontend_and_local_dev_origins_allowed() {
        assert!(is_allowed_origin(FRONTEND, FRONTEND));
        assert!(is_allowed_origin("http://localhost:5173", FRONTEND));
        assert!(is_allowed_origin("http://localhost", FRONTEND));
        assert!(is_allowed_origin("http://127.0.0.1:8080", FRONTEND));
    }

    #[test]
    fn lookalike_origins_rejected() {
        assert!(!is_allowed_origin("http://localhost.attacker.example", FRONTEND));
        assert!(!is_allowed_origin("http://localhost:5173.attacker.example", FRONTEND));
        assert!(!is_allowed_origin("http://127.0.0.1.nip.io", FRONTEND));
        assert!(!is_allowed_origin("https://chat.example.com.evil.net", FRONTEND));
        assert!(!is_allowed_origin("https://localhost:5173", FRONTEND));
        assert!(!is_allowed_origin("null", FRONTEND));
    }
}
