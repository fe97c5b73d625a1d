//! Atelier API - JSON service for a multi-seller marketplace.
//!
//! Artists and stores apply to sell, list products, and get paid through an
//! internal wallet ledger; buyers check out carts spanning several sellers.
//!
//! # Architecture
//!
//! - [`db`] - Repositories over `PostgreSQL` (sqlx)
//! - [`services`] - Transactional business operations
//! - [`routes`] - Axum handlers, authenticated by bearer token
//! - [`middleware`] - Request IDs and auth extractors
//!
//! The binary in `main.rs` adds Sentry and serves [`app`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::{Router, middleware::from_fn};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use state::AppState;

/// Build the application router with tracing and request IDs.
pub fn app(state: AppState) -> Router {
    routes::routes()
        .layer(from_fn(middleware::request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        user_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}
