pub mod handlers;
pub mod middleware;
pub mod plain;
pub mod state;

use axum::{
    Router,
    http::StatusCode,
    middleware as axum_middleware,
    routing::{get, post},
};
use state::AppState;
use std::sync::Arc;
use tower_http::{
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

pub fn create_router(state: Arc<AppState>) -> Router {
    let config = &state.config;

    // Probes and scraping stay out of the request metrics
    let infra_router = Router::new()
        .route("/healthz", get(handlers::healthz_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(state.clone());

    // Instrumented before nesting so the mount path is visible as base URL
    let api_router = Router::new()
        .route("/users", post(handlers::create_user_handler))
        .route("/users/{id}", get(handlers::get_user_handler))
        .route("/fail", get(handlers::fail_handler))
        .with_state(state.clone())
        .layer(axum_middleware::from_fn_with_state(
            state.interceptor.clone(),
            middleware::track_metrics,
        ));

    Router::new()
        .merge(infra_router)
        .nest("/api", api_router)
        .layer(RequestBodyLimitLayer::new(config.http.body_limit_bytes))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout(),
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}
