use std::{net::SocketAddr, str::FromStr, sync::Arc};

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::{StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use log::info;
use profile_server_app::Application;
use tower_http::limit::RequestBodyLimitLayer;

use crate::{
    app::{ResponseBody, ServiceError},
    http::rate_limit::RateLimiter,
};

mod profile;
pub mod rate_limit;

const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub app: Arc<Application>,
}

/// Reads an optional numeric setting. A present but malformed value is a startup error.
pub(crate) fn env_or<T: FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .unwrap_or_else(|_| panic!("{} must be a valid number", name)),
        Err(_) => default,
    }
}

pub fn router(
    app: Arc<Application>,
    rate_limiter: Arc<RateLimiter>,
    max_upload_bytes: usize,
) -> Router {
    let limited: Router<AppState> = Router::new()
        .route("/profile/{username}", get(profile::get_profile))
        .route("/profile", patch(profile::upsert_profile))
        .route_layer(middleware::from_fn_with_state(
            rate_limiter,
            rate_limit::enforce,
        ));

    let user: Router<AppState> = Router::new()
        .route("/checkUsername", post(profile::check_username))
        .merge(limited);

    Router::new()
        .route("/", get(server_status))
        .nest("/api/v1/user", user)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .layer(middleware::map_response(wrap_length_limit))
        .with_state(AppState { app })
}

pub async fn run(
    app: Arc<Application>,
    shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
) {
    let host = std::env::var("PROFILE_HTTP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = std::env::var("PROFILE_HTTP_PORT")
        .expect("PROFILE_HTTP_PORT must be set")
        .parse::<u16>()
        .expect("PROFILE_HTTP_PORT must be a valid u16");
    let max_upload_bytes = env_or("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES);
    let rate_limiter = Arc::new(RateLimiter::from_env());

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", host, port))
        .await
        .expect("Failed to bind HTTP listener");

    info!("Profile API listening on {}:{}", host, port);
    axum::serve(
        listener,
        router(app, rate_limiter, max_upload_bytes)
            .into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal)
    .await
    .expect("HTTP server failed");

    info!("Profile API shut down gracefully");
}

/// The body limit layer answers 413 with plain text before any handler runs.
async fn wrap_length_limit(response: Response) -> Response {
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .is_some_and(|value| value.as_bytes().starts_with(b"application/json"));
    if response.status() == StatusCode::PAYLOAD_TOO_LARGE && !is_json {
        return ServiceError::PayloadTooLarge("Request body is too large".to_string())
            .into_response();
    }
    response
}

async fn server_status() -> Json<ResponseBody<()>> {
    ResponseBody::message("Server running successfully.")
}
