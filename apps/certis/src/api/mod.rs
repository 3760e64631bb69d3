//! # Certis HTTP API
//!
//! REST surface over the [`Portal`].
//!
//! ## Endpoints
//!
//! - `GET /health`, `GET /status`
//! - `GET|POST /programs`, `GET|PATCH|DELETE /programs/{id}` (`?include=batches,modules`)
//! - `GET|POST /programs/{id}/modules`, `PATCH|DELETE /modules/{id}`
//! - `GET /programs/{id}/batches`, `GET|POST /batches` (`?program=&active=`),
//!   `GET|PATCH|DELETE /batches/{id}`
//! - `GET|POST /registrations`, `GET|DELETE /registrations/{id}`
//! - `POST /registrations/{id}/decision`, `POST /registrations/{id}/cancel`
//! - `GET|POST /registrations/{id}/assessment`
//! - `GET /capacity/{kind}/{id}`, `POST /capacity/{kind}/{id}/reconcile`,
//!   `POST /capacity/reconcile`
//!
//! ## Security Configuration (Environment Variables)
//!
//! - `CERTIS_CORS_ORIGINS`: comma-separated origins, or `*` (default: localhost only)
//! - `CERTIS_RATE_LIMIT`: requests per second (default: 100, 0 to disable)
//! - `CERTIS_API_KEY`: if set, requires Bearer token authentication

mod auth;
mod extract;
mod handlers;
mod middleware;
mod types;

pub use auth::{API_KEY_ENV, get_api_key_from_env};
pub use extract::{ApiJson, ApiPath, ApiQuery};
pub use middleware::{RATE_LIMIT_ENV, create_rate_limiter, get_rate_limit_from_env};
pub use types::{
    ApiError, ApiFailure, ApiResponse, AssessmentJson, ComponentJson, DecisionRequest,
    EvaluateRequest, HealthResponse, ModuleRequest, RegistrationDetailJson, RegistrationJson,
    ScoreEntry, ScoresInput, StatusCounts, StatusResponse, SubmitRequest, TargetJson, status_for,
};

use crate::AppError;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, patch, post},
};
use certis_core::Portal;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub const CORS_ORIGINS_ENV: &str = "CERTIS_CORS_ORIGINS";

const BODY_LIMIT_BYTES: usize = 1024 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state. The portal is internally synchronized by redb.
#[derive(Clone)]
pub struct AppState {
    pub portal: Arc<Portal>,
}

impl AppState {
    #[must_use]
    pub fn new(portal: Portal) -> Self {
        Self {
            portal: Arc::new(portal),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

const CORS_METHODS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PATCH,
    Method::DELETE,
    Method::OPTIONS,
];

/// Build the CORS layer from `CERTIS_CORS_ORIGINS`.
///
/// - `*`: any origin
/// - unset or no valid entry: localhost only
/// - otherwise: the listed origins
fn build_cors_layer() -> CorsLayer {
    match std::env::var(CORS_ORIGINS_ENV).ok().as_deref() {
        Some("*") => {
            tracing::warn!("CORS: allowing ALL origins ({}=*)", CORS_ORIGINS_ENV);
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed: Vec<HeaderValue> = origins
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .filter_map(|s| match s.parse::<HeaderValue>() {
                    Ok(hv) => Some(hv),
                    Err(e) => {
                        tracing::warn!("CORS: invalid origin '{}': {}", s, e);
                        None
                    }
                })
                .collect();

            if allowed.is_empty() {
                tracing::warn!("CORS: no valid origins in {}, using localhost", CORS_ORIGINS_ENV);
                build_localhost_cors()
            } else {
                tracing::info!("CORS: {} allowed origin(s)", allowed.len());
                restricted_cors(allowed)
            }
        }
        None => build_localhost_cors(),
    }
}

fn restricted_cors(origins: Vec<HeaderValue>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(CORS_METHODS)
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

fn build_localhost_cors() -> CorsLayer {
    let origins = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|o| o.parse::<HeaderValue>().ok())
    .collect();
    restricted_cors(origins)
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

fn routes() -> Router<AppState> {
    use handlers::*;

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/programs", get(list_programs).post(create_program))
        .route(
            "/programs/{id}",
            get(get_program).patch(update_program).delete(delete_program),
        )
        .route(
            "/programs/{id}/modules",
            get(list_modules).post(create_module),
        )
        .route("/programs/{id}/batches", get(list_batches))
        .route("/modules/{id}", patch(update_module).delete(delete_module))
        .route("/batches", get(find_batches).post(create_batch))
        .route(
            "/batches/{id}",
            get(get_batch).patch(update_batch).delete(delete_batch),
        )
        .route(
            "/registrations",
            get(list_registrations).post(submit_registration),
        )
        .route(
            "/registrations/{id}",
            get(get_registration).delete(delete_registration),
        )
        .route("/registrations/{id}/decision", post(decide_registration))
        .route("/registrations/{id}/cancel", post(cancel_registration))
        .route(
            "/registrations/{id}/assessment",
            get(get_assessment).post(evaluate_registration),
        )
        .route("/capacity/reconcile", post(reconcile_all))
        .route("/capacity/{kind}/{id}", get(get_capacity))
        .route("/capacity/{kind}/{id}/reconcile", post(reconcile_capacity))
}

/// Create the router with all endpoints and middleware.
///
/// Middleware stack (outer to inner): tracing, CORS, body limit,
/// rate limiting (if enabled), authentication (if configured).
pub fn create_router(state: AppState) -> Router {
    let mut router = routes();

    if get_api_key_from_env().is_some() {
        tracing::info!("API key authentication enabled");
        router = router.layer(axum_middleware::from_fn(auth::api_key_auth_middleware));
    } else {
        tracing::warn!(
            "API key authentication DISABLED; set {} to require a Bearer key",
            API_KEY_ENV
        );
    }

    let rate_limit = get_rate_limit_from_env();
    if rate_limit > 0 {
        tracing::info!("Rate limiting enabled: {} requests/second", rate_limit);
        router = router.layer(axum_middleware::from_fn_with_state(
            create_rate_limiter(rate_limit),
            middleware::rate_limit_middleware,
        ));
    } else {
        tracing::info!("Rate limiting disabled");
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors_layer())
                .layer(axum::extract::DefaultBodyLimit::max(BODY_LIMIT_BYTES)),
        )
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Serve until Ctrl-C.
pub async fn run_server(addr: &str, portal: Portal) -> Result<(), AppError> {
    let router = create_router(AppState::new(portal));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::Io(format!("bind {} failed: {}", addr, e)))?;

    tracing::info!("Certis HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::Io(format!("server error: {}", e)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("cannot listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
