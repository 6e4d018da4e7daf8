use std::any::Any;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{HeaderValue, StatusCode},
    middleware::from_fn_with_state,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, patch, post},
    Router,
};
use serde_json::json;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any as AnyOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::SecurityConfig;
use crate::error::ApiError;
use crate::handlers::{protected, public};
use crate::middleware::jwt_auth_middleware;
use crate::state::AppState;


/// Full HTTP surface: public routes, the JWT-protected API and global layers.
pub fn router(state: AppState) -> Router {
    let body_limit = state.config.api.max_request_size_bytes;
    let request_logging = state.config.api.enable_request_logging;
    let cors = cors_layer(&state.config.security);

    let protected = Router::new()
        .merge(auth_routes())
        .merge(user_routes())
        .merge(progress_routes())
        .merge(payment_routes())
        .merge(comment_routes())
        .merge(file_routes())
        .route_layer(from_fn_with_state(state.clone(), jwt_auth_middleware));

    let mut app = Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(auth_public_routes())
        // Protected API
        .merge(protected)
        .fallback(not_found)
        .with_state(state)
        // Global middleware
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CatchPanicLayer::custom(panic_response));

    if request_logging {
        app = app.layer(TraceLayer::new_for_http());
    }
    if let Some(cors) = cors {
        app = app.layer(cors);
    }
    app
}

fn auth_public_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/login", post(public::auth::login))
        .route("/api/auth/register", post(public::auth::register))
}

fn auth_routes() -> Router<AppState> {
    Router::new().route("/api/auth/me", get(protected::auth::me))
}

fn user_routes() -> Router<AppState> {
    use protected::users;

    Router::new()
        .route("/api/users", get(users::list).post(users::create))
        .route("/api/users/:id", patch(users::update).delete(users::delete))
}

fn progress_routes() -> Router<AppState> {
    use protected::progress;

    Router::new()
        .route("/api/progress", get(progress::list).post(progress::create))
        .route("/api/progress/pdf-range", get(progress::pdf_range))
        .route("/api/progress/:id", patch(progress::update))
        .route("/api/progress/:id/approve", patch(progress::approve))
        .route("/api/progress/:id/comments", post(progress::comment))
}

fn payment_routes() -> Router<AppState> {
    use protected::payments;

    Router::new()
        .route("/api/payments", get(payments::list).post(payments::create))
        .route("/api/payments/approved", get(payments::approved))
        .route("/api/payments/pdf-range", get(payments::pdf_range))
        .route(
            "/api/payments/by-payment-id/:payment_id/approve",
            patch(payments::approve),
        )
        .route("/api/payments/:id", delete(payments::delete))
        .route("/api/payments/:id/comments", post(payments::comment))
}

fn comment_routes() -> Router<AppState> {
    use protected::comments;

    Router::new().route("/api/comments", get(comments::list).post(comments::create))
}

fn file_routes() -> Router<AppState> {
    use protected::files;

    Router::new()
        .route("/api/files", get(files::list))
        .route("/api/files/upload", post(files::upload))
        .route(
            "/api/files/drive/:drive_id",
            get(files::download).delete(files::delete),
        )
}

fn cors_layer(security: &SecurityConfig) -> Option<CorsLayer> {
    if !security.enable_cors {
        return None;
    }
    let layer = CorsLayer::new().allow_methods(AnyOrigin).allow_headers(AnyOrigin);

    if security.cors_origins.is_empty() || security.cors_origins.iter().any(|o| o == "*") {
        return Some(layer.allow_origin(AnyOrigin));
    }
    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {}", origin);
                None
            }
        })
        .collect();
    Some(layer.allow_origin(origins))
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!("Handler panicked: {}", detail);
    ApiError::internal_server_error("Internal server error").into_response()
}

async fn not_found() -> ApiError {
    ApiError::not_found("Route not found")
}

async fn root() -> Json<serde_json::Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "Iruvade Project Management API",
            "version": version,
            "endpoints": {
                "auth": "/api/auth/login, /api/auth/register (public), /api/auth/me",
                "users": "/api/users[/:id] (admin)",
                "progress": "/api/progress[/:id[/approve|/comments]], /api/progress/pdf-range",
                "payments": "/api/payments[/:id[/comments]], /api/payments/by-payment-id/:paymentID/approve, /api/payments/approved, /api/payments/pdf-range",
                "comments": "/api/comments",
                "files": "/api/files, /api/files/upload, /api/files/drive/:driveId",
            }
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.store.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": { "status": "ok", "timestamp": now, "database": "ok" }
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "error": true,
                    "message": "Database unavailable",
                    "code": "SERVICE_UNAVAILABLE"
                })),
            )
        }
    }
}
