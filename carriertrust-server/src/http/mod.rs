//! JSON-over-HTTP surface.

mod admin;
mod public;

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::{middleware, routing::get, Json, Router};
use serde_json::json;

use crate::error::AppError;
use crate::session::resolve_session;
use crate::AppState;

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "service": "carriertrust",
        "version": crate::get_version(),
    }))
}

async fn help_handler() -> Json<serde_json::Value> {
    Json(json!({
        "service": "carriertrust",
        "version": crate::get_version(),
        "description": "Directory and moderated reviews of logistics companies",
        "endpoints": [
            {"path": "/health", "method": "GET", "authentication": "None"},
            {"path": "/help", "method": "GET", "authentication": "None"},
            {"path": "/api/vat/:vat/country", "method": "GET", "authentication": "None",
             "description": "Country for a VAT prefix"},
            {"path": "/api/companies/search?q=", "method": "GET", "authentication": "None",
             "description": "Exact VAT match, then first company whose name contains q"},
            {"path": "/api/companies/:id", "method": "GET", "authentication": "None",
             "description": "Company with published reviews and rating summary"},
            {"path": "/api/reviews", "method": "POST", "authentication": "Bearer token",
             "description": "Submit a review for moderation"},
            {"path": "/admin/api/reviews?status=&q=", "method": "GET", "authentication": "Bearer token (admin)",
             "description": "200 newest reviews by status (pending, published, all)"},
            {"path": "/admin/api/reviews/:id/approve", "method": "POST", "authentication": "Bearer token (admin)"},
            {"path": "/admin/api/reviews/:id", "method": "PATCH", "authentication": "Bearer token (admin)",
             "description": "Overwrite issue, rating and body"},
            {"path": "/admin/api/reviews/:id", "method": "DELETE", "authentication": "Bearer token (admin)"}
        ],
        "configuration": {
            "required_env_vars": [
                "AUTH_URL and BACKEND_API_KEY, or STATIC_TOKENS"
            ],
            "optional_env_vars": [
                "PORT (default: 3000)",
                "STATE_DIR (default: current directory)",
                "FUNCTIONS_URL and FUNCTIONS_KEY (default: log notifications only)",
                "ADMIN_USER_IDS (comma-separated)"
            ]
        }
    }))
}

/// Build the application router. The session middleware runs on every API
/// route.
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .merge(public::routes())
        .merge(admin::routes())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            resolve_session,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/help", get(help_handler))
        .merge(api)
        .with_state(state)
}
