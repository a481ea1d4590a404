//! PDF signing API server
//!
//! Provides REST endpoints for:
//! - PDF upload and metadata
//! - Field signing with an audit trail
//! - Signature photo cleanup (matting)

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod state;
pub mod store;

pub use config::Config;
pub use state::AppState;

/// Build the router with all routes and middleware
pub fn app(state: Arc<AppState>) -> Router {
    // CORS configuration for web clients
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let uploads = ServeDir::new(&state.config.upload_root);
    let uploads_path = state.config.public_upload_prefix.clone();
    let body_limit = DefaultBodyLimit::max(state.config.max_body_bytes);

    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // Documents
        .route("/api/pdf/upload", post(handlers::upload_pdf))
        .route("/api/pdf/sign", post(handlers::sign_pdf))
        .route("/api/pdf/:id", get(handlers::get_pdf))
        .route("/api/pdf/:id/audit", get(handlers::list_audits))
        // Signature cleanup
        .route("/api/signature/matte", post(handlers::matte_signature))
        // Stored files
        .nest_service(&uploads_path, uploads)
        // Add middleware
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
