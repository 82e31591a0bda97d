//! Registration Service
//!
//! Accepts training-institute registrations over HTTP, issues each one a
//! serial number, renders its certificate and application form, promotes
//! both to public storage, persists the record and emails the student.
//! Completed submissions are batched and reported to faculty on a schedule
//! with a spreadsheet of every registration.
//!
//! ## Endpoints
//!
//! - `POST /api/submit-form` - Submit a registration
//! - `GET /api/stats` - Pending queue length and stored registration count
//! - `POST /api/notifications/flush` - Send the faculty batch email now
//! - `GET /` - Redirect to the application form page
//! - `GET /health` - Health check
//! - `GET /files/*` - Locally stored documents, when uploads stay on disk

pub mod config;
pub mod error;
pub mod export;
pub mod handlers;
pub mod mailer;
pub mod notifier;
pub mod queue;
pub mod registrar;
pub mod scheduler;
pub mod serial;
pub mod store;
pub mod uploader;

use axum::{
    routing::{get, post},
    Router,
};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::notifier::Notifier;
use crate::queue::PendingQueue;
use crate::registrar::Registrar;
use crate::store::RegistrationStore;

/// Application state shared across handlers
pub struct AppState {
    pub registrar: Registrar,
    pub notifier: Arc<Notifier>,
    pub queue: Arc<PendingQueue>,
    pub store: Arc<dyn RegistrationStore>,

    /// Where `GET /` redirects to
    pub form_page_url: String,

    /// Directory served under `/files`, set when uploads are stored locally
    pub files_dir: Option<PathBuf>,
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let files_dir = state.files_dir.clone();
    let state = Arc::new(state);

    let mut router = Router::new()
        .route("/", get(handlers::root_handler))
        .route("/health", get(handlers::health_handler))
        .route("/api/submit-form", post(handlers::submit_form_handler))
        .route("/api/stats", get(handlers::stats_handler))
        .route(
            "/api/notifications/flush",
            post(handlers::flush_handler),
        );

    if let Some(dir) = files_dir {
        router = router.nest_service("/files", ServeDir::new(dir));
    }

    router
        // The form page is served from another origin
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
