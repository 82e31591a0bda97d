//! API request handlers

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use registrar_common::RegistrationForm;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::notifier::FlushOutcome;
use crate::AppState;

/// Response for an accepted submission
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub message: String,
    pub serial_number: String,
}

/// Service counters
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub pending_notifications: usize,
    pub total_registrations: usize,
}

/// Result of an on-demand batch flush
#[derive(Debug, Serialize)]
pub struct FlushResponse {
    pub outcome: &'static str,
    pub sent: usize,
}

impl From<FlushOutcome> for FlushResponse {
    fn from(outcome: FlushOutcome) -> Self {
        match outcome {
            FlushOutcome::NothingToSend => FlushResponse {
                outcome: "nothing_to_send",
                sent: 0,
            },
            FlushOutcome::AlreadyRunning => FlushResponse {
                outcome: "already_running",
                sent: 0,
            },
            FlushOutcome::Sent { count } => FlushResponse {
                outcome: "sent",
                sent: count,
            },
        }
    }
}

/// API Error type
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub detail: String,
}

impl ApiError {
    fn internal(message: &str, detail: impl ToString) -> Self {
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.to_string(),
            detail: detail.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "message": self.message,
            "error": self.detail
        });

        (self.status, Json(body)).into_response()
    }
}

/// Health check endpoint
pub async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "registration-service"
    }))
}

/// Send browsers to the application form page
pub async fn root_handler(State(state): State<Arc<AppState>>) -> Redirect {
    Redirect::to(&state.form_page_url)
}

/// Accept one registration
///
/// POST /api/submit-form
pub async fn submit_form_handler(
    State(state): State<Arc<AppState>>,
    Json(form): Json<RegistrationForm>,
) -> Result<Json<SubmitResponse>, ApiError> {
    info!("Received registration");
    debug!("Registration applicant: {:?}", form.name);

    match state.registrar.submit(form).await {
        Ok(receipt) => Ok(Json(SubmitResponse {
            message: "Form submitted successfully".to_string(),
            serial_number: receipt.serial_number.to_string(),
        })),
        Err(e) => {
            error!("Submission failed [{}]: {}", e.category(), e);
            Err(ApiError::internal("Error submitting form", e))
        }
    }
}

/// GET /api/stats
pub async fn stats_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatsResponse>, ApiError> {
    let total_registrations = state
        .store
        .count()
        .await
        .map_err(|e| ApiError::internal("Error reading registrations", e))?;

    Ok(Json(StatsResponse {
        pending_notifications: state.queue.len().await,
        total_registrations,
    }))
}

/// Run a batch flush now
///
/// POST /api/notifications/flush
pub async fn flush_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<FlushResponse>, ApiError> {
    info!("On-demand batch flush requested");

    match state.notifier.flush().await {
        Ok(outcome) => Ok(Json(outcome.into())),
        Err(e) => {
            error!("On-demand flush failed: {}", e);
            Err(ApiError::internal("Error sending notifications", e))
        }
    }
}
