// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Error types: tracking-core failures and their HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Failures of the tracking core (sources, repository, route sessions).
///
/// None of these are retried inside the crate.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrackerError {
    #[error("Position unavailable: {0}")]
    PositionUnavailable(String),

    #[error("Beacon sensor unavailable: {0}")]
    SensorUnavailable(String),

    #[error("Repository unavailable: {0}")]
    RepositoryUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Route already open")]
    AlreadyOpen,

    #[error("Route already closed")]
    AlreadyClosed,

    #[error("No open route")]
    NotOpen,
}

impl TrackerError {
    /// True for state-machine violations (caller bugs, never transient).
    pub fn is_state_violation(&self) -> bool {
        matches!(
            self,
            TrackerError::AlreadyOpen | TrackerError::AlreadyClosed | TrackerError::NotOpen
        )
    }
}

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::BadRequest(errors.to_string())
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::Tracker(err) => match err {
                TrackerError::NotFound(msg) => {
                    (StatusCode::NOT_FOUND, "not_found", Some(msg.clone()))
                }
                TrackerError::AlreadyOpen => (StatusCode::CONFLICT, "already_open", None),
                TrackerError::AlreadyClosed => (StatusCode::CONFLICT, "already_closed", None),
                TrackerError::NotOpen => (StatusCode::CONFLICT, "not_open", None),
                TrackerError::PositionUnavailable(msg) => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "position_unavailable",
                    Some(msg.clone()),
                ),
                TrackerError::SensorUnavailable(msg) => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "sensor_unavailable",
                    Some(msg.clone()),
                ),
                TrackerError::RepositoryUnavailable(msg) => {
                    tracing::error!(error = %msg, "Repository error");
                    (StatusCode::BAD_GATEWAY, "repository_unavailable", None)
                }
                TrackerError::InvalidDocument(msg) => {
                    tracing::error!(error = %msg, "Invalid stored document");
                    (StatusCode::INTERNAL_SERVER_ERROR, "invalid_document", None)
                }
            },
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
