// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use airtrack::error::{AppError, TrackerError};
use axum::http::StatusCode;
use axum::response::IntoResponse;

async fn status_and_body(err: AppError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), 1024)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_tracker_errors_map_to_status() {
    let cases = [
        (TrackerError::NotFound("route r9".into()), StatusCode::NOT_FOUND),
        (TrackerError::AlreadyOpen, StatusCode::CONFLICT),
        (TrackerError::AlreadyClosed, StatusCode::CONFLICT),
        (TrackerError::NotOpen, StatusCode::CONFLICT),
        (
            TrackerError::PositionUnavailable("gps off".into()),
            StatusCode::SERVICE_UNAVAILABLE,
        ),
        (
            TrackerError::SensorUnavailable("bt off".into()),
            StatusCode::SERVICE_UNAVAILABLE,
        ),
        (
            TrackerError::RepositoryUnavailable("deadline".into()),
            StatusCode::BAD_GATEWAY,
        ),
        (
            TrackerError::InvalidDocument("missing date".into()),
            StatusCode::INTERNAL_SERVER_ERROR,
        ),
    ];

    for (err, expected) in cases {
        let (status, _) = status_and_body(err.clone().into()).await;
        assert_eq!(status, expected, "{:?}", err);
    }
}

#[tokio::test]
async fn test_backend_details_are_not_leaked() {
    let (_, body) = status_and_body(
        TrackerError::RepositoryUnavailable("grpc: projects/secret".into()).into(),
    )
    .await;
    assert_eq!(body["error"], "repository_unavailable");
    assert!(body.get("details").is_none());

    let (_, body) = status_and_body(TrackerError::AlreadyClosed.into()).await;
    assert_eq!(body["error"], "already_closed");
}

#[test]
fn test_state_violations() {
    assert!(TrackerError::AlreadyOpen.is_state_violation());
    assert!(TrackerError::AlreadyClosed.is_state_violation());
    assert!(TrackerError::NotOpen.is_state_violation());
    assert!(!TrackerError::NotFound("x".into()).is_state_violation());
    assert!(!TrackerError::PositionUnavailable("x".into()).is_state_violation());
}
