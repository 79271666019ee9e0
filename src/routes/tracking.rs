// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sensor reports and route lifecycle endpoints.
//!
//! The device pushes GPS fixes and beacon sightings; route start/finish
//! then read from those feeds through the caller's session.

use crate::db::MeasurementRepository;
use crate::error::{Result, TrackerError};
use crate::middleware::auth::AuthUser;
use crate::models::{BeaconSighting, Position, Route};
use crate::services::SessionState;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

pub fn routes<R: MeasurementRepository>() -> Router<Arc<AppState<R>>> {
    Router::new()
        .route("/api/position", post(report_position::<R>))
        .route("/api/beacons", post(report_beacon::<R>))
        .route("/api/routes/start", post(start_route::<R>))
        .route("/api/routes/waypoints", post(record_waypoint::<R>))
        .route("/api/routes/finish", post(finish_route::<R>))
        .route("/api/routes/abandon", post(abandon_route::<R>))
        .route("/api/routes/current", get(current_route::<R>))
        .route("/api/routes/{route_id}", get(get_route::<R>))
        .route("/api/routes/{route_id}/resume", post(resume_route::<R>))
}

// ─── Sensor Reports ──────────────────────────────────────────

async fn report_position<R: MeasurementRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(user): Extension<AuthUser>,
    Json(position): Json<Position>,
) -> Result<StatusCode> {
    position.validate()?;
    state.sessions.report_position(&user.user_id, position);
    Ok(StatusCode::ACCEPTED)
}

#[derive(Debug, Deserialize, Validate)]
pub struct BeaconReport {
    #[validate(length(min = 1, max = 64))]
    pub region: String,
    #[validate(nested)]
    pub sighting: BeaconSighting,
}

#[derive(Serialize)]
pub struct BeaconReportResponse {
    /// Number of open ranging streams that received the sighting
    pub delivered: usize,
}

async fn report_beacon<R: MeasurementRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(user): Extension<AuthUser>,
    Json(report): Json<BeaconReport>,
) -> Result<(StatusCode, Json<BeaconReportResponse>)> {
    report.validate()?;
    let delivered = state
        .sessions
        .report_beacon(&user.user_id, &report.region, report.sighting);
    Ok((StatusCode::ACCEPTED, Json(BeaconReportResponse { delivered })))
}

// ─── Route Lifecycle ─────────────────────────────────────────

/// Route plus derived drawing data.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSummary {
    pub route: Route,
    pub length_meters: f64,
    /// Encoded polyline (precision 5) of start, waypoints and finish
    pub polyline: Option<String>,
}

impl From<Route> for RouteSummary {
    fn from(route: Route) -> Self {
        let polyline = match route.encoded_polyline() {
            Ok(encoded) => Some(encoded),
            Err(e) => {
                tracing::warn!(route_id = ?route.id, error = %e, "Failed to encode route polyline");
                None
            }
        };
        Self {
            length_meters: route.length_meters(),
            polyline,
            route,
        }
    }
}

async fn start_route<R: MeasurementRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(user): Extension<AuthUser>,
) -> Result<(StatusCode, Json<Route>)> {
    let route = state.sessions.start_route(&user.user_id).await?;
    Ok((StatusCode::CREATED, Json(route)))
}

#[derive(Serialize)]
pub struct WaypointResponse {
    /// Waypoints buffered so far
    pub waypoints: usize,
}

async fn record_waypoint<R: MeasurementRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(user): Extension<AuthUser>,
    Json(position): Json<Position>,
) -> Result<Json<WaypointResponse>> {
    position.validate()?;
    let waypoints = state
        .sessions
        .record_waypoint(&user.user_id, position)
        .await?;
    Ok(Json(WaypointResponse { waypoints }))
}

async fn finish_route<R: MeasurementRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<RouteSummary>> {
    let route = state.sessions.finish_route(&user.user_id).await?;
    Ok(Json(route.into()))
}

async fn abandon_route<R: MeasurementRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(user): Extension<AuthUser>,
) -> Result<StatusCode> {
    state.sessions.abandon_route(&user.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn resume_route<R: MeasurementRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(user): Extension<AuthUser>,
    Path(route_id): Path<String>,
) -> Result<Json<Route>> {
    let route = state
        .sessions
        .resume_route(&user.user_id, &route_id)
        .await?;
    Ok(Json(route))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentRouteResponse {
    pub state: &'static str,
    pub route: Option<Route>,
}

fn state_name(state: SessionState) -> &'static str {
    match state {
        SessionState::Idle => "idle",
        SessionState::Open => "open",
        SessionState::Closed => "closed",
    }
}

async fn current_route<R: MeasurementRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(user): Extension<AuthUser>,
) -> Json<CurrentRouteResponse> {
    let (session_state, route) = state
        .sessions
        .current_route(&user.user_id)
        .await
        .unwrap_or((SessionState::Idle, None));

    Json(CurrentRouteResponse {
        state: state_name(session_state),
        route,
    })
}

async fn get_route<R: MeasurementRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(user): Extension<AuthUser>,
    Path(route_id): Path<String>,
) -> Result<Json<RouteSummary>> {
    let route = state
        .repo
        .get_route(&user.user_id, &route_id)
        .await?
        .ok_or_else(|| TrackerError::NotFound(format!("route {}", route_id)))?;
    Ok(Json(route.into()))
}
