// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for user records, stations and heat maps.

use crate::config::Config;
use crate::db::MeasurementRepository;
use crate::error::{AppError, Result, TrackerError};
use crate::middleware::auth::AuthUser;
use crate::models::{Device, FavoriteDestination, Measurement, Station, UserProfile};
use crate::services::{project_grid, to_geojson, HeatmapProjector};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get},
    Extension, Json, Router,
};
use geojson::FeatureCollection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

const DEFAULT_MEASUREMENT_LIMIT: u32 = 20;
const MAX_MEASUREMENT_LIMIT: u32 = 500;
const DEFAULT_STATION_ALIAS: &str = "default";

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes<R: MeasurementRepository>() -> Router<Arc<AppState<R>>> {
    Router::new()
        .route("/api/me", get(get_me::<R>).put(put_me::<R>))
        .route("/api/devices", get(list_devices::<R>).post(link_device::<R>))
        .route("/api/devices/{device_id}", delete(unlink_device::<R>))
        .route(
            "/api/favorites",
            get(list_favorites::<R>).post(add_favorite::<R>),
        )
        .route("/api/stations/{station_id}", get(get_station::<R>))
        .route(
            "/api/stations/{station_id}/measurements",
            get(station_measurements::<R>),
        )
        .route(
            "/api/stations/{station_id}/latest",
            get(latest_measurement::<R>),
        )
        .route("/api/heatmap", get(get_heatmap::<R>))
        .route("/api/heatmap/grid/{grid_id}", get(get_grid_heatmap::<R>))
}

// ─── User Profile ────────────────────────────────────────────

/// Current user response.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub user_id: String,
    /// None until the user saves a profile
    pub profile: Option<UserProfile>,
}

async fn get_me<R: MeasurementRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<MeResponse>> {
    let profile = state.repo.get_user_profile(&user.user_id).await?;
    Ok(Json(MeResponse {
        user_id: user.user_id,
        profile,
    }))
}

async fn put_me<R: MeasurementRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(user): Extension<AuthUser>,
    Json(profile): Json<UserProfile>,
) -> Result<Json<MeResponse>> {
    profile.validate()?;
    state.repo.save_user_profile(&user.user_id, &profile).await?;
    tracing::info!(user_id = %user.user_id, "Profile updated");

    Ok(Json(MeResponse {
        user_id: user.user_id,
        profile: Some(profile),
    }))
}

// ─── Devices ─────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct LinkDeviceRequest {
    #[validate(length(min = 1, max = 128))]
    pub id: String,
    #[validate(length(min = 1, max = 64))]
    pub alias: String,
}

async fn list_devices<R: MeasurementRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Device>>> {
    Ok(Json(state.repo.list_devices(&user.user_id).await?))
}

async fn link_device<R: MeasurementRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<LinkDeviceRequest>,
) -> Result<(StatusCode, Json<Device>)> {
    request.validate()?;

    let device = Device {
        id: request.id,
        alias: request.alias,
        linked_at: chrono::Utc::now(),
    };
    state.repo.save_device(&user.user_id, &device).await?;
    tracing::info!(user_id = %user.user_id, device_id = %device.id, "Device linked");

    Ok((StatusCode::CREATED, Json(device)))
}

async fn unlink_device<R: MeasurementRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(user): Extension<AuthUser>,
    Path(device_id): Path<String>,
) -> Result<StatusCode> {
    state.repo.delete_device(&user.user_id, &device_id).await?;
    tracing::info!(user_id = %user.user_id, device_id = %device_id, "Device unlinked");
    Ok(StatusCode::NO_CONTENT)
}

// ─── Favorites ───────────────────────────────────────────────

async fn list_favorites<R: MeasurementRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<FavoriteDestination>>> {
    Ok(Json(
        state.repo.list_favorite_destinations(&user.user_id).await?,
    ))
}

async fn add_favorite<R: MeasurementRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(user): Extension<AuthUser>,
    Json(mut favorite): Json<FavoriteDestination>,
) -> Result<(StatusCode, Json<FavoriteDestination>)> {
    favorite.validate()?;
    favorite.id = None;

    let id = state
        .repo
        .save_favorite_destination(&user.user_id, &favorite)
        .await?;
    favorite.id = Some(id);

    Ok((StatusCode::CREATED, Json(favorite)))
}

// ─── Stations ────────────────────────────────────────────────

#[derive(Deserialize)]
struct MeasurementsQuery {
    limit: Option<u32>,
}

/// Clamp a requested page size to 1..=MAX_MEASUREMENT_LIMIT.
fn clamp_limit(limit: Option<u32>) -> u32 {
    limit
        .unwrap_or(DEFAULT_MEASUREMENT_LIMIT)
        .clamp(1, MAX_MEASUREMENT_LIMIT)
}

/// `default` in a station path stands for the configured station.
fn resolve_station<'a>(config: &'a Config, station_id: &'a str) -> &'a str {
    if station_id == DEFAULT_STATION_ALIAS {
        &config.default_station_id
    } else {
        station_id
    }
}

async fn get_station<R: MeasurementRepository>(
    State(state): State<Arc<AppState<R>>>,
    Path(station_id): Path<String>,
) -> Result<Json<Station>> {
    let station_id = resolve_station(&state.config, &station_id);
    let station = state
        .repo
        .get_station(station_id)
        .await?
        .ok_or_else(|| TrackerError::NotFound(format!("station {}", station_id)))?;
    Ok(Json(station))
}

async fn station_measurements<R: MeasurementRepository>(
    State(state): State<Arc<AppState<R>>>,
    Path(station_id): Path<String>,
    Query(query): Query<MeasurementsQuery>,
) -> Result<Json<Vec<Measurement>>> {
    let station_id = resolve_station(&state.config, &station_id);
    let limit = clamp_limit(query.limit);
    let measurements = state
        .repo
        .fetch_station_measurements(station_id, limit)
        .await?;

    tracing::debug!(
        station_id = %station_id,
        limit,
        count = measurements.len(),
        "Fetched station measurements"
    );
    Ok(Json(measurements))
}

async fn latest_measurement<R: MeasurementRepository>(
    State(state): State<Arc<AppState<R>>>,
    Path(station_id): Path<String>,
) -> Result<Json<Measurement>> {
    let station_id = resolve_station(&state.config, &station_id);
    let measurement = state
        .repo
        .fetch_latest_measurement(station_id)
        .await?
        .ok_or_else(|| {
            TrackerError::NotFound(format!("no measurements for station {}", station_id))
        })?;
    Ok(Json(measurement))
}

// ─── Heat Map ────────────────────────────────────────────────

#[derive(Deserialize)]
struct HeatmapQuery {
    /// Weight points by this reading instead of 1.0
    pollutant: Option<String>,
    limit: Option<u32>,
}

async fn get_heatmap<R: MeasurementRepository>(
    State(state): State<Arc<AppState<R>>>,
    Query(query): Query<HeatmapQuery>,
) -> Result<Json<FeatureCollection>> {
    let projector = match query.pollutant {
        Some(p) if p.trim().is_empty() => {
            return Err(AppError::BadRequest("pollutant must not be empty".to_string()))
        }
        Some(p) => HeatmapProjector::for_pollutant(p),
        None => HeatmapProjector::new(),
    };

    let limit = query.limit.map(|l| l.clamp(1, MAX_MEASUREMENT_LIMIT));
    let points = projector.project_latest(state.repo.as_ref(), limit).await?;
    Ok(Json(to_geojson(&points)))
}

async fn get_grid_heatmap<R: MeasurementRepository>(
    State(state): State<Arc<AppState<R>>>,
    Path(grid_id): Path<String>,
) -> Result<Json<FeatureCollection>> {
    let grid = state
        .repo
        .get_grid_info(&grid_id)
        .await?
        .ok_or_else(|| TrackerError::NotFound(format!("grid {}", grid_id)))?;
    let map = state
        .repo
        .fetch_latest_map()
        .await?
        .ok_or_else(|| TrackerError::NotFound("pollution map".to_string()))?;

    let points = project_grid(&grid, &map);
    tracing::debug!(grid_id = %grid_id, points = points.len(), "Projected grid heat map");
    Ok(Json(to_geojson(&points)))
}
