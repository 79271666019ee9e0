// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Repository seam between the tracking core and the remote document store.

use crate::error::TrackerError;
use crate::models::{
    Device, FavoriteDestination, GridInfo, Measurement, PollutionMap, Route, RouteId, Station,
    UserProfile,
};
use std::future::Future;

/// Remote fetch/store of measurement, route and user records.
///
/// Every write either acknowledges (with the assigned ID where there is
/// one) or fails; nothing is dropped silently. Implementations never retry.
pub trait MeasurementRepository: Send + Sync + 'static {
    // ─── Measurements ────────────────────────────────────────────

    /// Measurements of one station, newest first, at most `limit`.
    ///
    /// An unknown or empty station yields an empty list.
    fn fetch_station_measurements(
        &self,
        station_id: &str,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<Measurement>, TrackerError>> + Send;

    /// Newest measurement of one station.
    fn fetch_latest_measurement(
        &self,
        station_id: &str,
    ) -> impl Future<Output = Result<Option<Measurement>, TrackerError>> + Send {
        async move {
            Ok(self
                .fetch_station_measurements(station_id, 1)
                .await?
                .into_iter()
                .next())
        }
    }

    /// The top-level measurement collection, newest first.
    fn fetch_measurements(
        &self,
        limit: Option<u32>,
    ) -> impl Future<Output = Result<Vec<Measurement>, TrackerError>> + Send;

    fn get_station(
        &self,
        station_id: &str,
    ) -> impl Future<Output = Result<Option<Station>, TrackerError>> + Send;

    /// Most recent pollution grid values.
    fn fetch_latest_map(
        &self,
    ) -> impl Future<Output = Result<Option<PollutionMap>, TrackerError>> + Send;

    fn get_grid_info(
        &self,
        grid_id: &str,
    ) -> impl Future<Output = Result<Option<GridInfo>, TrackerError>> + Send;

    // ─── Routes ──────────────────────────────────────────────────

    /// Persist a route under `users/{route.user_id}/routes`.
    ///
    /// Without an ID a new document is created and its ID returned. With
    /// an ID, only [`Route::merge_fields`] are written to the existing
    /// document; a missing document is `NotFound`.
    fn save_route(
        &self,
        route: &Route,
    ) -> impl Future<Output = Result<RouteId, TrackerError>> + Send;

    fn get_route(
        &self,
        user_id: &str,
        route_id: &str,
    ) -> impl Future<Output = Result<Option<Route>, TrackerError>> + Send;

    /// Routes without finish fields.
    fn list_open_routes(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Vec<Route>, TrackerError>> + Send;

    fn delete_route(
        &self,
        user_id: &str,
        route_id: &str,
    ) -> impl Future<Output = Result<(), TrackerError>> + Send;

    // ─── Devices ─────────────────────────────────────────────────

    fn list_devices(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Vec<Device>, TrackerError>> + Send;

    /// Create or replace a device, keyed by `device.id`.
    fn save_device(
        &self,
        user_id: &str,
        device: &Device,
    ) -> impl Future<Output = Result<(), TrackerError>> + Send;

    fn delete_device(
        &self,
        user_id: &str,
        device_id: &str,
    ) -> impl Future<Output = Result<(), TrackerError>> + Send;

    // ─── Favorites & Profile ─────────────────────────────────────

    /// Store a new favorite destination and return its ID.
    fn save_favorite_destination(
        &self,
        user_id: &str,
        favorite: &FavoriteDestination,
    ) -> impl Future<Output = Result<String, TrackerError>> + Send;

    fn list_favorite_destinations(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Vec<FavoriteDestination>, TrackerError>> + Send;

    fn get_user_profile(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Option<UserProfile>, TrackerError>> + Send;

    /// Merge the profile fields into `users/{userId}`.
    fn save_user_profile(
        &self,
        user_id: &str,
        profile: &UserProfile,
    ) -> impl Future<Output = Result<(), TrackerError>> + Send;
}
