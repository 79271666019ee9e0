// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-user route sessions and sensor feeds for the HTTP layer.
//!
//! Each user has one position feed, one beacon feed and at most one live
//! route session. Calls into a session are serialized by its mutex.

use crate::db::MeasurementRepository;
use crate::error::TrackerError;
use crate::models::{BeaconSighting, Position, Route};
use crate::services::beacon::{BeaconFeed, BeaconRegistry, BeaconSource};
use crate::services::position::PositionFeed;
use crate::services::route_session::{RouteSession, SessionOptions, SessionState};
use crate::time_utils::Clock;
use dashmap::DashMap;
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

type SharedSession<R> = Arc<Mutex<RouteSession<PositionFeed, R>>>;

/// Beacon-to-waypoint settings.
#[derive(Debug, Clone)]
pub struct BeaconTracking {
    pub registry: Arc<BeaconRegistry>,
    pub region: String,
    pub max_distance_m: f64,
}

/// Registry of per-user sessions and feeds.
pub struct SessionManager<R> {
    repo: Arc<R>,
    clock: Arc<dyn Clock>,
    options: SessionOptions,
    max_fix_age: Duration,
    beacon_tracking: Option<BeaconTracking>,
    positions: DashMap<String, PositionFeed>,
    beacons: DashMap<String, BeaconFeed>,
    sessions: DashMap<String, SharedSession<R>>,
}

impl<R: MeasurementRepository> SessionManager<R> {
    pub fn new(
        repo: Arc<R>,
        clock: Arc<dyn Clock>,
        options: SessionOptions,
        max_fix_age: Duration,
    ) -> Self {
        Self {
            repo,
            clock,
            options,
            max_fix_age,
            beacon_tracking: None,
            positions: DashMap::new(),
            beacons: DashMap::new(),
            sessions: DashMap::new(),
        }
    }

    /// Turn beacon sightings into waypoints while a route is open.
    pub fn with_beacon_tracking(mut self, tracking: BeaconTracking) -> Self {
        if tracking.registry.is_empty() {
            tracing::warn!("Beacon registry is empty; beacon tracking disabled");
        } else {
            self.beacon_tracking = Some(tracking);
        }
        self
    }

    pub fn position_feed(&self, user_id: &str) -> PositionFeed {
        self.positions
            .entry(user_id.to_string())
            .or_insert_with(|| PositionFeed::new(self.max_fix_age))
            .clone()
    }

    pub fn beacon_feed(&self, user_id: &str) -> BeaconFeed {
        self.beacons
            .entry(user_id.to_string())
            .or_default()
            .clone()
    }

    pub fn report_position(&self, user_id: &str, position: Position) {
        self.position_feed(user_id).report(position);
    }

    /// Returns the number of ranging streams the sighting reached.
    pub fn report_beacon(&self, user_id: &str, region_id: &str, sighting: BeaconSighting) -> usize {
        self.beacon_feed(user_id).report(region_id, sighting)
    }

    /// The user's live session, replacing a closed one with a fresh instance.
    async fn session_for_start(&self, user_id: &str) -> SharedSession<R> {
        loop {
            let existing = self
                .sessions
                .entry(user_id.to_string())
                .or_insert_with(|| self.fresh_session(user_id))
                .value()
                .clone();

            if existing.lock().await.state() != SessionState::Closed {
                return existing;
            }

            // Swap only if nobody replaced the closed session while we waited.
            let mut entry = self.sessions.entry(user_id.to_string()).or_insert_with(|| existing.clone());
            if Arc::ptr_eq(entry.value(), &existing) {
                let fresh = self.fresh_session(user_id);
                *entry.value_mut() = fresh.clone();
                return fresh;
            }
        }
    }

    fn fresh_session(&self, user_id: &str) -> SharedSession<R> {
        Arc::new(Mutex::new(RouteSession::new(
            self.position_feed(user_id),
            self.repo.clone(),
            self.clock.clone(),
            self.options,
        )))
    }

    fn current(&self, user_id: &str) -> Result<SharedSession<R>, TrackerError> {
        self.sessions
            .get(user_id)
            .map(|s| s.value().clone())
            .ok_or(TrackerError::NotOpen)
    }

    pub async fn start_route(&self, user_id: &str) -> Result<Route, TrackerError> {
        let session = self.session_for_start(user_id).await;
        let route = {
            let mut guard = session.lock().await;
            guard.start_route(user_id).await?;
            guard.route().cloned().ok_or(TrackerError::NotOpen)?
        };
        self.spawn_beacon_tracking(user_id, session);
        Ok(route)
    }

    /// Returns the number of buffered waypoints.
    pub async fn record_waypoint(&self, user_id: &str, position: Position) -> Result<usize, TrackerError> {
        let session = self.current(user_id)?;
        let mut guard = session.lock().await;
        guard.record_waypoint(position)?;
        Ok(guard.route().map_or(0, |r| r.waypoints.len()))
    }

    pub async fn finish_route(&self, user_id: &str) -> Result<Route, TrackerError> {
        let session = self.current(user_id)?;
        let route = session.lock().await.finish_route().await?;
        self.beacon_feed(user_id).stop_ranging();
        Ok(route)
    }

    pub async fn abandon_route(&self, user_id: &str) -> Result<(), TrackerError> {
        let session = self.current(user_id)?;
        session.lock().await.abandon().await?;
        self.beacon_feed(user_id).stop_ranging();
        Ok(())
    }

    /// Reopen a persisted, unfinished route as the user's live session.
    pub async fn resume_route(&self, user_id: &str, route_id: &str) -> Result<Route, TrackerError> {
        if let Ok(session) = self.current(user_id) {
            if session.lock().await.state() == SessionState::Open {
                return Err(TrackerError::AlreadyOpen);
            }
        }

        let route = tokio::time::timeout(
            self.options.repository_timeout,
            self.repo.get_route(user_id, route_id),
        )
        .await
        .map_err(|_| TrackerError::RepositoryUnavailable("get_route timed out".to_string()))??
        .ok_or_else(|| TrackerError::NotFound(format!("route {}", route_id)))?;

        let resumed = RouteSession::resume(
            self.position_feed(user_id),
            self.repo.clone(),
            self.clock.clone(),
            self.options,
            route.clone(),
        )?;
        let session = Arc::new(Mutex::new(resumed));
        self.sessions.insert(user_id.to_string(), session.clone());
        self.spawn_beacon_tracking(user_id, session);
        Ok(route)
    }

    /// Route of the user's live session (open, or closed by the last finish).
    pub async fn current_route(&self, user_id: &str) -> Option<(SessionState, Option<Route>)> {
        let session = self.current(user_id).ok()?;
        let guard = session.lock().await;
        Some((guard.state(), guard.route().cloned()))
    }

    fn spawn_beacon_tracking(&self, user_id: &str, session: SharedSession<R>) {
        let Some(tracking) = self.beacon_tracking.clone() else {
            return;
        };

        let mut sightings = self.beacon_feed(user_id).start_ranging(&tracking.region);
        let user_id = user_id.to_string();

        tokio::spawn(async move {
            while let Some(item) = sightings.next().await {
                let sighting = match item {
                    Ok(sighting) => sighting,
                    Err(e) => {
                        tracing::warn!(user_id = %user_id, error = %e, "Beacon ranging failed");
                        break;
                    }
                };

                let Some(position) = tracking.registry.locate(&sighting, tracking.max_distance_m)
                else {
                    continue;
                };

                let recorded = session
                    .lock()
                    .await
                    .record_waypoint_at(position, sighting.observed_at);
                match recorded {
                    Ok(()) => {}
                    Err(e) if e.is_state_violation() => {
                        tracing::debug!(user_id = %user_id, error = %e, "Route no longer open; stop ranging");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(user_id = %user_id, error = %e, "Failed to record beacon waypoint");
                    }
                }
            }
        });
    }
}
