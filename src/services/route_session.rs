// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Route session: the lifecycle of one tracked route.
//!
//! ```text
//! Idle --start_route--> Open --finish_route--> Closed
//!                         \------abandon-------/
//! ```
//!
//! The start fix is persisted immediately so the route gets its ID.
//! Waypoints are buffered in memory and written once, together with the
//! finish fix. A failed start/finish leaves the session where it was, so
//! the same call can be retried.

use crate::db::MeasurementRepository;
use crate::error::TrackerError;
use crate::models::{Position, Route, RouteId, Waypoint};
use crate::services::position::PositionSource;
use crate::time_utils::{format_utc_rfc3339, Clock};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Timeouts applied to every sensor and repository call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionOptions {
    pub position_timeout: Duration,
    pub repository_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            position_timeout: Duration::from_secs(10),
            repository_timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Open,
    Closed,
}

/// Owns one route from start to finish. Not shareable; callers serialize.
pub struct RouteSession<P, R> {
    positions: P,
    repo: Arc<R>,
    clock: Arc<dyn Clock>,
    options: SessionOptions,
    state: SessionState,
    route: Option<Route>,
}

impl<P, R> RouteSession<P, R>
where
    P: PositionSource,
    R: MeasurementRepository,
{
    pub fn new(positions: P, repo: Arc<R>, clock: Arc<dyn Clock>, options: SessionOptions) -> Self {
        Self {
            positions,
            repo,
            clock,
            options,
            state: SessionState::Idle,
            route: None,
        }
    }

    /// Reopen a persisted route that was never finished.
    pub fn resume(
        positions: P,
        repo: Arc<R>,
        clock: Arc<dyn Clock>,
        options: SessionOptions,
        route: Route,
    ) -> Result<Self, TrackerError> {
        if route.id.is_none() {
            return Err(TrackerError::InvalidDocument(
                "cannot resume a route without an ID".to_string(),
            ));
        }
        if !route.is_open() {
            return Err(TrackerError::AlreadyClosed);
        }

        tracing::info!(
            user_id = %route.user_id,
            route_id = ?route.id,
            waypoints = route.waypoints.len(),
            "Route resumed"
        );

        Ok(Self {
            positions,
            repo,
            clock,
            options,
            state: SessionState::Open,
            route: Some(route),
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The route being tracked (open) or the persisted result (closed).
    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    pub fn route_id(&self) -> Option<&str> {
        self.route.as_ref().and_then(|r| r.id.as_deref())
    }

    /// Capture the start fix, persist the new route and open the session.
    pub async fn start_route(&mut self, user_id: &str) -> Result<RouteId, TrackerError> {
        match self.state {
            SessionState::Idle => {}
            SessionState::Open => return Err(TrackerError::AlreadyOpen),
            SessionState::Closed => return Err(TrackerError::AlreadyClosed),
        }

        let start_point = self.fix().await?;
        let mut route = Route::open(user_id, self.clock.now(), start_point);

        let route_id = self.persist(&route).await?;
        route.id = Some(route_id.clone());

        tracing::info!(
            user_id,
            route_id = %route_id,
            start_time = %format_utc_rfc3339(route.start_time),
            "Route started"
        );

        self.route = Some(route);
        self.state = SessionState::Open;
        Ok(route_id)
    }

    /// Buffer a waypoint captured now. No remote write.
    pub fn record_waypoint(&mut self, position: Position) -> Result<(), TrackerError> {
        let captured_at = self.clock.now();
        self.record_waypoint_at(position, captured_at)
    }

    /// Buffer a waypoint captured at `captured_at`.
    ///
    /// Waypoints stay ordered by capture time even when they arrive out of
    /// order; equal times keep arrival order.
    pub fn record_waypoint_at(
        &mut self,
        position: Position,
        captured_at: DateTime<Utc>,
    ) -> Result<(), TrackerError> {
        let route = self.open_route_mut()?;
        let index = route
            .waypoints
            .partition_point(|w| w.captured_at <= captured_at);
        route.waypoints.insert(
            index,
            Waypoint {
                position,
                captured_at,
            },
        );
        Ok(())
    }

    /// Capture the finish fix and persist finish fields plus all waypoints.
    pub async fn finish_route(&mut self) -> Result<Route, TrackerError> {
        self.open_route_mut()?;

        let finish_point = self.fix().await?;
        let finish_time = self.clock.now();

        let mut closed = self.route.clone().ok_or(TrackerError::NotOpen)?;
        closed.finish_time = Some(finish_time);
        closed.finish_point = Some(finish_point);

        self.persist(&closed).await?;

        tracing::info!(
            user_id = %closed.user_id,
            route_id = ?closed.id,
            finish_time = %format_utc_rfc3339(finish_time),
            waypoints = closed.waypoints.len(),
            "Route finished"
        );

        self.route = Some(closed.clone());
        self.state = SessionState::Closed;
        Ok(closed)
    }

    /// Discard the open route: delete its document and close the session.
    pub async fn abandon(&mut self) -> Result<(), TrackerError> {
        let route = self.open_route_mut()?;
        let user_id = route.user_id.clone();
        let route_id = route.id.clone().ok_or(TrackerError::NotOpen)?;

        let timeout = self.options.repository_timeout;
        with_timeout(timeout, self.repo.delete_route(&user_id, &route_id))
            .await
            .map_err(|_| repository_timeout(timeout))??;

        tracing::info!(user_id = %user_id, route_id = %route_id, "Route abandoned");

        self.route = None;
        self.state = SessionState::Closed;
        Ok(())
    }

    fn open_route_mut(&mut self) -> Result<&mut Route, TrackerError> {
        match self.state {
            SessionState::Idle => Err(TrackerError::NotOpen),
            SessionState::Closed => Err(TrackerError::AlreadyClosed),
            SessionState::Open => self.route.as_mut().ok_or(TrackerError::NotOpen),
        }
    }

    async fn fix(&self) -> Result<Position, TrackerError> {
        let timeout = self.options.position_timeout;
        with_timeout(timeout, self.positions.current_position(timeout))
            .await
            .map_err(|_| {
                TrackerError::PositionUnavailable(format!("no fix within {:?}", timeout))
            })?
    }

    async fn persist(&self, route: &Route) -> Result<RouteId, TrackerError> {
        let timeout = self.options.repository_timeout;
        with_timeout(timeout, self.repo.save_route(route))
            .await
            .map_err(|_| repository_timeout(timeout))?
    }
}

async fn with_timeout<F: Future>(
    timeout: Duration,
    fut: F,
) -> Result<F::Output, tokio::time::error::Elapsed> {
    tokio::time::timeout(timeout, fut).await
}

fn repository_timeout(timeout: Duration) -> TrackerError {
    TrackerError::RepositoryUnavailable(format!("no response within {:?}", timeout))
}
