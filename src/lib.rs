// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! airtrack: route tracking and pollution measurement sync
//!
//! This crate provides the backend for the mobile app: route sessions fed
//! by device GPS/BLE reports, persisted to Firestore, and heat-map
//! projections of station measurements.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::{FirestoreDb, MeasurementRepository};
use services::{BeaconTracking, SessionManager};
use std::sync::Arc;
use time_utils::Clock;

/// Shared application state.
pub struct AppState<R = FirestoreDb> {
    pub config: Config,
    pub repo: Arc<R>,
    pub sessions: SessionManager<R>,
}

impl<R: MeasurementRepository> AppState<R> {
    /// Build state with a session manager using `config`'s timeouts.
    pub fn new(config: Config, repo: Arc<R>, clock: Arc<dyn Clock>) -> Self {
        let sessions = SessionManager::new(
            repo.clone(),
            clock,
            config.session_options(),
            config.max_fix_age,
        );
        Self {
            config,
            repo,
            sessions,
        }
    }

    pub fn with_beacon_tracking(mut self, tracking: BeaconTracking) -> Self {
        self.sessions = self.sessions.with_beacon_tracking(tracking);
        self
    }
}
