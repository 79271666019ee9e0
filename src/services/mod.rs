// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - tracking core and sensor sources.

pub mod beacon;
pub mod heatmap;
pub mod position;
pub mod route_session;
pub mod sessions;

pub use beacon::{BeaconFeed, BeaconRegistry, BeaconRegistryError, BeaconSource, SightingStream};
pub use heatmap::{project_grid, to_geojson, HeatmapProjector};
pub use position::{PositionFeed, PositionSource, ScriptedPositionSource};
pub use route_session::{RouteSession, SessionOptions, SessionState};
pub use sessions::{BeaconTracking, SessionManager};
