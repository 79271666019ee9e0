// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod beacon;
pub mod heatmap;
pub mod measurement;
pub mod position;
pub mod route;
pub mod user;

pub use beacon::BeaconSighting;
pub use heatmap::WeightedPoint;
pub use measurement::{GridInfo, Measurement, MeasurementDocument, PollutionMap, Station};
pub use position::{Position, Waypoint};
pub use route::{Route, RouteId};
pub use user::{Device, DeviceDocument, FavoriteDestination, UserProfile};
