// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Route record: one tracked trip from start fix to finish fix.

use crate::models::{Position, Waypoint};
use chrono::{DateTime, Utc};
use geo::{Distance, Haversine};
use serde::{Deserialize, Serialize};

/// Identifier assigned by the repository on first persist.
pub type RouteId = String;

/// Route document stored at `users/{userId}/routes/{routeId}`.
///
/// An open route has neither `finish_time` nor `finish_point`; a closed
/// route has both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    /// Document ID (not written as a field)
    #[serde(
        default,
        alias = "_firestore_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<RouteId>,
    pub user_id: String,
    pub start_time: DateTime<Utc>,
    pub start_point: Position,
    #[serde(default)]
    pub finish_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finish_point: Option<Position>,
    /// Ordered by capture time
    #[serde(default)]
    pub waypoints: Vec<Waypoint>,
}

impl Route {
    /// Create an open route that has not been persisted yet.
    pub fn open(user_id: impl Into<String>, start_time: DateTime<Utc>, start_point: Position) -> Self {
        Self {
            id: None,
            user_id: user_id.into(),
            start_time,
            start_point,
            finish_time: None,
            finish_point: None,
            waypoints: Vec::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.finish_time.is_none() && self.finish_point.is_none()
    }

    pub fn is_closed(&self) -> bool {
        self.finish_time.is_some() && self.finish_point.is_some()
    }

    /// Document fields this route owns, for merge writes.
    ///
    /// Finish fields are only listed once set, so persisting an open route
    /// never touches them.
    pub fn merge_fields(&self) -> Vec<&'static str> {
        let mut fields = vec!["userId", "startTime", "startPoint", "waypoints"];
        if self.finish_time.is_some() {
            fields.push("finishTime");
        }
        if self.finish_point.is_some() {
            fields.push("finishPoint");
        }
        fields
    }

    /// Start point, waypoints, then finish point (if closed).
    pub fn path(&self) -> Vec<Position> {
        std::iter::once(self.start_point)
            .chain(self.waypoints.iter().map(|w| w.position))
            .chain(self.finish_point)
            .collect()
    }

    /// Great-circle length of the path in meters.
    pub fn length_meters(&self) -> f64 {
        self.path()
            .windows(2)
            .map(|pair| {
                Haversine.distance(geo::Point::from(pair[0]), geo::Point::from(pair[1]))
            })
            .sum()
    }

    /// Path as a Google encoded polyline (precision 5).
    pub fn encoded_polyline(&self) -> Result<String, String> {
        let coords = self.path().into_iter().map(geo::Coord::from);
        polyline::encode_coordinates(coords, 5).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_open_route_state() {
        let route = Route::open("u1", t(0), Position::new(40.0, -0.1));
        assert!(route.is_open());
        assert!(!route.is_closed());
        assert_eq!(
            route.merge_fields(),
            vec!["userId", "startTime", "startPoint", "waypoints"]
        );
    }

    #[test]
    fn test_closed_route_merge_fields() {
        let mut route = Route::open("u1", t(0), Position::new(40.0, -0.1));
        route.finish_time = Some(t(60));
        route.finish_point = Some(Position::new(40.03, -0.13));
        assert!(route.is_closed());
        assert!(route.merge_fields().contains(&"finishTime"));
        assert!(route.merge_fields().contains(&"finishPoint"));
    }

    #[test]
    fn test_serialized_field_names() {
        let route = Route::open("u1", t(0), Position::new(40.0, -0.1));
        let json = serde_json::to_value(&route).unwrap();
        assert!(json.get("id").is_none());
        assert_eq!(json["userId"], "u1");
        assert_eq!(json["startPoint"]["latitude"], 40.0);
        assert!(json.get("startTime").is_some());
    }

    #[test]
    fn test_length_and_polyline() {
        let mut route = Route::open("u1", t(0), Position::new(38.5, -120.2));
        route.waypoints.push(Waypoint {
            position: Position::new(40.7, -120.95),
            captured_at: t(10),
        });
        route.finish_time = Some(t(20));
        route.finish_point = Some(Position::new(43.252, -126.453));

        // Reference polyline from the encoding algorithm description
        assert_eq!(route.encoded_polyline().unwrap(), "_p~iF~ps|U_ulLnnqC_mqNvxq`@");

        let length_km = route.length_meters() / 1000.0;
        assert!(length_km > 700.0 && length_km < 850.0, "got {}", length_km);
    }

    #[test]
    fn test_single_point_length_is_zero() {
        let route = Route::open("u1", t(0), Position::new(40.0, -0.1));
        assert_eq!(route.length_meters(), 0.0);
    }
}
