// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Pollution measurements, stations and the pre-computed pollution grid.
//!
//! Documents written by the measurement pipeline are loosely shaped, so
//! each record has a `*Document` twin with every field optional. The
//! repository deserializes into the twin and converts with `TryFrom`,
//! which is where missing fields are rejected.

use crate::error::TrackerError;
use crate::models::Position;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name of the timestamp field measurements are ordered by.
pub const MEASUREMENT_TIME_FIELD: &str = "date";

/// A validated measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    pub station_id: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(rename = "date")]
    pub timestamp: DateTime<Utc>,
    /// Pollutant name (e.g. "NO2") to concentration
    #[serde(default)]
    pub readings: BTreeMap<String, f64>,
}

impl Measurement {
    pub fn position(&self) -> Position {
        Position::new(self.latitude, self.longitude)
    }
}

/// Raw measurement document as stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementDocument {
    #[serde(
        default,
        alias = "_firestore_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(default)]
    pub station_id: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default, rename = "date")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub readings: Option<BTreeMap<String, f64>>,
}

impl From<&Measurement> for MeasurementDocument {
    fn from(m: &Measurement) -> Self {
        Self {
            id: None,
            station_id: Some(m.station_id.clone()),
            latitude: Some(m.latitude),
            longitude: Some(m.longitude),
            timestamp: Some(m.timestamp),
            readings: Some(m.readings.clone()),
        }
    }
}

impl TryFrom<MeasurementDocument> for Measurement {
    type Error = TrackerError;

    fn try_from(doc: MeasurementDocument) -> Result<Self, Self::Error> {
        let label = doc.id.as_deref().unwrap_or("<unknown>").to_string();
        let missing =
            |field: &str| TrackerError::InvalidDocument(format!("measurement {label}: missing {field}"));

        Ok(Measurement {
            station_id: doc.station_id.ok_or_else(|| missing("stationId"))?,
            latitude: doc.latitude.ok_or_else(|| missing("latitude"))?,
            longitude: doc.longitude.ok_or_else(|| missing("longitude"))?,
            timestamp: doc.timestamp.ok_or_else(|| missing("date"))?,
            readings: doc.readings.unwrap_or_default(),
        })
    }
}

/// Fixed measurement station, stored at `stations/{stationId}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub code: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Station {
    pub fn position(&self) -> Position {
        Position::new(self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StationDocument {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default, alias = "direccion")]
    pub address: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

impl StationDocument {
    /// Validate, falling back to the document ID for a missing code.
    pub fn into_station(self, station_id: &str) -> Result<Station, TrackerError> {
        let missing = |field: &str| {
            TrackerError::InvalidDocument(format!("station {station_id}: missing {field}"))
        };
        Ok(Station {
            code: self.code.unwrap_or_else(|| station_id.to_string()),
            address: self.address.unwrap_or_default(),
            latitude: self.latitude.ok_or_else(|| missing("latitude"))?,
            longitude: self.longitude.ok_or_else(|| missing("longitude"))?,
        })
    }
}

/// Pollution values over a grid, one per cell in row-major order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollutionMap {
    pub date: DateTime<Utc>,
    #[serde(alias = "arrayValores")]
    pub values: Vec<f64>,
}

/// Grid layout the pollution maps are computed over.
///
/// `point_a` and `point_b` are opposite corners; row 0 is at `point_a`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridInfo {
    pub city: String,
    #[serde(rename = "PointA")]
    pub point_a: Position,
    #[serde(rename = "PointB")]
    pub point_b: Position,
    pub rows: u32,
    pub columns: u32,
    pub date: DateTime<Utc>,
}

impl GridInfo {
    pub fn cell_count(&self) -> usize {
        self.rows as usize * self.columns as usize
    }

    /// Centre of cell (row, column).
    pub fn cell_center(&self, row: u32, column: u32) -> Position {
        let lat_step = (self.point_b.latitude - self.point_a.latitude) / f64::from(self.rows);
        let lng_step = (self.point_b.longitude - self.point_a.longitude) / f64::from(self.columns);
        Position::new(
            self.point_a.latitude + (f64::from(row) + 0.5) * lat_step,
            self.point_a.longitude + (f64::from(column) + 0.5) * lng_step,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_missing_coordinates_rejected() {
        let doc = MeasurementDocument {
            id: Some("m1".to_string()),
            station_id: Some("46131002".to_string()),
            latitude: None,
            longitude: Some(-0.18),
            timestamp: Some(Utc::now()),
            readings: None,
        };
        let err = Measurement::try_from(doc).unwrap_err();
        assert!(matches!(err, TrackerError::InvalidDocument(ref msg) if msg.contains("latitude")));
    }

    #[test]
    fn test_document_without_readings_is_valid() {
        let doc = MeasurementDocument {
            id: None,
            station_id: Some("46131002".to_string()),
            latitude: Some(38.97),
            longitude: Some(-0.18),
            timestamp: Some(Utc::now()),
            readings: None,
        };
        let m = Measurement::try_from(doc).unwrap();
        assert!(m.readings.is_empty());
    }

    #[test]
    fn test_pollution_map_accepts_legacy_field() {
        let json = r#"{"date":"2019-12-09T10:00:00Z","arrayValores":[1.0,2.5]}"#;
        let map: PollutionMap = serde_json::from_str(json).unwrap();
        assert_eq!(map.values, vec![1.0, 2.5]);
    }

    #[test]
    fn test_grid_cell_center() {
        let grid = GridInfo {
            city: "Gandia".to_string(),
            point_a: Position::new(39.0, -0.2),
            point_b: Position::new(38.9, -0.1),
            rows: 2,
            columns: 4,
            date: Utc::now(),
        };
        assert_eq!(grid.cell_count(), 8);
        let c = grid.cell_center(0, 0);
        assert!((c.latitude - 38.975).abs() < 1e-9);
        assert!((c.longitude - (-0.1875)).abs() < 1e-9);
    }

    #[test]
    fn test_station_code_falls_back_to_id() {
        let doc = StationDocument {
            code: None,
            address: Some("Gandia".to_string()),
            latitude: Some(38.97),
            longitude: Some(-0.18),
        };
        assert_eq!(doc.into_station("46131002").unwrap().code, "46131002");
    }
}
