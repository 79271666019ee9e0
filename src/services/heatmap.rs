// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Heat-map projection of measurements for the map overlay.

use crate::db::MeasurementRepository;
use crate::error::TrackerError;
use crate::models::{GridInfo, Measurement, PollutionMap, WeightedPoint};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject};

/// Turns measurements into weighted points, one per measurement, in input order.
///
/// The default weight is 1.0 for every point: no clustering or
/// interpolation. With a pollutant selected, the weight is that reading
/// (0.0 when a measurement lacks it).
#[derive(Debug, Clone, Default)]
pub struct HeatmapProjector {
    pollutant: Option<String>,
}

impl HeatmapProjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Weight each point by one pollutant reading.
    pub fn for_pollutant(pollutant: impl Into<String>) -> Self {
        Self {
            pollutant: Some(pollutant.into()),
        }
    }

    pub fn project(&self, measurements: &[Measurement]) -> Vec<WeightedPoint> {
        measurements
            .iter()
            .map(|m| WeightedPoint {
                latitude: m.latitude,
                longitude: m.longitude,
                weight: self.weight(m),
            })
            .collect()
    }

    fn weight(&self, measurement: &Measurement) -> f64 {
        match &self.pollutant {
            None => 1.0,
            Some(name) => measurement.readings.get(name).copied().unwrap_or(0.0),
        }
    }

    /// Fetch the measurement collection and project it.
    pub async fn project_latest<R: MeasurementRepository>(
        &self,
        repo: &R,
        limit: Option<u32>,
    ) -> Result<Vec<WeightedPoint>, TrackerError> {
        let measurements = repo.fetch_measurements(limit).await?;
        let points = self.project(&measurements);
        tracing::debug!(
            points = points.len(),
            pollutant = ?self.pollutant,
            "Projected heat map"
        );
        Ok(points)
    }
}

/// One point per grid cell centre, weighted by that cell's value.
///
/// Values are row-major. Cells without a value, and values without a
/// cell, are left out.
pub fn project_grid(grid: &GridInfo, map: &PollutionMap) -> Vec<WeightedPoint> {
    if grid.rows == 0 || grid.columns == 0 {
        return Vec::new();
    }
    if map.values.len() != grid.cell_count() {
        tracing::warn!(
            cells = grid.cell_count(),
            values = map.values.len(),
            "Pollution map does not match grid size"
        );
    }

    map.values
        .iter()
        .take(grid.cell_count())
        .enumerate()
        .map(|(i, &value)| {
            let row = (i / grid.columns as usize) as u32;
            let column = (i % grid.columns as usize) as u32;
            let center = grid.cell_center(row, column);
            WeightedPoint {
                latitude: center.latitude,
                longitude: center.longitude,
                weight: value,
            }
        })
        .collect()
}

/// GeoJSON FeatureCollection of Points with a `weight` property.
pub fn to_geojson(points: &[WeightedPoint]) -> FeatureCollection {
    let features = points
        .iter()
        .map(|p| {
            let mut properties = JsonObject::new();
            properties.insert("weight".to_string(), serde_json::json!(p.weight));
            Feature {
                bbox: None,
                geometry: Some(Geometry::new(geojson::Value::Point(vec![
                    p.longitude,
                    p.latitude,
                ]))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}
