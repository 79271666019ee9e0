// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! BLE beacon ranging and the registry of known beacon locations.

use crate::error::TrackerError;
use crate::models::{BeaconSighting, Position};
use futures_util::stream::BoxStream;
use geojson::GeoJson;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

/// Lazy, unbounded sequence of sightings for one ranging session.
pub type SightingStream = BoxStream<'static, Result<BeaconSighting, TrackerError>>;

/// Asynchronous discovery/ranging of nearby beacons.
pub trait BeaconSource: Send + Sync {
    /// Start ranging a region. The stream ends on `stop_ranging()`; a failed
    /// radio yields one `SensorUnavailable` and ends. Nothing is retried.
    fn start_ranging(&self, region_id: &str) -> SightingStream;

    /// End every open ranging stream. Idempotent.
    fn stop_ranging(&self);
}

const SIGHTING_BUFFER: usize = 256;

#[derive(Debug, Clone)]
struct RegionSighting {
    region_id: String,
    sighting: BeaconSighting,
}

struct FeedInner {
    sightings: broadcast::Sender<RegionSighting>,
    /// Bumped by `stop_ranging`; streams end when it changes.
    stop_generation: watch::Sender<u64>,
    available: AtomicBool,
}

/// Beacon source fed by sightings the device reports.
#[derive(Clone)]
pub struct BeaconFeed {
    inner: Arc<FeedInner>,
}

impl Default for BeaconFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl BeaconFeed {
    pub fn new() -> Self {
        let (sightings, _) = broadcast::channel(SIGHTING_BUFFER);
        let (stop_generation, _) = watch::channel(0);
        Self {
            inner: Arc::new(FeedInner {
                sightings,
                stop_generation,
                available: AtomicBool::new(true),
            }),
        }
    }

    /// Deliver a sighting to every stream ranging `region_id`.
    ///
    /// Returns the number of open streams it was delivered to.
    pub fn report(&self, region_id: &str, sighting: BeaconSighting) -> usize {
        self.inner
            .sightings
            .send(RegionSighting {
                region_id: region_id.to_string(),
                sighting,
            })
            .unwrap_or(0)
    }

    /// Mark the radio as (un)available. Checked when a stream first polls.
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }
}

impl BeaconSource for BeaconFeed {
    fn start_ranging(&self, region_id: &str) -> SightingStream {
        let inner = self.inner.clone();
        let region = region_id.to_string();
        let mut sightings = inner.sightings.subscribe();
        let mut stop = inner.stop_generation.subscribe();

        Box::pin(async_stream::stream! {
            if !inner.available.load(Ordering::SeqCst) {
                yield Err(TrackerError::SensorUnavailable(
                    "bluetooth radio unavailable".to_string(),
                ));
                return;
            }

            tracing::debug!(region = %region, "Beacon ranging started");
            loop {
                let received = tokio::select! {
                    _ = stop.changed() => None,
                    received = sightings.recv() => Some(received),
                };

                match received {
                    None | Some(Err(broadcast::error::RecvError::Closed)) => break,
                    Some(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                        tracing::warn!(region = %region, skipped, "Beacon consumer lagging");
                    }
                    Some(Ok(s)) if s.region_id == region => yield Ok(s.sighting),
                    Some(Ok(_)) => {}
                }
            }
            tracing::debug!(region = %region, "Beacon ranging stopped");
        })
    }

    fn stop_ranging(&self) {
        self.inner.stop_generation.send_modify(|generation| *generation += 1);
    }
}

/// A beacon installed at a known location.
#[derive(Debug, Clone, PartialEq)]
pub struct KnownBeacon {
    pub id: String,
    pub region: Option<String>,
    pub position: Position,
}

/// Known beacon locations, loaded from a GeoJSON FeatureCollection of Points.
#[derive(Debug, Default, Clone)]
pub struct BeaconRegistry {
    beacons: HashMap<String, KnownBeacon>,
}

impl BeaconRegistry {
    /// Load beacons from a GeoJSON file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, BeaconRegistryError> {
        let json_data = fs::read_to_string(path.as_ref())
            .map_err(|e| BeaconRegistryError::IoError(e.to_string()))?;
        Self::load_from_json(&json_data)
    }

    /// Load beacons from a GeoJSON string.
    ///
    /// Features need a string `id` property and Point geometry; others are skipped.
    pub fn load_from_json(json_data: &str) -> Result<Self, BeaconRegistryError> {
        let geojson: GeoJson = json_data
            .parse()
            .map_err(|e: geojson::Error| BeaconRegistryError::ParseError(e.to_string()))?;

        let GeoJson::FeatureCollection(collection) = geojson else {
            return Err(BeaconRegistryError::NotAFeatureCollection);
        };

        let mut beacons = HashMap::new();
        for feature in collection.features {
            let Some(id) = feature
                .property("id")
                .and_then(|v| v.as_str())
                .map(str::to_string)
            else {
                continue;
            };
            let region = feature
                .property("region")
                .and_then(|v| v.as_str())
                .map(str::to_string);

            let Some(geojson::Value::Point(coords)) = feature.geometry.map(|g| g.value) else {
                tracing::warn!(beacon_id = %id, "Skipping beacon without Point geometry");
                continue;
            };
            if coords.len() < 2 {
                continue;
            }

            let position = Position::new(coords[1], coords[0]);
            beacons.insert(
                id.clone(),
                KnownBeacon {
                    id,
                    region,
                    position,
                },
            );
        }

        tracing::info!(count = beacons.len(), "Loaded beacon registry");
        Ok(Self { beacons })
    }

    pub fn len(&self) -> usize {
        self.beacons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beacons.is_empty()
    }

    pub fn get(&self, beacon_id: &str) -> Option<&KnownBeacon> {
        self.beacons.get(beacon_id)
    }

    /// Position for a sighting of a known beacon no farther than `max_distance` meters.
    pub fn locate(&self, sighting: &BeaconSighting, max_distance: f64) -> Option<Position> {
        let beacon = self.beacons.get(&sighting.beacon_id)?;
        (sighting.estimated_distance <= max_distance).then_some(beacon.position)
    }
}

/// Errors from beacon registry loading.
#[derive(Debug, thiserror::Error)]
pub enum BeaconRegistryError {
    #[error("Failed to read file: {0}")]
    IoError(String),

    #[error("Failed to parse GeoJSON: {0}")]
    ParseError(String),

    #[error("Expected a GeoJSON FeatureCollection")]
    NotAFeatureCollection,
}
