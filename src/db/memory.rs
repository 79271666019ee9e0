// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory document store with the same paths and merge semantics as Firestore.
//!
//! Documents are kept as JSON objects keyed by their full path
//! (`users/u1/routes/r1`), so reads go through the same deserialization
//! and validation as documents fetched from Firestore. Route IDs are
//! assigned sequentially: `r1`, `r2`, ...

use crate::db::repository::MeasurementRepository;
use crate::db::{collections, paths, skip_malformed, validate_measurements};
use crate::error::TrackerError;
use crate::models::measurement::StationDocument;
use crate::models::{
    Device, DeviceDocument, FavoriteDestination, GridInfo, Measurement, MeasurementDocument, PollutionMap, Route,
    RouteId, Station, UserProfile,
};
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// DashMap-backed repository for tests and offline runs.
#[derive(Default)]
pub struct InMemoryRepository {
    docs: DashMap<String, Value>,
    next_route_id: AtomicU64,
    next_doc_id: AtomicU64,
    writes: AtomicUsize,
    unavailable: AtomicBool,
    latency: Mutex<Option<Duration>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `RepositoryUnavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Delay every call by `latency` (uses tokio time, so it can be paused).
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock().unwrap_or_else(|e| e.into_inner()) = latency;
    }

    /// Number of successful document writes (inserts, updates, deletes).
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Raw document at `path`, if any.
    pub fn document(&self, path: &str) -> Option<Value> {
        self.docs.get(path).map(|d| d.value().clone())
    }

    /// Store a raw document, bypassing validation (for seeding).
    pub fn insert_document(&self, path: impl Into<String>, doc: Value) {
        self.docs.insert(path.into(), doc);
    }

    /// Seed a measurement under `stations/{stationId}/measures`.
    pub fn seed_station_measurement(&self, measurement: &Measurement) {
        let id = self.next_doc_id();
        let doc = to_object(&MeasurementDocument::from(measurement)).unwrap_or_default();
        self.insert_document(
            format!("{}/{}", paths::station_measures(&measurement.station_id), id),
            Value::Object(doc),
        );
    }

    /// Seed a measurement in the top-level `measures` collection.
    pub fn seed_measurement(&self, measurement: &Measurement) {
        let id = self.next_doc_id();
        let doc = to_object(&MeasurementDocument::from(measurement)).unwrap_or_default();
        self.insert_document(
            format!("{}/{}", collections::MEASURES, id),
            Value::Object(doc),
        );
    }

    fn next_doc_id(&self) -> String {
        format!("d{}", self.next_doc_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn enter(&self) -> Result<(), TrackerError> {
        let latency = *self.latency.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(TrackerError::RepositoryUnavailable(
                "in-memory repository marked unavailable".to_string(),
            ));
        }
        Ok(())
    }

    fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, TrackerError> {
        self.docs
            .get(path)
            .map(|doc| decode(path, doc.value().clone()))
            .transpose()
    }

    /// Direct children of a collection as (document ID, value) pairs, sorted
    /// by ID. Documents that do not decode are skipped.
    fn list<T: DeserializeOwned>(&self, collection: &str) -> Vec<(String, T)> {
        let prefix = format!("{}/", collection);
        let mut raw: Vec<(String, Value)> = self
            .docs
            .iter()
            .filter_map(|entry| {
                let id = entry.key().strip_prefix(&prefix)?;
                (!id.contains('/')).then(|| (id.to_string(), entry.value().clone()))
            })
            .collect();
        raw.sort_by(|a, b| a.0.cmp(&b.0));

        let decoded = raw.into_iter().map(|(id, doc)| {
            let path = format!("{}{}", prefix, id);
            let value = decode(&path, doc).map(|value| (id.clone(), value));
            (id, value)
        });
        skip_malformed(collection, decoded)
    }

    fn put<T: Serialize>(&self, path: String, value: &T) -> Result<(), TrackerError> {
        let doc = to_object(value)?;
        self.docs.insert(path, Value::Object(doc));
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Write only `fields` of `value` into the existing document at `path`.
    fn merge<T: Serialize>(
        &self,
        path: &str,
        value: &T,
        fields: &[&str],
        create: bool,
    ) -> Result<(), TrackerError> {
        let update = to_object(value)?;
        let mut entry = match self.docs.get_mut(path) {
            Some(entry) => entry,
            None if create => {
                self.docs.insert(path.to_string(), Value::Object(Map::new()));
                self.docs
                    .get_mut(path)
                    .ok_or_else(|| TrackerError::NotFound(path.to_string()))?
            }
            None => return Err(TrackerError::NotFound(path.to_string())),
        };
        let Value::Object(existing) = entry.value_mut() else {
            return Err(TrackerError::InvalidDocument(format!(
                "{}: not an object",
                path
            )));
        };
        for field in fields {
            match update.get(*field) {
                Some(v) => existing.insert(field.to_string(), v.clone()),
                None => existing.remove(*field),
            };
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn remove(&self, path: &str) -> Result<(), TrackerError> {
        self.docs
            .remove(path)
            .ok_or_else(|| TrackerError::NotFound(path.to_string()))?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn measurements_in(
        &self,
        collection: &str,
        station_id: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Vec<Measurement>, TrackerError> {
        let docs = self
            .list::<MeasurementDocument>(collection)
            .into_iter()
            .map(|(id, mut doc)| {
                doc.id = Some(id);
                doc
            })
            .collect();
        let mut measurements = validate_measurements(docs, station_id);
        measurements.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        if let Some(limit) = limit {
            measurements.truncate(limit as usize);
        }
        Ok(measurements)
    }
}

fn to_object<T: Serialize>(value: &T) -> Result<Map<String, Value>, TrackerError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(TrackerError::InvalidDocument(
            "document must serialize to an object".to_string(),
        )),
        Err(e) => Err(TrackerError::InvalidDocument(e.to_string())),
    }
}

fn decode<T: DeserializeOwned>(path: &str, doc: Value) -> Result<T, TrackerError> {
    serde_json::from_value(doc).map_err(|e| TrackerError::InvalidDocument(format!("{}: {}", path, e)))
}

impl MeasurementRepository for InMemoryRepository {
    async fn fetch_station_measurements(
        &self,
        station_id: &str,
        limit: u32,
    ) -> Result<Vec<Measurement>, TrackerError> {
        self.enter().await?;
        self.measurements_in(&paths::station_measures(station_id), Some(station_id), Some(limit))
    }

    async fn fetch_measurements(&self, limit: Option<u32>) -> Result<Vec<Measurement>, TrackerError> {
        self.enter().await?;
        self.measurements_in(collections::MEASURES, None, limit)
    }

    async fn get_station(&self, station_id: &str) -> Result<Option<Station>, TrackerError> {
        self.enter().await?;
        self.get::<StationDocument>(&paths::station(station_id))?
            .map(|doc| doc.into_station(station_id))
            .transpose()
    }

    async fn fetch_latest_map(&self) -> Result<Option<PollutionMap>, TrackerError> {
        self.enter().await?;
        Ok(self
            .list::<PollutionMap>(collections::MAPS)
            .into_iter()
            .map(|(_, map)| map)
            .max_by_key(|map| map.date))
    }

    async fn get_grid_info(&self, grid_id: &str) -> Result<Option<GridInfo>, TrackerError> {
        self.enter().await?;
        self.get(&format!("{}/{}", collections::GRID_MAPS, grid_id))
    }

    async fn save_route(&self, route: &Route) -> Result<RouteId, TrackerError> {
        self.enter().await?;
        match &route.id {
            None => {
                let id = format!("r{}", self.next_route_id.fetch_add(1, Ordering::SeqCst) + 1);
                self.put(format!("{}/{}", paths::routes(&route.user_id), id), route)?;
                Ok(id)
            }
            Some(id) => {
                let path = format!("{}/{}", paths::routes(&route.user_id), id);
                self.merge(&path, route, &route.merge_fields(), false)?;
                Ok(id.clone())
            }
        }
    }

    async fn get_route(&self, user_id: &str, route_id: &str) -> Result<Option<Route>, TrackerError> {
        self.enter().await?;
        let route: Option<Route> = self.get(&format!("{}/{}", paths::routes(user_id), route_id))?;
        Ok(route.map(|mut r| {
            r.id = Some(route_id.to_string());
            r
        }))
    }

    async fn list_open_routes(&self, user_id: &str) -> Result<Vec<Route>, TrackerError> {
        self.enter().await?;
        Ok(self
            .list::<Route>(&paths::routes(user_id))
            .into_iter()
            .map(|(id, mut route)| {
                route.id = Some(id);
                route
            })
            .filter(Route::is_open)
            .collect())
    }

    async fn delete_route(&self, user_id: &str, route_id: &str) -> Result<(), TrackerError> {
        self.enter().await?;
        self.remove(&format!("{}/{}", paths::routes(user_id), route_id))
    }

    async fn list_devices(&self, user_id: &str) -> Result<Vec<Device>, TrackerError> {
        self.enter().await?;
        let docs = self
            .list::<DeviceDocument>(&paths::devices(user_id))
            .into_iter()
            .map(|(id, doc)| {
                let device = doc.into_device(&id);
                (id, device)
            });
        Ok(skip_malformed(collections::DEVICES, docs))
    }

    async fn save_device(&self, user_id: &str, device: &Device) -> Result<(), TrackerError> {
        self.enter().await?;
        self.put(format!("{}/{}", paths::devices(user_id), device.id), device)
    }

    async fn delete_device(&self, user_id: &str, device_id: &str) -> Result<(), TrackerError> {
        self.enter().await?;
        self.remove(&format!("{}/{}", paths::devices(user_id), device_id))
    }

    async fn save_favorite_destination(
        &self,
        user_id: &str,
        favorite: &FavoriteDestination,
    ) -> Result<String, TrackerError> {
        self.enter().await?;
        let id = self.next_doc_id();
        let mut stored = favorite.clone();
        stored.id = None;
        self.put(format!("{}/{}", paths::favorites(user_id), id), &stored)?;
        Ok(id)
    }

    async fn list_favorite_destinations(
        &self,
        user_id: &str,
    ) -> Result<Vec<FavoriteDestination>, TrackerError> {
        self.enter().await?;
        Ok(self
            .list::<FavoriteDestination>(&paths::favorites(user_id))
            .into_iter()
            .map(|(id, mut favorite)| {
                favorite.id = Some(id);
                favorite
            })
            .collect())
    }

    async fn get_user_profile(&self, user_id: &str) -> Result<Option<UserProfile>, TrackerError> {
        self.enter().await?;
        self.get(&paths::user(user_id))
    }

    async fn save_user_profile(
        &self,
        user_id: &str,
        profile: &UserProfile,
    ) -> Result<(), TrackerError> {
        self.enter().await?;
        self.merge(&paths::user(user_id), profile, &["name", "telephone"], true)
    }
}
