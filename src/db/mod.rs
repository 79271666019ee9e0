// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Measurement/route repository: the trait, Firestore, and an in-memory store.

pub mod firestore;
pub mod memory;
pub mod repository;

pub use self::firestore::FirestoreDb;
pub use memory::InMemoryRepository;
pub use repository::MeasurementRepository;

use crate::error::TrackerError;
use crate::models::{Measurement, MeasurementDocument};

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const ROUTES: &str = "routes";
    pub const DEVICES: &str = "devices";
    pub const FAV_DESTINATIONS: &str = "favDestinations";
    pub const STATIONS: &str = "stations";
    /// Per-station subcollection and top-level collection of raw measurements
    pub const MEASURES: &str = "measures";
    pub const MAPS: &str = "maps";
    pub const GRID_MAPS: &str = "gridMaps";
}

/// Document paths, e.g. `users/{userId}/routes/{routeId}`.
pub mod paths {
    use super::collections;

    pub fn user(user_id: &str) -> String {
        format!("{}/{}", collections::USERS, user_id)
    }

    pub fn routes(user_id: &str) -> String {
        format!("{}/{}", user(user_id), collections::ROUTES)
    }

    pub fn devices(user_id: &str) -> String {
        format!("{}/{}", user(user_id), collections::DEVICES)
    }

    pub fn favorites(user_id: &str) -> String {
        format!("{}/{}", user(user_id), collections::FAV_DESTINATIONS)
    }

    pub fn station(station_id: &str) -> String {
        format!("{}/{}", collections::STATIONS, station_id)
    }

    pub fn station_measures(station_id: &str) -> String {
        format!("{}/{}", station(station_id), collections::MEASURES)
    }
}

/// Validate raw measurement documents, dropping (and logging) malformed ones.
///
/// Documents under a station may omit `stationId`; it is taken from the path.
pub(crate) fn validate_measurements(
    docs: Vec<MeasurementDocument>,
    station_id: Option<&str>,
) -> Vec<Measurement> {
    docs.into_iter()
        .filter_map(|mut doc| {
            if doc.station_id.is_none() {
                doc.station_id = station_id.map(str::to_string);
            }
            match Measurement::try_from(doc) {
                Ok(measurement) => Some(measurement),
                Err(e) => {
                    tracing::warn!(error = %e, station_id, "Skipping malformed measurement");
                    None
                }
            }
        })
        .collect()
}

/// Keep the documents of a listing that decode, logging the rest.
pub(crate) fn skip_malformed<T>(
    collection: &str,
    docs: impl IntoIterator<Item = (String, Result<T, TrackerError>)>,
) -> Vec<T> {
    docs.into_iter()
        .filter_map(|(document_id, decoded)| match decoded {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(collection, document_id = %document_id, error = %e, "Skipping malformed document");
                None
            }
        })
        .collect()
}
