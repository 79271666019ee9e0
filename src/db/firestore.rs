// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Document layout:
//! - `users/{userId}` (profile) with `routes`, `devices`, `favDestinations`
//! - `stations/{stationId}` with a `measures` subcollection
//! - `measures`, `maps`, `gridMaps` at the top level

use crate::db::repository::MeasurementRepository;
use crate::db::{collections, skip_malformed, validate_measurements};
use crate::error::TrackerError;
use crate::models::measurement::{StationDocument, MEASUREMENT_TIME_FIELD};
use crate::models::{
    Device, DeviceDocument, FavoriteDestination, GridInfo, Measurement, MeasurementDocument, PollutionMap, Route,
    RouteId, Station, UserProfile,
};
use firestore::errors::FirestoreError;
use firestore::{FirestoreQueryDirection, ParentPathBuilder};
use serde::de::DeserializeOwned;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, TrackerError> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id).await.map_err(|e| {
            TrackerError::RepositoryUnavailable(format!("Failed to connect to Firestore: {}", e))
        })?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, TrackerError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            TrackerError::RepositoryUnavailable(format!(
                "Failed to connect to Firestore Emulator: {}",
                e
            ))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return `RepositoryUnavailable`.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, TrackerError> {
        self.client.as_ref().ok_or_else(|| {
            TrackerError::RepositoryUnavailable("Database not connected (offline mode)".to_string())
        })
    }

    fn user_parent(&self, user_id: &str) -> Result<ParentPathBuilder, TrackerError> {
        self.get_client()?
            .parent_path(collections::USERS, user_id)
            .map_err(map_db_err)
    }

    /// Documents of a user subcollection as (document ID, value) pairs.
    /// Documents that do not deserialize are skipped.
    async fn list_docs<T: DeserializeOwned>(
        &self,
        collection: &str,
        parent: &ParentPathBuilder,
    ) -> Result<Vec<(String, T)>, TrackerError> {
        let docs = self
            .get_client()?
            .fluent()
            .select()
            .from(collection)
            .parent(parent)
            .query()
            .await
            .map_err(map_db_err)?;

        let decoded = docs.iter().map(|doc| {
            let id = doc.name.rsplit('/').next().unwrap_or_default().to_string();
            let value = firestore::FirestoreDb::deserialize_doc_to::<T>(doc)
                .map(|value| (id.clone(), value))
                .map_err(map_db_err);
            (id, value)
        });
        Ok(skip_malformed(collection, decoded))
    }

    async fn fetch_measurement_docs(
        &self,
        parent: Option<&ParentPathBuilder>,
        limit: Option<u32>,
    ) -> Result<Vec<MeasurementDocument>, TrackerError> {
        let query = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::MEASURES);

        let query = match parent {
            Some(parent) => query.parent(parent),
            None => query,
        };

        let query =
            query.order_by([(MEASUREMENT_TIME_FIELD, FirestoreQueryDirection::Descending)]);

        let query = match limit {
            Some(limit) => query.limit(limit),
            None => query,
        };

        query.obj().query().await.map_err(map_db_err)
    }
}

/// Map Firestore failures onto the repository error taxonomy.
fn map_db_err(e: FirestoreError) -> TrackerError {
    match e {
        FirestoreError::DataNotFoundError(err) => TrackerError::NotFound(err.to_string()),
        FirestoreError::DeserializeError(err) => TrackerError::InvalidDocument(err.to_string()),
        other => TrackerError::RepositoryUnavailable(other.to_string()),
    }
}

impl MeasurementRepository for FirestoreDb {
    // ─── Measurement Operations ──────────────────────────────────

    async fn fetch_station_measurements(
        &self,
        station_id: &str,
        limit: u32,
    ) -> Result<Vec<Measurement>, TrackerError> {
        let parent = self
            .get_client()?
            .parent_path(collections::STATIONS, station_id)
            .map_err(map_db_err)?;

        let docs = self.fetch_measurement_docs(Some(&parent), Some(limit)).await?;
        Ok(validate_measurements(docs, Some(station_id)))
    }

    async fn fetch_measurements(&self, limit: Option<u32>) -> Result<Vec<Measurement>, TrackerError> {
        let docs = self.fetch_measurement_docs(None, limit).await?;
        Ok(validate_measurements(docs, None))
    }

    async fn get_station(&self, station_id: &str) -> Result<Option<Station>, TrackerError> {
        let doc: Option<StationDocument> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::STATIONS)
            .obj()
            .one(station_id)
            .await
            .map_err(map_db_err)?;

        doc.map(|d| d.into_station(station_id)).transpose()
    }

    async fn fetch_latest_map(&self) -> Result<Option<PollutionMap>, TrackerError> {
        let maps: Vec<PollutionMap> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::MAPS)
            .order_by([("date", FirestoreQueryDirection::Descending)])
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(map_db_err)?;

        Ok(maps.into_iter().next())
    }

    async fn get_grid_info(&self, grid_id: &str) -> Result<Option<GridInfo>, TrackerError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::GRID_MAPS)
            .obj()
            .one(grid_id)
            .await
            .map_err(map_db_err)
    }

    // ─── Route Operations ────────────────────────────────────────

    async fn save_route(&self, route: &Route) -> Result<RouteId, TrackerError> {
        let client = self.get_client()?;
        let parent = self.user_parent(&route.user_id)?;

        match &route.id {
            None => {
                let stored: Route = client
                    .fluent()
                    .insert()
                    .into(collections::ROUTES)
                    .generate_document_id()
                    .parent(&parent)
                    .object(route)
                    .execute()
                    .await
                    .map_err(map_db_err)?;

                let route_id = stored.id.ok_or_else(|| {
                    TrackerError::RepositoryUnavailable(
                        "Insert did not return a document ID".to_string(),
                    )
                })?;
                tracing::debug!(user_id = %route.user_id, route_id = %route_id, "Route created");
                Ok(route_id)
            }
            Some(route_id) => {
                // Updates without a precondition would create the document.
                if self.get_route(&route.user_id, route_id).await?.is_none() {
                    return Err(TrackerError::NotFound(format!("route {}", route_id)));
                }

                let _: () = client
                    .fluent()
                    .update()
                    .fields(route.merge_fields())
                    .in_col(collections::ROUTES)
                    .document_id(route_id)
                    .parent(&parent)
                    .object(route)
                    .execute()
                    .await
                    .map_err(map_db_err)?;

                tracing::debug!(user_id = %route.user_id, route_id = %route_id, "Route merged");
                Ok(route_id.clone())
            }
        }
    }

    async fn get_route(&self, user_id: &str, route_id: &str) -> Result<Option<Route>, TrackerError> {
        let parent = self.user_parent(user_id)?;
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::ROUTES)
            .parent(&parent)
            .obj()
            .one(route_id)
            .await
            .map_err(map_db_err)
    }

    async fn list_open_routes(&self, user_id: &str) -> Result<Vec<Route>, TrackerError> {
        let parent = self.user_parent(user_id)?;
        // Firestore cannot filter on a missing field, so filter client side.
        let routes = self
            .list_docs::<Route>(collections::ROUTES, &parent)
            .await?
            .into_iter()
            .map(|(id, mut route)| {
                route.id = Some(id);
                route
            })
            .filter(Route::is_open)
            .collect();
        Ok(routes)
    }

    async fn delete_route(&self, user_id: &str, route_id: &str) -> Result<(), TrackerError> {
        if self.get_route(user_id, route_id).await?.is_none() {
            return Err(TrackerError::NotFound(format!("route {}", route_id)));
        }

        let parent = self.user_parent(user_id)?;
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::ROUTES)
            .document_id(route_id)
            .parent(&parent)
            .execute()
            .await
            .map_err(map_db_err)?;

        tracing::info!(user_id, route_id, "Route deleted");
        Ok(())
    }

    // ─── Device Operations ───────────────────────────────────────

    async fn list_devices(&self, user_id: &str) -> Result<Vec<Device>, TrackerError> {
        let parent = self.user_parent(user_id)?;
        let docs = self
            .list_docs::<DeviceDocument>(collections::DEVICES, &parent)
            .await?
            .into_iter()
            .map(|(id, doc)| {
                let device = doc.into_device(&id);
                (id, device)
            });
        Ok(skip_malformed(collections::DEVICES, docs))
    }

    async fn save_device(&self, user_id: &str, device: &Device) -> Result<(), TrackerError> {
        let parent = self.user_parent(user_id)?;
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::DEVICES)
            .document_id(&device.id)
            .parent(&parent)
            .object(device)
            .execute()
            .await
            .map_err(map_db_err)?;
        Ok(())
    }

    async fn delete_device(&self, user_id: &str, device_id: &str) -> Result<(), TrackerError> {
        let parent = self.user_parent(user_id)?;
        let client = self.get_client()?;

        let existing: Option<DeviceDocument> = client
            .fluent()
            .select()
            .by_id_in(collections::DEVICES)
            .parent(&parent)
            .obj()
            .one(device_id)
            .await
            .map_err(map_db_err)?;
        if existing.is_none() {
            return Err(TrackerError::NotFound(format!("device {}", device_id)));
        }

        client
            .fluent()
            .delete()
            .from(collections::DEVICES)
            .document_id(device_id)
            .parent(&parent)
            .execute()
            .await
            .map_err(map_db_err)?;

        tracing::info!(user_id, device_id, "Device unlinked");
        Ok(())
    }

    // ─── Favorites & Profile ─────────────────────────────────────

    async fn save_favorite_destination(
        &self,
        user_id: &str,
        favorite: &FavoriteDestination,
    ) -> Result<String, TrackerError> {
        let parent = self.user_parent(user_id)?;
        let mut new_favorite = favorite.clone();
        new_favorite.id = None;

        let stored: FavoriteDestination = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::FAV_DESTINATIONS)
            .generate_document_id()
            .parent(&parent)
            .object(&new_favorite)
            .execute()
            .await
            .map_err(map_db_err)?;

        stored.id.ok_or_else(|| {
            TrackerError::RepositoryUnavailable("Insert did not return a document ID".to_string())
        })
    }

    async fn list_favorite_destinations(
        &self,
        user_id: &str,
    ) -> Result<Vec<FavoriteDestination>, TrackerError> {
        let parent = self.user_parent(user_id)?;
        let favorites = self
            .list_docs::<FavoriteDestination>(collections::FAV_DESTINATIONS, &parent)
            .await?
            .into_iter()
            .map(|(id, mut favorite)| {
                favorite.id = Some(id);
                favorite
            })
            .collect();
        Ok(favorites)
    }

    async fn get_user_profile(&self, user_id: &str) -> Result<Option<UserProfile>, TrackerError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(user_id)
            .await
            .map_err(map_db_err)
    }

    async fn save_user_profile(
        &self,
        user_id: &str,
        profile: &UserProfile,
    ) -> Result<(), TrackerError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .fields(["name", "telephone"])
            .in_col(collections::USERS)
            .document_id(user_id)
            .object(profile)
            .execute()
            .await
            .map_err(map_db_err)?;
        Ok(())
    }
}
