// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore integration tests.
//!
//! These tests require the Firestore emulator to be running
//! (FIRESTORE_EMULATOR_HOST set); otherwise they are skipped.
//! Offline-mode tests always run.

use airtrack::db::MeasurementRepository;
use airtrack::error::TrackerError;
use airtrack::models::{Device, FavoriteDestination, Route, UserProfile, Waypoint};

mod common;
use common::{pos, t0, test_db, test_db_offline};

/// Generate a unique user ID for test isolation.
fn unique_user_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("test-user-{}", nanos)
}

// ═══════════════════════════════════════════════════════════════════════════
// OFFLINE MODE
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_offline_calls_fail_as_unavailable() {
    let db = test_db_offline();

    let err = db.fetch_station_measurements("46131002", 1).await.unwrap_err();
    assert!(matches!(err, TrackerError::RepositoryUnavailable(_)));

    let err = db
        .save_route(&Route::open("u1", t0(), pos(40.0, -0.1)))
        .await
        .unwrap_err();
    assert!(matches!(err, TrackerError::RepositoryUnavailable(_)));
}

// ═══════════════════════════════════════════════════════════════════════════
// ROUTES
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_route_insert_then_merge() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_user_id();

    let mut route = Route::open(&user_id, t0(), pos(40.0, -0.1));
    let id = db.save_route(&route).await.unwrap();
    assert!(!id.is_empty());

    let open = db.list_open_routes(&user_id).await.unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].id.as_deref(), Some(id.as_str()));

    route.id = Some(id.clone());
    route.waypoints = vec![
        Waypoint {
            position: pos(40.01, -0.11),
            captured_at: t0() + chrono::Duration::minutes(1),
        },
        Waypoint {
            position: pos(40.02, -0.12),
            captured_at: t0() + chrono::Duration::minutes(2),
        },
    ];
    route.finish_time = Some(t0() + chrono::Duration::minutes(3));
    route.finish_point = Some(pos(40.03, -0.13));
    assert_eq!(db.save_route(&route).await.unwrap(), id);

    let stored = db.get_route(&user_id, &id).await.unwrap().unwrap();
    assert_eq!(stored, route);
    assert!(db.list_open_routes(&user_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_update_of_missing_route_is_not_found() {
    require_emulator!();

    let db = test_db().await;
    let mut route = Route::open(unique_user_id(), t0(), pos(40.0, -0.1));
    route.id = Some("does-not-exist".to_string());

    let err = db.save_route(&route).await.unwrap_err();
    assert!(matches!(err, TrackerError::NotFound(_)));
}

#[tokio::test]
async fn test_delete_route() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_user_id();
    let id = db
        .save_route(&Route::open(&user_id, t0(), pos(40.0, -0.1)))
        .await
        .unwrap();

    db.delete_route(&user_id, &id).await.unwrap();
    assert!(db.get_route(&user_id, &id).await.unwrap().is_none());
}

// ═══════════════════════════════════════════════════════════════════════════
// MEASUREMENTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_unknown_station_is_empty() {
    require_emulator!();

    let db = test_db().await;
    let station = unique_user_id();
    assert!(db
        .fetch_station_measurements(&station, 1)
        .await
        .unwrap()
        .is_empty());
    assert!(db.fetch_latest_measurement(&station).await.unwrap().is_none());
}

// ═══════════════════════════════════════════════════════════════════════════
// USER RECORDS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_user_records() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_user_id();

    let device = Device {
        id: "sensor-1".to_string(),
        alias: "Bike".to_string(),
        linked_at: t0(),
    };
    db.save_device(&user_id, &device).await.unwrap();
    assert_eq!(db.list_devices(&user_id).await.unwrap(), vec![device]);
    db.delete_device(&user_id, "sensor-1").await.unwrap();
    assert!(db.list_devices(&user_id).await.unwrap().is_empty());

    let favorite = FavoriteDestination {
        id: None,
        alias: "Work".to_string(),
        destination: pos(38.96, -0.17),
    };
    let fav_id = db
        .save_favorite_destination(&user_id, &favorite)
        .await
        .unwrap();
    let favorites = db.list_favorite_destinations(&user_id).await.unwrap();
    assert_eq!(favorites.len(), 1);
    assert_eq!(favorites[0].id.as_deref(), Some(fav_id.as_str()));

    let profile = UserProfile {
        name: "Ana".to_string(),
        telephone: None,
    };
    db.save_user_profile(&user_id, &profile).await.unwrap();
    assert_eq!(db.get_user_profile(&user_id).await.unwrap(), Some(profile));
}
