// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use airtrack::config::Config;
use airtrack::db::{FirestoreDb, InMemoryRepository};
use airtrack::middleware::auth::create_jwt;
use airtrack::models::Position;
use airtrack::routes::create_router;
use airtrack::time_utils::ManualClock;
use airtrack::AppState;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a mock database connection (offline).
#[allow(dead_code)]
pub fn test_db_offline() -> FirestoreDb {
    FirestoreDb::new_mock()
}

/// Fixed start of test time: 2019-12-09T10:00:00Z.
#[allow(dead_code)]
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2019, 12, 9, 10, 0, 0).unwrap()
}

#[allow(dead_code)]
pub fn pos(latitude: f64, longitude: f64) -> Position {
    Position::new(latitude, longitude)
}

/// Test app backed by an in-memory repository and a manual clock.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState<InMemoryRepository>>,
    pub repo: Arc<InMemoryRepository>,
    pub clock: Arc<ManualClock>,
}

#[allow(dead_code)]
impl TestApp {
    /// Bearer token for `user_id`, signed with the test key.
    pub fn token(&self, user_id: &str) -> String {
        create_jwt(user_id, &self.state.config.jwt_signing_key).expect("Failed to sign test JWT")
    }
}

/// Create a test app with short timeouts so missing fixes fail quickly.
#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    let mut config = Config::test_default();
    config.position_timeout = std::time::Duration::from_millis(200);
    config.repository_timeout = std::time::Duration::from_secs(2);

    let repo = Arc::new(InMemoryRepository::new());
    let clock = Arc::new(ManualClock::new(t0()));
    let state = Arc::new(AppState::new(config, repo.clone(), clock.clone()));

    TestApp {
        router: create_router(state.clone()),
        state,
        repo,
        clock,
    }
}
