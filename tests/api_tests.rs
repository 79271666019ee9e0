// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP API tests.
//!
//! These tests verify that:
//! 1. Protected routes reject requests without valid tokens
//! 2. A route can be started, fed and finished over HTTP
//! 3. Request bodies are validated and state violations map to 409

use airtrack::middleware::auth::{create_jwt, SESSION_COOKIE};
use airtrack::models::Measurement;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tower::ServiceExt;

mod common;
use common::{create_test_app, t0};

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

// ═══════════════════════════════════════════════════════════════════════════
// AUTH
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_health_is_public() {
    let app = create_test_app();
    let (status, body) = send(&app.router, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let app = create_test_app();
    for (method, uri) in [
        (Method::GET, "/api/me"),
        (Method::GET, "/api/devices"),
        (Method::POST, "/api/routes/start"),
        (Method::GET, "/api/routes/current"),
        (Method::GET, "/api/heatmap"),
    ] {
        let (status, _) = send(&app.router, method, uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
    }
}

#[tokio::test]
async fn test_token_signed_with_other_key_is_rejected() {
    let app = create_test_app();
    let forged = create_jwt("u1", b"some_other_key_that_is_long_enough").unwrap();
    let (status, _) = send(&app.router, Method::GET, "/api/me", Some(&forged), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_session_cookie_is_accepted() {
    let app = create_test_app();
    let request = Request::builder()
        .uri("/api/me")
        .header(
            header::COOKIE,
            format!("{}={}", SESSION_COOKIE, app.token("u1")),
        )
        .body(Body::empty())
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap(),
        "no-store"
    );
}

// ═══════════════════════════════════════════════════════════════════════════
// ROUTES
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_route_flow_over_http() {
    let app = create_test_app();
    let token = app.token("u1");
    let token = Some(token.as_str());
    let r = &app.router;

    let (status, _) = send(r, Method::POST, "/api/position", token, Some(json!({"latitude": 40.0, "longitude": -0.1}))).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, route) = send(r, Method::POST, "/api/routes/start", token, None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(route["id"], "r1");
    assert_eq!(route["userId"], "u1");
    assert_eq!(route["startPoint"]["latitude"], 40.0);

    let (status, _) = send(r, Method::POST, "/api/routes/start", token, None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    for (lat, lng) in [(40.01, -0.11), (40.02, -0.12)] {
        app.clock.advance(chrono::Duration::seconds(30));
        let (status, body) = send(r, Method::POST, "/api/routes/waypoints", token, Some(json!({"latitude": lat, "longitude": lng}))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["waypoints"].as_u64().unwrap() >= 1);
    }

    let (status, current) = send(r, Method::GET, "/api/routes/current", token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(current["state"], "open");
    assert_eq!(current["route"]["waypoints"].as_array().unwrap().len(), 2);

    send(r, Method::POST, "/api/position", token, Some(json!({"latitude": 40.03, "longitude": -0.13}))).await;
    let (status, summary) = send(r, Method::POST, "/api/routes/finish", token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["route"]["finishPoint"]["longitude"], -0.13);
    assert!(summary["lengthMeters"].as_f64().unwrap() > 0.0);
    assert!(summary["polyline"].is_string());

    let (status, _) = send(r, Method::POST, "/api/routes/finish", token, None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, stored) = send(r, Method::GET, "/api/routes/r1", token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stored["route"]["waypoints"].as_array().unwrap().len(), 2);

    // Other users cannot see it
    let other = app.token("u2");
    let (status, _) = send(r, Method::GET, "/api/routes/r1", Some(&other), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_start_without_fix_is_unavailable() {
    let app = create_test_app();
    let token = app.token("u1");

    let (status, body) = send(&app.router, Method::POST, "/api/routes/start", Some(&token), None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "position_unavailable");
    assert_eq!(app.repo.write_count(), 0);
}

#[tokio::test]
async fn test_waypoint_without_route_is_conflict() {
    let app = create_test_app();
    let token = app.token("u1");

    let (status, body) = send(&app.router, Method::POST, "/api/routes/waypoints", Some(&token), Some(json!({"latitude": 40.0, "longitude": -0.1}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "not_open");
}

#[tokio::test]
async fn test_abandon_then_resume_fails() {
    let app = create_test_app();
    let token = app.token("u1");
    let token = Some(token.as_str());
    let r = &app.router;

    send(r, Method::POST, "/api/position", token, Some(json!({"latitude": 40.0, "longitude": -0.1}))).await;
    send(r, Method::POST, "/api/routes/start", token, None).await;

    let (status, _) = send(r, Method::POST, "/api/routes/abandon", token, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(app.repo.document("users/u1/routes/r1").is_none());

    let (status, _) = send(r, Method::POST, "/api/routes/r1/resume", token, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // A new route can be started after abandoning
    let (status, route) = send(r, Method::POST, "/api/routes/start", token, None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(route["id"], "r2");
}

#[tokio::test]
async fn test_resume_open_route_from_store() {
    let app = create_test_app();
    let token = app.token("u1");
    let token = Some(token.as_str());

    // Left open by an earlier app run
    app.repo.insert_document(
        "users/u1/routes/r7",
        json!({
            "userId": "u1",
            "startTime": "2019-12-09T09:00:00Z",
            "startPoint": {"latitude": 40.0, "longitude": -0.1},
            "waypoints": []
        }),
    );

    let (status, route) = send(&app.router, Method::POST, "/api/routes/r7/resume", token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(route["id"], "r7");

    let (_, current) = send(&app.router, Method::GET, "/api/routes/current", token, None).await;
    assert_eq!(current["state"], "open");
}

#[tokio::test]
async fn test_invalid_position_is_bad_request() {
    let app = create_test_app();
    let token = app.token("u1");

    let (status, body) = send(&app.router, Method::POST, "/api/position", Some(&token), Some(json!({"latitude": 91.0, "longitude": 0.0}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");
}

// ═══════════════════════════════════════════════════════════════════════════
// USER RECORDS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_devices_over_http() {
    let app = create_test_app();
    let token = app.token("u1");
    let token = Some(token.as_str());
    let r = &app.router;

    let (status, device) = send(r, Method::POST, "/api/devices", token, Some(json!({"id": "sensor-1", "alias": "Bike"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(device["alias"], "Bike");

    let (status, _) = send(r, Method::POST, "/api/devices", token, Some(json!({"id": "sensor-2", "alias": ""}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, devices) = send(r, Method::GET, "/api/devices", token, None).await;
    assert_eq!(devices.as_array().unwrap().len(), 1);

    let (status, _) = send(r, Method::DELETE, "/api/devices/sensor-1", token, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(r, Method::DELETE, "/api/devices/sensor-1", token, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_favorites_and_profile() {
    let app = create_test_app();
    let token = app.token("u1");
    let token = Some(token.as_str());
    let r = &app.router;

    let (status, favorite) = send(r, Method::POST, "/api/favorites", token, Some(json!({"alias": "Work", "destination": {"latitude": 38.96, "longitude": -0.17}}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(favorite["id"].is_string());

    let (_, favorites) = send(r, Method::GET, "/api/favorites", token, None).await;
    assert_eq!(favorites[0]["alias"], "Work");

    let (_, me) = send(r, Method::GET, "/api/me", token, None).await;
    assert_eq!(me["userId"], "u1");
    assert!(me["profile"].is_null());

    let (status, _) = send(r, Method::PUT, "/api/me", token, Some(json!({"name": "Ana", "telephone": "600000000"}))).await;
    assert_eq!(status, StatusCode::OK);
    let (_, me) = send(r, Method::GET, "/api/me", token, None).await;
    assert_eq!(me["profile"]["name"], "Ana");
}

// ═══════════════════════════════════════════════════════════════════════════
// STATIONS & HEAT MAP
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_station_endpoints() {
    let app = create_test_app();
    let token = app.token("u1");
    let token = Some(token.as_str());
    let r = &app.router;

    let (status, measurements) = send(r, Method::GET, "/api/stations/46131002/measurements?limit=1", token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(measurements, json!([]));

    let (status, _) = send(r, Method::GET, "/api/stations/46131002/latest", token, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    app.repo.seed_station_measurement(&Measurement {
        station_id: "46131002".to_string(),
        latitude: 38.97,
        longitude: -0.18,
        timestamp: t0(),
        readings: BTreeMap::from([("O3".to_string(), 61.0)]),
    });
    let (status, latest) = send(r, Method::GET, "/api/stations/46131002/latest", token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(latest["readings"]["O3"], 61.0);

    // Configured station
    let (status, latest) = send(r, Method::GET, "/api/stations/default/latest", token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(latest["stationId"], "46131002");
}

#[tokio::test]
async fn test_heatmap_is_geojson() {
    let app = create_test_app();
    let token = app.token("u1");
    let token = Some(token.as_str());

    for i in 0..3 {
        app.repo.seed_measurement(&Measurement {
            station_id: "46131002".to_string(),
            latitude: 38.97 + i as f64 * 0.01,
            longitude: -0.18,
            timestamp: t0() + chrono::Duration::hours(i),
            readings: BTreeMap::new(),
        });
    }

    let (status, fc) = send(&app.router, Method::GET, "/api/heatmap", token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fc["type"], "FeatureCollection");
    let features = fc["features"].as_array().unwrap();
    assert_eq!(features.len(), 3);
    assert_eq!(features[0]["properties"]["weight"], 1.0);

    let (status, _) = send(&app.router, Method::GET, "/api/heatmap/grid/gandia", token, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
