//! Application configuration loaded from environment variables.

use crate::services::SessionOptions;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Station shown by default (Gandia air quality station).
pub const DEFAULT_STATION_ID: &str = "46131002";

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// GCP project ID
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// Session token signing key (raw bytes)
    pub jwt_signing_key: Vec<u8>,

    // --- Tracking ---
    /// How long a start/finish request waits for a GPS fix
    pub position_timeout: Duration,
    /// Upper bound on every repository call made by a route session
    pub repository_timeout: Duration,
    /// Fixes older than this are not reused for start/finish
    pub max_fix_age: Duration,
    /// GeoJSON file with known beacon locations (beacon tracking off if unset)
    pub beacon_registry_path: Option<String>,
    /// Sightings farther than this (meters) are not turned into waypoints
    pub beacon_max_distance_m: f64,
    /// Region ranged while a route is open
    pub beacon_region: String,
    pub default_station_id: String,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            frontend_url: "http://localhost:8100".to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            position_timeout: Duration::from_secs(10),
            repository_timeout: Duration::from_secs(15),
            max_fix_age: Duration::from_secs(30),
            beacon_registry_path: None,
            beacon_max_distance_m: 5.0,
            beacon_region: "default".to_string(),
            default_station_id: DEFAULT_STATION_ID.to_string(),
        }
    }
}

impl Config {
    /// Config for tests: fixed signing key, no beacon registry.
    pub fn test_default() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let defaults = Self::default();

        Ok(Self {
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: parse_or("PORT", defaults.port)?,
            frontend_url: env::var("FRONTEND_URL").unwrap_or(defaults.frontend_url),
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            position_timeout: Duration::from_secs(parse_or(
                "POSITION_TIMEOUT_SECS",
                defaults.position_timeout.as_secs(),
            )?),
            repository_timeout: Duration::from_secs(parse_or(
                "REPOSITORY_TIMEOUT_SECS",
                defaults.repository_timeout.as_secs(),
            )?),
            max_fix_age: Duration::from_secs(parse_or(
                "MAX_FIX_AGE_SECS",
                defaults.max_fix_age.as_secs(),
            )?),
            beacon_registry_path: env::var("BEACON_REGISTRY_PATH").ok(),
            beacon_max_distance_m: parse_or("BEACON_MAX_DISTANCE_M", defaults.beacon_max_distance_m)?,
            beacon_region: env::var("BEACON_REGION").unwrap_or(defaults.beacon_region),
            default_station_id: env::var("DEFAULT_STATION_ID")
                .unwrap_or(defaults.default_station_id),
        })
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            position_timeout: self.position_timeout,
            repository_timeout: self.repository_timeout,
        }
    }
}

fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => {
            let parsed = raw.trim().parse();
            parsed.map_err(|_| ConfigError::Invalid(name, raw))
        }
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}
