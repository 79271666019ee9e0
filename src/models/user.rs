// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! User-owned records: profile, linked devices and favorite destinations.

use crate::error::TrackerError;
use crate::models::Position;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Profile stored at `users/{userId}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserProfile {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 32))]
    pub telephone: Option<String>,
}

/// Sensor device linked to a user, stored at `users/{userId}/devices/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Device {
    /// Hardware identifier (also the document ID)
    #[validate(length(min = 1, max = 128))]
    pub id: String,
    #[validate(length(min = 1, max = 64))]
    pub alias: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub linked_at: DateTime<Utc>,
}

/// Stored shape of a device. Older app versions wrote `date` as epoch
/// milliseconds instead of `linkedAt`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDocument {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub linked_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub date: Option<f64>,
}

impl DeviceDocument {
    /// Validate, falling back to the document ID for a missing `id`.
    pub fn into_device(self, document_id: &str) -> Result<Device, TrackerError> {
        let invalid = |what: &str| {
            TrackerError::InvalidDocument(format!("device {document_id}: {what}"))
        };
        let linked_at = match (self.linked_at, self.date) {
            (Some(linked_at), _) => linked_at,
            (None, Some(millis)) => DateTime::from_timestamp_millis(millis as i64)
                .ok_or_else(|| invalid("date out of range"))?,
            (None, None) => return Err(invalid("missing linkedAt")),
        };
        Ok(Device {
            id: self.id.unwrap_or_else(|| document_id.to_string()),
            alias: self.alias.ok_or_else(|| invalid("missing alias"))?,
            linked_at,
        })
    }
}

/// Saved destination, stored at `users/{userId}/favDestinations/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteDestination {
    /// Document ID, assigned on save
    #[serde(
        default,
        alias = "_firestore_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub alias: String,
    #[serde(alias = "destinationPoint")]
    #[validate(nested)]
    pub destination: Position,
}
