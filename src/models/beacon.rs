// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! BLE beacon sightings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// One ranging result for a proximity beacon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BeaconSighting {
    #[validate(length(min = 1))]
    pub beacon_id: String,
    /// Estimated distance to the beacon in meters
    #[validate(range(min = 0.0))]
    pub estimated_distance: f64,
    pub observed_at: DateTime<Utc>,
}
