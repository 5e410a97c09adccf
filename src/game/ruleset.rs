// Copyright (c) 2026 cueclock project
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/cueclock/cueclock-rs

//! Ruleset - the timing parameters governing a match

use serde::{Deserialize, Serialize};

/// Named bundle of timing parameters. Created by the operator through
/// the external API; read-only here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ruleset {
    pub id: u32,
    pub name: String,
    /// First turn duration, seconds
    pub initial_duration: f64,
    /// Every later turn duration, seconds
    pub turn_duration: f64,
    /// Seconds before expiry at which the warning alarm fires
    pub alarm_time: f64,
    /// Seconds added by one time increment
    pub increment_duration: f64,
    /// Increments available to each player over a match
    pub max_increments_per_match: u32,
}

impl Ruleset {
    /// Stock WPA-style shot clock: 60 s opening shot, 35 s per turn,
    /// warning 10 s out, one 25 s extension per player.
    pub fn wpa() -> Self {
        Self {
            id: 0,
            name: "wpa_rules".to_string(),
            initial_duration: 60.0,
            turn_duration: 35.0,
            alarm_time: 10.0,
            increment_duration: 25.0,
            max_increments_per_match: 1,
        }
    }
}
