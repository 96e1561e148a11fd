//! Engagement scoring.
//!
//! ```text
//! score = active*0.5 + clicks*0.3 + keys*0.2 + scroll*0.1 - idle*0.5
//! score = max(0, score)
//! ```
//!
//! Idle time carries the same weight as active time so an idle stretch fully
//! offsets the same amount of activity. The clamp keeps every score usable as
//! a min-heap key.

use serde::{Deserialize, Serialize};

use crate::activity::ActivityRecord;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub active_time: f64,
    pub click: f64,
    pub key_press: f64,
    pub scroll_depth: f64,
    pub idle_time: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            active_time: 0.5,
            click: 0.3,
            key_press: 0.2,
            scroll_depth: 0.1,
            idle_time: 0.5,
        }
    }
}

/// Scores a record with the default weights.
pub fn score(record: &ActivityRecord) -> f64 {
    score_with(record, &ScoringWeights::default())
}

pub fn score_with(record: &ActivityRecord, weights: &ScoringWeights) -> f64 {
    let raw = signal(record.active_time) * weights.active_time
        + signal(record.click_count) * weights.click
        + signal(record.key_presses) * weights.key_press
        + signal(record.max_scroll_depth) * weights.scroll_depth
        - signal(record.idle_time) * weights.idle_time;
    // f64::max discards NaN, so garbage input lands on 0.
    raw.max(0.0)
}

fn signal(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value
    }
}
