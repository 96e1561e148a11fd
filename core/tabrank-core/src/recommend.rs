//! Close/keep verdicts.
//!
//! Rules, first match wins:
//!
//! 1. Tab younger than the grace period: `no-data`.
//! 2. No engagement signal ever recorded: `close` once idle passes the idle
//!    threshold, `no-data` before that. Zero engagement with zero idle looks
//!    exactly like "not measured yet".
//! 3. Score bands, inclusive at each lower bound: `keep` ≥ 20, `consider`
//!    ≥ 10, `close` below.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::activity::ActivityRecord;
use crate::types::TabId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Recommendation {
    NoData,
    Keep,
    Consider,
    Close,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::NoData => "no-data",
            Recommendation::Keep => "keep",
            Recommendation::Consider => "consider",
            Recommendation::Close => "close",
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationThresholds {
    pub grace_period_secs: f64,
    /// Idle seconds after which an unengaged tab is recommended for closing.
    pub idle_close_secs: f64,
    pub keep_min: f64,
    pub consider_min: f64,
}

impl Default for RecommendationThresholds {
    fn default() -> Self {
        Self {
            grace_period_secs: 5.0,
            idle_close_secs: 30.0,
            keep_min: 20.0,
            consider_min: 10.0,
        }
    }
}

/// Last verdict issued for a tab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationSnapshot {
    pub tab_id: TabId,
    pub score: f64,
    pub recommendation: Recommendation,
    pub computed_at: DateTime<Utc>,
}

/// Verdict with the default thresholds.
pub fn recommend(score: f64, record: &ActivityRecord, now: DateTime<Utc>) -> Recommendation {
    recommend_with(score, record, now, &RecommendationThresholds::default())
}

pub fn recommend_with(
    score: f64,
    record: &ActivityRecord,
    now: DateTime<Utc>,
    thresholds: &RecommendationThresholds,
) -> Recommendation {
    if tab_age_secs(record, now) < thresholds.grace_period_secs {
        return Recommendation::NoData;
    }

    if record.has_no_engagement() {
        return if record.idle_time > thresholds.idle_close_secs {
            Recommendation::Close
        } else {
            Recommendation::NoData
        };
    }

    if score >= thresholds.keep_min {
        Recommendation::Keep
    } else if score >= thresholds.consider_min {
        Recommendation::Consider
    } else {
        Recommendation::Close
    }
}

/// Seconds since the tab was first seen. Unknown first-seen counts as brand new.
fn tab_age_secs(record: &ActivityRecord, now: DateTime<Utc>) -> f64 {
    let first_seen = record.first_seen.unwrap_or(now);
    now.signed_duration_since(first_seen).num_milliseconds() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn aged_record(age: Duration) -> (ActivityRecord, DateTime<Utc>) {
        let now = Utc::now();
        let mut record = ActivityRecord::new(TabId(1));
        record.first_seen = Some(now - age);
        (record, now)
    }

    #[test]
    fn young_tab_has_no_data_regardless_of_signals() {
        let (mut record, now) = aged_record(Duration::seconds(2));
        record.active_time = 500.0;
        record.idle_time = 500.0;
        assert_eq!(recommend(250.0, &record, now), Recommendation::NoData);
    }

    #[test]
    fn missing_first_seen_counts_as_new() {
        let mut record = ActivityRecord::new(TabId(1));
        record.active_time = 100.0;
        assert_eq!(recommend(50.0, &record, Utc::now()), Recommendation::NoData);
    }

    #[test]
    fn grace_period_boundary_is_exclusive() {
        let (mut record, now) = aged_record(Duration::seconds(5));
        record.click_count = 100.0;
        assert_eq!(recommend(30.0, &record, now), Recommendation::Keep);
    }

    #[test]
    fn idle_only_tab_closes_after_threshold() {
        let (mut record, now) = aged_record(Duration::seconds(10));
        record.idle_time = 40.0;
        assert_eq!(recommend(0.0, &record, now), Recommendation::Close);
    }

    #[test]
    fn idle_only_tab_at_threshold_has_no_data() {
        let (mut record, now) = aged_record(Duration::seconds(10));
        record.idle_time = 30.0;
        assert_eq!(recommend(0.0, &record, now), Recommendation::NoData);
        record.idle_time = 0.0;
        assert_eq!(recommend(0.0, &record, now), Recommendation::NoData);
    }

    #[test]
    fn score_bands_are_lower_inclusive() {
        let (mut record, now) = aged_record(Duration::seconds(10));
        record.key_presses = 1.0;

        let cases = [
            (0.0, Recommendation::Close),
            (9.999, Recommendation::Close),
            (10.0, Recommendation::Consider),
            (19.999, Recommendation::Consider),
            (20.0, Recommendation::Keep),
            (1000.0, Recommendation::Keep),
        ];
        for (score, expected) in cases {
            assert_eq!(recommend(score, &record, now), expected, "score {score}");
        }
    }

    #[test]
    fn engaged_scenario_scores_keep() {
        let (mut record, now) = aged_record(Duration::milliseconds(10_000));
        record.active_time = 40.0;
        record.click_count = 10.0;
        record.key_presses = 5.0;
        record.max_scroll_depth = 50.0;

        let score = crate::scoring::score(&record);
        assert_eq!(recommend(score, &record, now), Recommendation::Keep);
    }

    #[test]
    fn serializes_as_kebab_case() {
        let value = serde_json::to_value(Recommendation::NoData).expect("serialize");
        assert_eq!(value, serde_json::json!("no-data"));
        assert_eq!(Recommendation::Consider.to_string(), "consider");
    }
}
