//! Per-tab activity records.
//!
//! The store holds one [`ActivityRecord`] per tracked tab. Reports from the
//! in-page probe arrive as partial updates: every field is optional and a
//! missing field never clears a value observed earlier. Present fields win
//! (last write wins per field); the probe is authoritative for the numbers it
//! sends.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tabrank_daemon_protocol::ActivityPayload;

use crate::types::TabId;

/// Everything we know about one tab's engagement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub tab_id: TabId,
    /// When the probe first observed the tab. `None` until a report carries it.
    pub first_seen: Option<DateTime<Utc>>,
    pub active_time: f64,
    pub idle_time: f64,
    pub click_count: f64,
    pub key_presses: f64,
    /// High-water scroll percentage (0-100).
    pub max_scroll_depth: f64,
    pub tab_title: Option<String>,
    pub url: Option<String>,
    /// Foreground seconds attributed on tab switches. Not part of the score.
    pub time_spent: f64,
    /// Last computed engagement score.
    pub score: f64,
}

impl ActivityRecord {
    pub fn new(tab_id: TabId) -> Self {
        Self {
            tab_id,
            first_seen: None,
            active_time: 0.0,
            idle_time: 0.0,
            click_count: 0.0,
            key_presses: 0.0,
            max_scroll_depth: 0.0,
            tab_title: None,
            url: None,
            time_spent: 0.0,
            score: 0.0,
        }
    }

    /// True when no engagement signal has ever been recorded.
    ///
    /// Idle time is deliberately not an engagement signal.
    pub fn has_no_engagement(&self) -> bool {
        [
            self.active_time,
            self.click_count,
            self.key_presses,
            self.max_scroll_depth,
        ]
        .iter()
        .all(|value| is_unset(*value))
    }

    fn apply(&mut self, update: &ActivityUpdate) {
        if let Some(first_seen) = update.first_seen {
            self.first_seen = Some(first_seen);
        }
        merge(&mut self.active_time, update.active_time);
        merge(&mut self.idle_time, update.idle_time);
        merge(&mut self.click_count, update.click_count);
        merge(&mut self.key_presses, update.key_presses);
        merge(&mut self.max_scroll_depth, update.max_scroll_depth);
        if let Some(title) = &update.tab_title {
            self.tab_title = Some(title.clone());
        }
        if let Some(url) = &update.url {
            self.url = Some(url.clone());
        }
    }
}

fn merge(slot: &mut f64, value: Option<f64>) {
    if let Some(value) = value {
        *slot = value;
    }
}

/// Zero or NaN both mean "never observed".
fn is_unset(value: f64) -> bool {
    value == 0.0 || value.is_nan()
}

/// A partial report. `None` fields leave the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivityUpdate {
    pub first_seen: Option<DateTime<Utc>>,
    pub active_time: Option<f64>,
    pub idle_time: Option<f64>,
    pub click_count: Option<f64>,
    pub key_presses: Option<f64>,
    pub max_scroll_depth: Option<f64>,
    pub tab_title: Option<String>,
    pub url: Option<String>,
}

impl From<&ActivityPayload> for ActivityUpdate {
    fn from(payload: &ActivityPayload) -> Self {
        Self {
            first_seen: payload
                .first_seen
                .and_then(DateTime::<Utc>::from_timestamp_millis),
            active_time: payload.active_time,
            idle_time: payload.idle_time,
            click_count: payload.click_count,
            key_presses: payload.key_presses,
            max_scroll_depth: payload.max_scroll_depth,
            tab_title: non_empty(payload.tab_title.as_deref()),
            url: non_empty(payload.url.as_deref()),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// In-memory map of tab id to activity record.
#[derive(Debug, Default)]
pub struct ActivityStore {
    records: HashMap<TabId, ActivityRecord>,
}

impl ActivityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges `update` into the tab's record, creating the record if absent.
    pub fn upsert(&mut self, tab_id: TabId, update: &ActivityUpdate) -> &mut ActivityRecord {
        let record = self.ensure(tab_id);
        record.apply(update);
        record
    }

    /// Returns the tab's record, creating an empty one if absent.
    pub fn ensure(&mut self, tab_id: TabId) -> &mut ActivityRecord {
        self.records
            .entry(tab_id)
            .or_insert_with(|| ActivityRecord::new(tab_id))
    }

    pub fn get(&self, tab_id: TabId) -> Option<&ActivityRecord> {
        self.records.get(&tab_id)
    }

    pub fn get_mut(&mut self, tab_id: TabId) -> Option<&mut ActivityRecord> {
        self.records.get_mut(&tab_id)
    }

    pub fn remove(&mut self, tab_id: TabId) -> Option<ActivityRecord> {
        self.records.remove(&tab_id)
    }

    pub fn contains(&self, tab_id: TabId) -> bool {
        self.records.contains_key(&tab_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActivityRecord> {
        self.records.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update_with_clicks(clicks: f64) -> ActivityUpdate {
        ActivityUpdate {
            click_count: Some(clicks),
            ..ActivityUpdate::default()
        }
    }

    #[test]
    fn upsert_creates_missing_record() {
        let mut store = ActivityStore::new();
        let record = store.upsert(TabId(1), &update_with_clicks(3.0));
        assert_eq!(record.tab_id, TabId(1));
        assert_eq!(record.click_count, 3.0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn absent_fields_do_not_clear_previous_values() {
        let mut store = ActivityStore::new();
        store.upsert(
            TabId(1),
            &ActivityUpdate {
                tab_title: Some("Inbox".to_string()),
                url: Some("https://mail.example.com".to_string()),
                active_time: Some(12.0),
                ..ActivityUpdate::default()
            },
        );
        store.upsert(TabId(1), &update_with_clicks(4.0));

        let record = store.get(TabId(1)).expect("record");
        assert_eq!(record.tab_title.as_deref(), Some("Inbox"));
        assert_eq!(record.url.as_deref(), Some("https://mail.example.com"));
        assert_eq!(record.active_time, 12.0);
        assert_eq!(record.click_count, 4.0);
    }

    #[test]
    fn present_fields_overwrite() {
        let mut store = ActivityStore::new();
        store.upsert(TabId(1), &update_with_clicks(4.0));
        store.upsert(
            TabId(1),
            &ActivityUpdate {
                click_count: Some(2.0),
                tab_title: Some("Renamed".to_string()),
                ..ActivityUpdate::default()
            },
        );

        let record = store.get(TabId(1)).expect("record");
        assert_eq!(record.click_count, 2.0);
        assert_eq!(record.tab_title.as_deref(), Some("Renamed"));
    }

    #[test]
    fn remove_deletes_record() {
        let mut store = ActivityStore::new();
        store.ensure(TabId(9));
        assert!(store.remove(TabId(9)).is_some());
        assert!(store.get(TabId(9)).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn idle_time_is_not_engagement() {
        let mut record = ActivityRecord::new(TabId(1));
        record.idle_time = 90.0;
        assert!(record.has_no_engagement());
        record.max_scroll_depth = 1.0;
        assert!(!record.has_no_engagement());
    }

    #[test]
    fn payload_conversion_drops_blank_metadata() {
        let payload = ActivityPayload {
            first_seen: Some(1_700_000_000_000),
            tab_title: Some("   ".to_string()),
            url: Some("https://example.com".to_string()),
            ..ActivityPayload::default()
        };
        let update = ActivityUpdate::from(&payload);
        assert_eq!(update.tab_title, None);
        assert_eq!(update.url.as_deref(), Some("https://example.com"));
        assert_eq!(
            update.first_seen.map(|ts| ts.timestamp_millis()),
            Some(1_700_000_000_000)
        );
    }
}
