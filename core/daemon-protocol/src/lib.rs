//! IPC protocol types and validation for tabrank-daemon.
//!
//! This crate is shared by the daemon and its clients to prevent schema drift.
//! The daemon remains the authority on validation, but clients can reuse the
//! same types to construct valid requests.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_REQUEST_BYTES: usize = 1024 * 1024; // 1MB

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum Method {
    GetHealth,
    Event,
    GetLastRecommendation,
    GetLeastEngaged,
    GetCloseCandidates,
    DrainDisplayCommands,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Request {
    pub protocol_version: u32,
    pub method: Method,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl Response {
    pub fn ok(id: Option<String>, data: Value) -> Self {
        Self {
            ok: true,
            id,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(id: Option<String>, code: &str, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            id,
            data: None,
            error: Some(ErrorInfo::new(code, message)),
        }
    }

    pub fn error_with_info(id: Option<String>, error: ErrorInfo) -> Self {
        Self {
            ok: false,
            id,
            data: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum EventType {
    TabActivated,
    TabNavigationCompleted,
    TabRemoved,
    ActivityReport,
    UserAction,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UserActionKind {
    Close,
    Keep,
}

/// Signal payload sent by the in-page probe.
///
/// Field names follow the probe's own JSON. Every field is optional; absent
/// fields never overwrite values the daemon already holds for the tab.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityPayload {
    /// Milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_seen: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub click_count: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_presses: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_scroll_depth: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EventEnvelope {
    pub event_id: String,
    pub recorded_at: String,
    pub event_type: EventType,
    /// For activity reports: the tab the probe reported from, when the host
    /// could attribute it.
    #[serde(default)]
    pub tab_id: Option<u64>,
    #[serde(default)]
    pub is_active_tab: Option<bool>,
    #[serde(default)]
    pub action: Option<UserActionKind>,
    #[serde(default)]
    pub activity: Option<ActivityPayload>,
}

impl EventEnvelope {
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        if self.event_id.trim().is_empty() {
            return Err(ErrorInfo::new("invalid_event_id", "event_id is required"));
        }
        if self.event_id.len() > 128 {
            return Err(ErrorInfo::new(
                "invalid_event_id",
                "event_id must be 128 characters or fewer",
            ));
        }

        if DateTime::parse_from_rfc3339(&self.recorded_at).is_err() {
            return Err(ErrorInfo::new(
                "invalid_timestamp",
                "recorded_at must be RFC3339",
            ));
        }

        match self.event_type {
            EventType::TabActivated | EventType::TabRemoved => {
                require_tab_id(&self.tab_id)?;
            }
            EventType::TabNavigationCompleted => {
                require_tab_id(&self.tab_id)?;
                require_field(&self.is_active_tab, "is_active_tab")?;
            }
            EventType::UserAction => {
                require_tab_id(&self.tab_id)?;
                require_field(&self.action, "action")?;
            }
            // The tab may be unattributed here; the daemon falls back to the
            // active tab and rejects the report if that is unknown too.
            EventType::ActivityReport => {
                require_field(&self.activity, "activity")?;
            }
        }

        Ok(())
    }
}

pub fn parse_event(params: Value) -> Result<EventEnvelope, ErrorInfo> {
    let envelope: EventEnvelope = serde_json::from_value(params).map_err(|err| {
        ErrorInfo::new(
            "invalid_params",
            format!("event payload is invalid JSON: {}", err),
        )
    })?;
    envelope.validate()?;
    Ok(envelope)
}

/// Parameters for queries scoped to a single tab.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TabQuery {
    pub tab_id: u64,
}

pub fn parse_tab_query(params: Value) -> Result<TabQuery, ErrorInfo> {
    serde_json::from_value(params).map_err(|err| {
        ErrorInfo::new(
            "invalid_params",
            format!("tab query params are invalid: {}", err),
        )
    })
}

fn require_tab_id(tab_id: &Option<u64>) -> Result<(), ErrorInfo> {
    match tab_id {
        Some(_) => Ok(()),
        None => Err(ErrorInfo::new("missing_tab_id", "tab_id is required")),
    }
}

fn require_field<T>(value: &Option<T>, field: &str) -> Result<(), ErrorInfo> {
    match value {
        Some(_) => Ok(()),
        None => Err(ErrorInfo::new(
            "missing_field",
            format!("{} is required", field),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_event(event_type: EventType) -> EventEnvelope {
        EventEnvelope {
            event_id: "evt-1".to_string(),
            recorded_at: "2026-01-30T12:00:00Z".to_string(),
            event_type,
            tab_id: Some(7),
            is_active_tab: None,
            action: None,
            activity: None,
        }
    }

    #[test]
    fn validates_lifecycle_event() {
        let event = base_event(EventType::TabActivated);
        assert!(event.validate().is_ok());
    }

    #[test]
    fn rejects_missing_tab_id_on_removal() {
        let mut event = base_event(EventType::TabRemoved);
        event.tab_id = None;
        let err = event.validate().unwrap_err();
        assert_eq!(err.code, "missing_tab_id");
    }

    #[test]
    fn navigation_requires_active_flag() {
        let event = base_event(EventType::TabNavigationCompleted);
        assert!(event.validate().is_err());
    }

    #[test]
    fn user_action_requires_action() {
        let mut event = base_event(EventType::UserAction);
        assert!(event.validate().is_err());
        event.action = Some(UserActionKind::Close);
        assert!(event.validate().is_ok());
    }

    #[test]
    fn activity_report_allows_unattributed_tab() {
        let mut event = base_event(EventType::ActivityReport);
        event.tab_id = None;
        event.activity = Some(ActivityPayload::default());
        assert!(event.validate().is_ok());
    }

    #[test]
    fn activity_report_requires_payload() {
        let event = base_event(EventType::ActivityReport);
        assert!(event.validate().is_err());
    }

    #[test]
    fn rejects_bad_timestamp() {
        let mut event = base_event(EventType::TabRemoved);
        event.recorded_at = "not-a-time".to_string();
        assert!(event.validate().is_err());
    }

    #[test]
    fn rejects_long_event_id() {
        let mut event = base_event(EventType::TabRemoved);
        event.event_id = "a".repeat(256);
        assert!(event.validate().is_err());
    }

    #[test]
    fn activity_payload_reads_probe_field_names() {
        let payload: ActivityPayload = serde_json::from_value(serde_json::json!({
            "firstSeen": 1_700_000_000_000i64,
            "activeTime": 12,
            "idleTime": 3,
            "clickCount": 4,
            "keyPresses": 9,
            "maxScrollDepth": 55.5,
            "tabTitle": "Docs",
        }))
        .expect("payload");

        assert_eq!(payload.first_seen, Some(1_700_000_000_000));
        assert_eq!(payload.active_time, Some(12.0));
        assert_eq!(payload.max_scroll_depth, Some(55.5));
        assert_eq!(payload.tab_title.as_deref(), Some("Docs"));
        assert_eq!(payload.url, None);
    }

    #[test]
    fn parse_event_rejects_unknown_fields() {
        let err = parse_event(serde_json::json!({
            "event_id": "evt-1",
            "recorded_at": "2026-01-30T12:00:00Z",
            "event_type": "tab_removed",
            "tab_id": 3,
            "bogus": true,
        }))
        .unwrap_err();
        assert_eq!(err.code, "invalid_params");
    }
}
