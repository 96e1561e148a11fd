//! In-memory state managed by the daemon.
//!
//! One session controller behind one mutex. Every event and query takes the
//! lock for its whole duration, which gives the controller the run-to-completion
//! guarantee it relies on. Nothing is persisted; a restart starts a new session.
//!
//! Clients resend an event with the same `event_id` when a response is lost.
//! The daemon remembers the outcome of the most recent events and answers a
//! repeated id with the stored payload instead of applying it again.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tabrank_core::{
    ActivityUpdate, CloseCandidate, DisplayCommand, OutboxDisplay, RankedTab,
    RecommendationSnapshot, SessionController, SessionSummary, TabId, TabRankConfig, TabRankError,
    UserAction,
};
use tabrank_daemon_protocol::{ErrorInfo, EventEnvelope, EventType};

const RECENT_EVENT_CAPACITY: usize = 512;

pub struct SharedState {
    inner: Mutex<DaemonSession>,
}

struct DaemonSession {
    controller: SessionController<OutboxDisplay>,
    recent: RecentEvents,
}

/// Outcomes of the last applied events, keyed by event id, oldest evicted first.
struct RecentEvents {
    order: VecDeque<String>,
    outcomes: HashMap<String, Value>,
    capacity: usize,
}

impl RecentEvents {
    fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            outcomes: HashMap::with_capacity(capacity),
            capacity,
        }
    }

    fn get(&self, event_id: &str) -> Option<&Value> {
        self.outcomes.get(event_id)
    }

    fn remember(&mut self, event_id: &str, outcome: Value) {
        if self.outcomes.contains_key(event_id) {
            return;
        }
        while self.order.len() >= self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.outcomes.remove(&oldest);
                }
                None => break,
            }
        }
        self.order.push_back(event_id.to_string());
        self.outcomes.insert(event_id.to_string(), outcome);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub session: SessionSummary,
    pub pending_display_commands: usize,
}

impl SharedState {
    pub fn new(config: &TabRankConfig) -> Self {
        Self::with_recent_capacity(config, RECENT_EVENT_CAPACITY)
    }

    fn with_recent_capacity(config: &TabRankConfig, capacity: usize) -> Self {
        let display = OutboxDisplay::new(config.display.outbox_capacity);
        Self {
            inner: Mutex::new(DaemonSession {
                controller: SessionController::new(config, display, Utc::now()),
                recent: RecentEvents::new(capacity.max(1)),
            }),
        }
    }

    /// Applies one validated event and returns the payload for the response.
    ///
    /// A repeated `event_id` returns the payload of the first application.
    /// Rejected events are not remembered; they changed nothing.
    pub fn apply_event(&self, event: &EventEnvelope) -> Result<Value, ErrorInfo> {
        let mut guard = self.lock()?;

        if let Some(outcome) = guard.recent.get(&event.event_id) {
            tracing::debug!(event_id = %event.event_id, "Duplicate event ignored");
            return Ok(outcome.clone());
        }

        // Stamped under the lock so handlers see non-decreasing times.
        let now = Utc::now();
        let session = &mut guard.controller;
        let outcome = match event.event_type {
            EventType::TabActivated => {
                session.tab_activated(require_tab(event)?, now);
                accepted()
            }
            EventType::TabNavigationCompleted => {
                let is_active_tab = event.is_active_tab.unwrap_or(false);
                session.tab_navigation_completed(require_tab(event)?, is_active_tab, now);
                accepted()
            }
            EventType::TabRemoved => {
                session.tab_removed(require_tab(event)?, now);
                accepted()
            }
            EventType::UserAction => {
                let action = event
                    .action
                    .map(UserAction::from)
                    .ok_or_else(|| ErrorInfo::new("missing_field", "action is required"))?;
                session.user_action(require_tab(event)?, action);
                accepted()
            }
            EventType::ActivityReport => {
                let update = event
                    .activity
                    .as_ref()
                    .map(ActivityUpdate::from)
                    .unwrap_or_default();
                let outcome = session
                    .activity_report(event.tab_id.map(TabId), &update, now)
                    .map_err(|err| match err {
                        TabRankError::MissingTabId => {
                            ErrorInfo::new("missing_tab_id", err.to_string())
                        }
                        other => ErrorInfo::new("report_error", other.to_string()),
                    })?;
                to_value(&outcome, "report outcome")?
            }
        };

        guard.recent.remember(&event.event_id, outcome.clone());
        Ok(outcome)
    }

    pub fn last_recommendation(
        &self,
        tab_id: TabId,
    ) -> Result<Option<RecommendationSnapshot>, ErrorInfo> {
        Ok(self.lock()?.controller.last_recommendation(tab_id).cloned())
    }

    pub fn least_engaged(&self, limit: Option<usize>) -> Result<Vec<RankedTab>, ErrorInfo> {
        Ok(self.lock()?.controller.least_engaged(limit))
    }

    pub fn close_candidates(&self) -> Result<Vec<CloseCandidate>, ErrorInfo> {
        Ok(self.lock()?.controller.close_candidates())
    }

    pub fn drain_display_commands(&self) -> Result<Vec<DisplayCommand>, ErrorInfo> {
        Ok(self.lock()?.controller.display_mut().drain())
    }

    pub fn health_snapshot(&self) -> Result<HealthSnapshot, ErrorInfo> {
        let guard = self.lock()?;
        Ok(HealthSnapshot {
            session: guard.controller.summary(),
            pending_display_commands: guard.controller.display().pending(),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, DaemonSession>, ErrorInfo> {
        self.inner.lock().map_err(|_| {
            tracing::error!("Session state lock poisoned");
            ErrorInfo::new("state_unavailable", "session state lock poisoned")
        })
    }
}

fn require_tab(event: &EventEnvelope) -> Result<TabId, ErrorInfo> {
    event
        .tab_id
        .map(TabId)
        .ok_or_else(|| ErrorInfo::new("missing_tab_id", "tab_id is required"))
}

fn accepted() -> Value {
    serde_json::json!({ "accepted": true })
}

pub fn to_value<T: Serialize>(value: &T, label: &str) -> Result<Value, ErrorInfo> {
    serde_json::to_value(value).map_err(|err| {
        ErrorInfo::new(
            "serialization_error",
            format!("Failed to serialize {}: {}", label, err),
        )
    })
}
