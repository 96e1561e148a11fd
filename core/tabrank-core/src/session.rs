//! Session controller.
//!
//! Owns every piece of mutable session state (records, ranking, verdicts,
//! active tab, close candidates) and applies one event at a time. Each handler
//! runs to completion before the next one starts; callers that share the
//! controller across threads wrap it in a single lock.
//!
//! ```text
//! TabActivated           → credit time to previous tab, switch active tab
//! TabNavigationCompleted → reset activity baseline (active tab only)
//! ActivityReport         → merge → score → verdict → ranking → candidates
//! TabRemoved             → credit time, forget everything about the tab
//! UserAction             → close: ask host to close; keep: log only
//! ```
//!
//! The aggregate close list is pushed to the display only when it changes:
//! a tab joins or leaves it, or a listed tab reports a new title. It is shown
//! while non-empty and cleared when it empties.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::activity::{ActivityRecord, ActivityStore, ActivityUpdate};
use crate::config::TabRankConfig;
use crate::display::{CloseCandidate, DisplayBoundary};
use crate::error::{Result, TabRankError};
use crate::ranking::RankingHeap;
use crate::recommend::{
    recommend_with, Recommendation, RecommendationSnapshot, RecommendationThresholds,
};
use crate::scoring::{score_with, ScoringWeights};
use crate::types::{TabId, UserAction};

/// Process-wide session state.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub active_tab_id: Option<TabId>,
    pub last_active_time: DateTime<Utc>,
    pub close_candidates: BTreeSet<TabId>,
}

/// What an activity report produced, returned to the reporting probe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportOutcome {
    pub tab_id: TabId,
    pub score: f64,
    pub recommendation: Recommendation,
}

/// One row of the least-engaged view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedTab {
    pub tab_id: TabId,
    pub score: f64,
    pub title: Option<String>,
    pub recommendation: Option<Recommendation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub active_tab_id: Option<TabId>,
    pub tracked_tabs: usize,
    pub close_candidates: usize,
    pub least_engaged: Option<RankedTab>,
}

pub struct SessionController<D> {
    store: ActivityStore,
    ranking: RankingHeap,
    snapshots: HashMap<TabId, RecommendationSnapshot>,
    state: SessionState,
    weights: ScoringWeights,
    thresholds: RecommendationThresholds,
    untitled_label: String,
    display: D,
}

impl<D: DisplayBoundary> SessionController<D> {
    pub fn new(config: &TabRankConfig, display: D, now: DateTime<Utc>) -> Self {
        Self {
            store: ActivityStore::new(),
            ranking: RankingHeap::new(),
            snapshots: HashMap::new(),
            state: SessionState {
                active_tab_id: None,
                last_active_time: now,
                close_candidates: BTreeSet::new(),
            },
            weights: config.scoring,
            thresholds: config.recommendation,
            untitled_label: config.display.untitled_label.clone(),
            display,
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Inbound events
    // ─────────────────────────────────────────────────────────────────────

    pub fn tab_activated(&mut self, tab_id: TabId, now: DateTime<Utc>) {
        self.credit_time_spent(now);
        self.state.active_tab_id = Some(tab_id);
        self.state.last_active_time = now;
        self.track(tab_id);
        debug!(tab_id = %tab_id, "Tab activated");
    }

    /// A finished navigation is a fresh activity baseline; accumulated
    /// signals and score are kept.
    pub fn tab_navigation_completed(
        &mut self,
        tab_id: TabId,
        is_active_tab: bool,
        now: DateTime<Utc>,
    ) {
        // Adopt the host's view when we missed the activation.
        if is_active_tab && self.state.active_tab_id.is_none() {
            self.state.active_tab_id = Some(tab_id);
        }
        if self.state.active_tab_id == Some(tab_id) {
            self.state.last_active_time = now;
            debug!(tab_id = %tab_id, "Activity baseline reset after navigation");
        }
        self.track(tab_id);
    }

    pub fn tab_removed(&mut self, tab_id: TabId, now: DateTime<Utc>) {
        self.credit_time_spent(now);
        if self.state.active_tab_id == Some(tab_id) {
            self.state.active_tab_id = None;
        }

        self.store.remove(tab_id);
        self.snapshots.remove(&tab_id);
        self.ranking.remove(tab_id);
        let candidates_changed = self.state.close_candidates.remove(&tab_id);

        info!(
            tab_id = %tab_id,
            tracked = self.store.len(),
            candidates_changed,
            "Tab removed"
        );

        if candidates_changed {
            self.refresh_display();
        }
    }

    /// Applies a probe report. `sender` is the tab the report came from, when
    /// the host could tell; otherwise the report is attributed to the active tab.
    pub fn activity_report(
        &mut self,
        sender: Option<TabId>,
        update: &ActivityUpdate,
        now: DateTime<Utc>,
    ) -> Result<ReportOutcome> {
        let Some(tab_id) = sender.or(self.state.active_tab_id) else {
            warn!("Dropping activity report with no attributable tab");
            return Err(TabRankError::MissingTabId);
        };

        let previous_title = self
            .store
            .get(tab_id)
            .and_then(|record| record.tab_title.clone());
        self.store.upsert(tab_id, update);
        let score = self.rescore(tab_id);
        let recommendation = match self.store.get(tab_id) {
            Some(record) => recommend_with(score, record, now, &self.thresholds),
            None => Recommendation::NoData,
        };

        self.snapshots.insert(
            tab_id,
            RecommendationSnapshot {
                tab_id,
                score,
                recommendation,
                computed_at: now,
            },
        );

        let membership_changed = if recommendation == Recommendation::Close {
            self.state.close_candidates.insert(tab_id)
        } else {
            self.state.close_candidates.remove(&tab_id)
        };
        // A candidate the host is already showing may have been renamed.
        let title_changed = self.state.close_candidates.contains(&tab_id)
            && self
                .store
                .get(tab_id)
                .is_some_and(|record| record.tab_title != previous_title);
        let candidates_changed = membership_changed || title_changed;

        debug!(
            tab_id = %tab_id,
            score,
            recommendation = %recommendation,
            candidates = self.state.close_candidates.len(),
            "Activity report applied"
        );

        if candidates_changed {
            self.refresh_display();
        }

        Ok(ReportOutcome {
            tab_id,
            score,
            recommendation,
        })
    }

    pub fn user_action(&mut self, tab_id: TabId, action: UserAction) {
        match action {
            UserAction::Close => {
                info!(tab_id = %tab_id, "User chose to close tab");
                if let Err(err) = self.display.close_tab(tab_id) {
                    warn!(tab_id = %tab_id, error = %err, "Failed to request tab close");
                }
            }
            UserAction::Keep => {
                info!(tab_id = %tab_id, "User chose to keep tab");
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────

    pub fn last_recommendation(&self, tab_id: TabId) -> Option<&RecommendationSnapshot> {
        self.snapshots.get(&tab_id)
    }

    pub fn record(&self, tab_id: TabId) -> Option<&ActivityRecord> {
        self.store.get(tab_id)
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Tracked tabs, least engaged first.
    pub fn least_engaged(&self, limit: Option<usize>) -> Vec<RankedTab> {
        self.ranking
            .ascending(limit)
            .into_iter()
            .map(|entry| self.ranked_tab(entry.tab_id, entry.score))
            .collect()
    }

    pub fn peek_least_engaged(&self) -> Option<RankedTab> {
        self.ranking
            .peek_min()
            .map(|entry| self.ranked_tab(entry.tab_id, entry.score))
    }

    pub fn close_candidates(&self) -> Vec<CloseCandidate> {
        self.state
            .close_candidates
            .iter()
            .map(|&tab_id| CloseCandidate {
                tab_id,
                title: self
                    .store
                    .get(tab_id)
                    .and_then(|record| record.tab_title.clone())
                    .unwrap_or_else(|| self.untitled_label.clone()),
            })
            .collect()
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            active_tab_id: self.state.active_tab_id,
            tracked_tabs: self.store.len(),
            close_candidates: self.state.close_candidates.len(),
            least_engaged: self.peek_least_engaged(),
        }
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }

    // ─────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────

    /// Makes sure the tab has a record and a ranking entry.
    fn track(&mut self, tab_id: TabId) {
        if !self.ranking.contains(tab_id) {
            self.store.ensure(tab_id);
            self.rescore(tab_id);
        }
    }

    /// Recomputes the tab's score, caches it on the record and re-ranks it.
    fn rescore(&mut self, tab_id: TabId) -> f64 {
        let Some(record) = self.store.get_mut(tab_id) else {
            return 0.0;
        };
        let score = score_with(record, &self.weights);
        record.score = score;
        self.ranking.insert_or_update(tab_id, score);
        score
    }

    /// Credits the time since the last baseline to the active tab.
    fn credit_time_spent(&mut self, now: DateTime<Utc>) {
        if let Some(active) = self.state.active_tab_id {
            let elapsed_ms = now
                .signed_duration_since(self.state.last_active_time)
                .num_milliseconds()
                .max(0);
            self.store.ensure(active).time_spent += elapsed_ms as f64 / 1000.0;
            self.track(active);
        }
        self.state.last_active_time = now;
    }

    fn ranked_tab(&self, tab_id: TabId, score: f64) -> RankedTab {
        RankedTab {
            tab_id,
            score,
            title: self
                .store
                .get(tab_id)
                .and_then(|record| record.tab_title.clone()),
            recommendation: self
                .snapshots
                .get(&tab_id)
                .map(|snapshot| snapshot.recommendation),
        }
    }

    fn refresh_display(&mut self) {
        let candidates = self.close_candidates();
        let result = if candidates.is_empty() {
            self.display.clear_close_candidates()
        } else {
            self.display.show_close_candidates(&candidates)
        };

        match result {
            Ok(()) => debug!(candidates = candidates.len(), "Close candidates refreshed"),
            Err(err) => warn!(
                error = %err,
                candidates = candidates.len(),
                "Display refresh failed; state unchanged"
            ),
        }
    }
}
