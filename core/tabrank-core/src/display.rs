//! Outbound display boundary.
//!
//! The controller never renders anything. It tells a [`DisplayBoundary`] when
//! the aggregate close list should be shown or cleared, and when the user asked
//! for a tab to be closed. Calls are fire-and-forget: the controller logs a
//! failure and moves on.
//!
//! [`OutboxDisplay`] is the implementation the daemon uses: commands are queued
//! for the host shim to drain and apply.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TabRankError};
use crate::types::TabId;

/// One row of the aggregate "tabs recommended to close" notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseCandidate {
    pub tab_id: TabId,
    pub title: String,
}

pub trait DisplayBoundary {
    fn show_close_candidates(&mut self, candidates: &[CloseCandidate]) -> Result<()>;

    fn clear_close_candidates(&mut self) -> Result<()>;

    /// Asks the host to close a tab.
    fn close_tab(&mut self, tab_id: TabId) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum DisplayCommand {
    ShowCloseCandidates { candidates: Vec<CloseCandidate> },
    ClearCloseCandidates,
    CloseTab { tab_id: TabId },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Maximum queued commands before new ones are rejected.
    pub outbox_capacity: usize,
    /// Title shown for candidates whose page never reported one.
    pub untitled_label: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            outbox_capacity: 256,
            untitled_label: "Untitled tab".to_string(),
        }
    }
}

/// Bounded queue of display commands.
#[derive(Debug)]
pub struct OutboxDisplay {
    queue: VecDeque<DisplayCommand>,
    capacity: usize,
}

impl OutboxDisplay {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            capacity,
        }
    }

    /// Removes and returns every queued command, oldest first.
    pub fn drain(&mut self) -> Vec<DisplayCommand> {
        self.queue.drain(..).collect()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// A newer list (or a clear) supersedes any list the shim has not picked up yet.
    fn drop_pending_lists(&mut self) {
        self.queue.retain(|command| {
            !matches!(
                command,
                DisplayCommand::ShowCloseCandidates { .. } | DisplayCommand::ClearCloseCandidates
            )
        });
    }

    fn push(&mut self, operation: &'static str, command: DisplayCommand) -> Result<()> {
        if self.queue.len() >= self.capacity {
            return Err(TabRankError::DisplayBoundary {
                operation,
                details: format!("outbox full ({} pending)", self.queue.len()),
            });
        }
        self.queue.push_back(command);
        Ok(())
    }
}

impl DisplayBoundary for OutboxDisplay {
    fn show_close_candidates(&mut self, candidates: &[CloseCandidate]) -> Result<()> {
        self.drop_pending_lists();
        self.push(
            "show_close_candidates",
            DisplayCommand::ShowCloseCandidates {
                candidates: candidates.to_vec(),
            },
        )
    }

    fn clear_close_candidates(&mut self) -> Result<()> {
        self.drop_pending_lists();
        self.push("clear_close_candidates", DisplayCommand::ClearCloseCandidates)
    }

    fn close_tab(&mut self, tab_id: TabId) -> Result<()> {
        self.push("close_tab", DisplayCommand::CloseTab { tab_id })
    }
}
