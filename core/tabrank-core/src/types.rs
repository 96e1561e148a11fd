//! Shared identifiers and small value types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Host-assigned tab identifier.
///
/// Stable for the tab's lifetime and unique among live tabs. The value carries
/// no meaning beyond identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub u64);

impl TabId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for TabId {
    fn from(value: u64) -> Self {
        TabId(value)
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the user chose in response to a close suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserAction {
    Close,
    Keep,
}

impl From<tabrank_daemon_protocol::UserActionKind> for UserAction {
    fn from(kind: tabrank_daemon_protocol::UserActionKind) -> Self {
        match kind {
            tabrank_daemon_protocol::UserActionKind::Close => UserAction::Close,
            tabrank_daemon_protocol::UserActionKind::Keep => UserAction::Keep,
        }
    }
}
