//! # tabrank-core
//!
//! Tab engagement engine: per-tab activity records, the engagement score, the
//! keep/consider/close policy, and a least-engaged-first ranking, all driven by
//! a single [`SessionController`].
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime dependency. Every handler runs to completion.
//! - **Not thread-safe**: Clients provide their own synchronization (`Mutex`).
//! - **Clock injected**: Handlers take `now` so behavior is reproducible in tests.
//! - **Boundary, not rendering**: Display work goes through [`DisplayBoundary`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tabrank_core::{OutboxDisplay, SessionController, TabId, TabRankConfig};
//!
//! let config = TabRankConfig::default();
//! let mut session = SessionController::new(&config, OutboxDisplay::new(256), chrono::Utc::now());
//! session.tab_activated(TabId(1), chrono::Utc::now());
//! let least = session.least_engaged(Some(5));
//! ```

pub mod activity;
pub mod config;
pub mod display;
pub mod error;
pub mod ranking;
pub mod recommend;
pub mod scoring;
pub mod session;
pub mod types;

pub use activity::{ActivityRecord, ActivityStore, ActivityUpdate};
pub use config::{default_config_path, load_config, tabrank_dir, TabRankConfig};
pub use display::{CloseCandidate, DisplayBoundary, DisplayCommand, DisplayConfig, OutboxDisplay};
pub use error::{Result, TabRankError};
pub use ranking::{RankEntry, RankingHeap};
pub use recommend::{
    recommend, recommend_with, Recommendation, RecommendationSnapshot, RecommendationThresholds,
};
pub use scoring::{score, score_with, ScoringWeights};
pub use session::{RankedTab, ReportOutcome, SessionController, SessionState, SessionSummary};
pub use types::{TabId, UserAction};
