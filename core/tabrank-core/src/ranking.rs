//! Least-engaged-first ranking.
//!
//! A binary min-heap of `(tab, score)` entries plus a position index so a tab
//! can be found, rescored, or removed without scanning. Both paths that move an
//! arbitrary slot (rescore and removal) sift the slot up and then down: a
//! changed key can belong on either side of its old position.
//!
//! Invariants:
//! - every non-root entry scores ≥ its parent
//! - a tab appears at most once, and `positions[tab]` is its slot

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::TabId;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankEntry {
    pub tab_id: TabId,
    pub score: f64,
}

#[derive(Debug, Default, Clone)]
pub struct RankingHeap {
    entries: Vec<RankEntry>,
    positions: HashMap<TabId, usize>,
}

impl RankingHeap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts the tab, or rescores it in place if already present.
    pub fn insert_or_update(&mut self, tab_id: TabId, score: f64) {
        if let Some(&index) = self.positions.get(&tab_id) {
            self.entries[index].score = score;
            let index = self.sift_up(index);
            self.sift_down(index);
        } else {
            self.entries.push(RankEntry { tab_id, score });
            let index = self.entries.len() - 1;
            self.positions.insert(tab_id, index);
            self.sift_up(index);
        }
    }

    pub fn remove(&mut self, tab_id: TabId) -> Option<RankEntry> {
        let index = self.positions.remove(&tab_id)?;
        let last = self.entries.len() - 1;
        if index != last {
            self.entries.swap(index, last);
        }
        let removed = self.entries.pop()?;

        if index < self.entries.len() {
            let moved = self.entries[index].tab_id;
            self.positions.insert(moved, index);
            let index = self.sift_up(index);
            self.sift_down(index);
        }

        Some(removed)
    }

    pub fn peek_min(&self) -> Option<&RankEntry> {
        self.entries.first()
    }

    pub fn score_of(&self, tab_id: TabId) -> Option<f64> {
        self.positions
            .get(&tab_id)
            .map(|&index| self.entries[index].score)
    }

    pub fn contains(&self, tab_id: TabId) -> bool {
        self.positions.contains_key(&tab_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in ascending score order (ties by tab id), without touching the heap.
    pub fn ascending(&self, limit: Option<usize>) -> Vec<RankEntry> {
        let mut sorted = self.entries.clone();
        sorted.sort_by(|a, b| compare(a, b).then_with(|| a.tab_id.cmp(&b.tab_id)));
        if let Some(limit) = limit {
            sorted.truncate(limit);
        }
        sorted
    }

    /// Checks the heap order and the position index. Used by tests.
    pub fn is_consistent(&self) -> bool {
        let ordered = (1..self.entries.len()).all(|child| {
            let parent = (child - 1) / 2;
            compare(&self.entries[parent], &self.entries[child]) != Ordering::Greater
        });
        let indexed = self.positions.len() == self.entries.len()
            && self
                .entries
                .iter()
                .enumerate()
                .all(|(index, entry)| self.positions.get(&entry.tab_id) == Some(&index));
        ordered && indexed
    }

    fn sift_up(&mut self, mut index: usize) -> usize {
        while index > 0 {
            let parent = (index - 1) / 2;
            if compare(&self.entries[index], &self.entries[parent]) != Ordering::Less {
                break;
            }
            self.swap_slots(index, parent);
            index = parent;
        }
        index
    }

    fn sift_down(&mut self, mut index: usize) {
        let len = self.entries.len();
        loop {
            let left = 2 * index + 1;
            let right = left + 1;
            let mut smallest = index;

            if left < len && compare(&self.entries[left], &self.entries[smallest]) == Ordering::Less
            {
                smallest = left;
            }
            if right < len
                && compare(&self.entries[right], &self.entries[smallest]) == Ordering::Less
            {
                smallest = right;
            }
            if smallest == index {
                return;
            }
            self.swap_slots(index, smallest);
            index = smallest;
        }
    }

    fn swap_slots(&mut self, a: usize, b: usize) {
        self.entries.swap(a, b);
        self.positions.insert(self.entries[a].tab_id, a);
        self.positions.insert(self.entries[b].tab_id, b);
    }
}

fn compare(a: &RankEntry, b: &RankEntry) -> Ordering {
    a.score.total_cmp(&b.score)
}
