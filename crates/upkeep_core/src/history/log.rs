//! Bounded undo/redo log of whole-store snapshots.
//!
//! # Invariants
//! - `entries.len() <= capacity`; the oldest entry is evicted first.
//! - `current_index` is `None` exactly when the log is empty.
//! - Saving after an undo discards the redo branch.

use crate::model::new_record_id;
use crate::model::snapshot::{StoreRevision, StoreSnapshot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One named point in history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub description: String,
    pub snapshot: StoreSnapshot,
    /// Store revision at save time; enables the no-op check without a deep
    /// comparison.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<StoreRevision>,
}

/// Result of [`HistoryLog::save_state`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved { entry_id: String },
    /// Candidate equals the current entry; nothing recorded.
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptionRequired;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryLog {
    entries: Vec<HistoryEntry>,
    current_index: Option<usize>,
    #[serde(skip)]
    capacity: usize,
    #[serde(skip)]
    description_max_chars: usize,
}

impl HistoryLog {
    pub fn new(capacity: usize, description_max_chars: usize) -> Self {
        Self {
            entries: Vec::new(),
            current_index: None,
            capacity: capacity.max(1),
            description_max_chars,
        }
    }

    /// Parses a persisted log and re-establishes the invariants under the
    /// given limits.
    pub fn from_json(
        raw: &str,
        capacity: usize,
        description_max_chars: usize,
    ) -> Result<Self, serde_json::Error> {
        let mut log: HistoryLog = serde_json::from_str(raw)?;
        log.capacity = capacity.max(1);
        log.description_max_chars = description_max_chars;

        let overflow = log.entries.len().saturating_sub(log.capacity);
        log.entries.drain(..overflow);
        log.current_index = match (log.current_index, log.entries.len()) {
            (_, 0) => None,
            (Some(index), len) => Some(index.saturating_sub(overflow).min(len - 1)),
            (None, len) => Some(len - 1),
        };
        Ok(log)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn current(&self) -> Option<&HistoryEntry> {
        self.current_index.map(|index| &self.entries[index])
    }

    pub fn can_undo(&self) -> bool {
        self.current_index.is_some_and(|index| index > 0)
    }

    pub fn can_redo(&self) -> bool {
        self.current_index
            .is_some_and(|index| index + 1 < self.entries.len())
    }

    /// Records `snapshot` as the newest entry unless it equals the current
    /// one.
    ///
    /// Blank descriptions are refused; long ones are cut to the configured
    /// maximum.
    pub fn save_state(
        &mut self,
        snapshot: StoreSnapshot,
        revision: Option<StoreRevision>,
        description: &str,
        now: DateTime<Utc>,
    ) -> Result<SaveOutcome, DescriptionRequired> {
        let description = self.normalize_description(description)?;

        if let Some(current) = self.current() {
            let same_revision = current.revision.is_some() && current.revision == revision;
            if same_revision || current.snapshot.same_content(&snapshot) {
                return Ok(SaveOutcome::Unchanged);
            }
        }

        let keep = self.current_index.map_or(0, |index| index + 1);
        self.entries.truncate(keep);

        let entry_id = new_record_id();
        self.entries.push(HistoryEntry {
            id: entry_id.clone(),
            timestamp: now,
            description,
            snapshot,
            revision,
        });
        let overflow = self.entries.len().saturating_sub(self.capacity);
        self.entries.drain(..overflow);
        self.current_index = Some(self.entries.len() - 1);

        Ok(SaveOutcome::Saved { entry_id })
    }

    /// Steps back; `None` at the oldest entry.
    pub fn undo(&mut self) -> Option<&HistoryEntry> {
        let index = self.current_index.filter(|index| *index > 0)? - 1;
        self.current_index = Some(index);
        self.entries.get(index)
    }

    /// Steps forward; `None` at the newest entry.
    pub fn redo(&mut self) -> Option<&HistoryEntry> {
        let index = self.current_index? + 1;
        if index >= self.entries.len() {
            return None;
        }
        self.current_index = Some(index);
        self.entries.get(index)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.current_index = None;
    }

    fn normalize_description(&self, description: &str) -> Result<String, DescriptionRequired> {
        let trimmed = description.trim();
        if trimmed.is_empty() {
            return Err(DescriptionRequired);
        }
        Ok(trimmed.chars().take(self.description_max_chars).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::{HistoryLog, SaveOutcome};
    use crate::model::engineer::ServiceEngineer;
    use crate::model::snapshot::StoreSnapshot;
    use chrono::Utc;

    fn snapshot_with(engineers: usize) -> StoreSnapshot {
        StoreSnapshot {
            engineers: (0..engineers)
                .map(|i| ServiceEngineer {
                    id: i.to_string(),
                    name: format!("engineer {i}"),
                    phone: None,
                    email: None,
                    specialization: None,
                })
                .collect(),
            ..StoreSnapshot::default()
        }
    }

    #[test]
    fn blank_description_is_refused_and_long_one_truncated() {
        let mut log = HistoryLog::new(20, 200);
        assert!(log
            .save_state(snapshot_with(1), None, "   ", Utc::now())
            .is_err());

        let long = "x".repeat(250);
        log.save_state(snapshot_with(1), None, &long, Utc::now())
            .unwrap();
        assert_eq!(log.current().unwrap().description.chars().count(), 200);
    }

    #[test]
    fn new_save_after_undo_drops_redo_branch() {
        let mut log = HistoryLog::new(20, 200);
        for n in 1..=3 {
            log.save_state(snapshot_with(n), None, "step", Utc::now())
                .unwrap();
        }
        log.undo();
        log.undo();
        assert_eq!(log.current_index(), Some(0));

        let outcome = log
            .save_state(snapshot_with(9), None, "branch", Utc::now())
            .unwrap();
        assert!(matches!(outcome, SaveOutcome::Saved { .. }));
        assert_eq!(log.len(), 2);
        assert!(!log.can_redo());
    }

    #[test]
    fn restored_log_clamps_index_and_capacity() {
        let mut log = HistoryLog::new(5, 200);
        for n in 1..=5 {
            log.save_state(snapshot_with(n), None, "step", Utc::now())
                .unwrap();
        }
        let raw = log.to_json().unwrap();

        let restored = HistoryLog::from_json(&raw, 3, 200).unwrap();
        assert_eq!(restored.len(), 3);
        assert_eq!(restored.current_index(), Some(2));
        assert_eq!(restored.current().unwrap().snapshot.engineers.len(), 5);
    }
}
