// 🧾 Duplicate Entry Record - The caller's view of one candidate duplicate
//
// The action is decided once upstream (by the detector or the admin UI)
// and travels as a closed enum. The status badge is display text only;
// nothing in the merge reads it.

use super::entry::GroupKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// DUPLICATE ACTION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DuplicateAction {
    /// The canonical entry of its group
    #[serde(rename = "KEEP")]
    Keep,

    /// Duplicate with at least one scored selection
    #[serde(rename = "MERGE (has scores!)")]
    MergeHasScores,

    /// Duplicate with selections but no scores
    #[serde(rename = "MERGE (has selections)")]
    MergeHasSelections,

    /// Duplicate with nothing attached
    #[serde(rename = "DELETE (empty)")]
    DeleteEmpty,
}

impl DuplicateAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            DuplicateAction::Keep => "KEEP",
            DuplicateAction::MergeHasScores => "MERGE (has scores!)",
            DuplicateAction::MergeHasSelections => "MERGE (has selections)",
            DuplicateAction::DeleteEmpty => "DELETE (empty)",
        }
    }

    /// Badge shown next to the entry in the review table
    pub fn badge(&self) -> &'static str {
        match self {
            DuplicateAction::Keep => "✅ KEEP",
            DuplicateAction::MergeHasScores => "⚠️ MERGE",
            DuplicateAction::MergeHasSelections => "🔀 MERGE",
            DuplicateAction::DeleteEmpty => "🗑️ DELETE",
        }
    }

    /// Pick the action for a non-canonical entry from its attachments
    pub fn for_duplicate(selection_count: usize, score_count: usize) -> Self {
        if score_count > 0 {
            DuplicateAction::MergeHasScores
        } else if selection_count > 0 {
            DuplicateAction::MergeHasSelections
        } else {
            DuplicateAction::DeleteEmpty
        }
    }
}

// ============================================================================
// DUPLICATE ENTRY RECORD
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateEntryRecord {
    pub handler_name: String,
    pub dog_call_name: String,
    pub registration_number: String,
    pub entry_id: String,

    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,

    /// Counts as seen when the review table was built
    #[serde(default)]
    pub selection_count: usize,
    #[serde(default)]
    pub score_count: usize,

    #[serde(default)]
    pub status_badge: String,

    pub action: DuplicateAction,
}

impl DuplicateEntryRecord {
    pub fn group_key(&self, normalize: bool) -> GroupKey {
        if normalize {
            GroupKey::normalized(
                &self.handler_name,
                &self.dog_call_name,
                &self.registration_number,
            )
        } else {
            GroupKey::new(
                &self.handler_name,
                &self.dog_call_name,
                &self.registration_number,
            )
        }
    }

    pub fn is_keep(&self) -> bool {
        self.action == DuplicateAction::Keep
    }
}
