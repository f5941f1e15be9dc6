// 🔍 Duplicate Detection - Build the review list the merge endpoint consumes
//
// Entries of one trial that share (handler, dog, registration) form a group.
// In each group one entry is marked KEEP:
//   1. most scores        (scores are what we cannot afford to move twice)
//   2. most selections
//   3. earliest submission
// Everything else gets an action from what hangs off it.

use crate::db::{self, EntrySummary};
use crate::entities::{DuplicateAction, DuplicateEntryRecord, GroupKey};
use anyhow::Result;
use rusqlite::Connection;
use std::cmp::Ordering;
use std::collections::BTreeMap;

pub struct DuplicateDetector {
    /// Group on trimmed, case-folded keys
    pub normalize_keys: bool,
}

impl DuplicateDetector {
    pub fn new() -> Self {
        DuplicateDetector {
            normalize_keys: false,
        }
    }

    pub fn with_normalized_keys() -> Self {
        DuplicateDetector {
            normalize_keys: true,
        }
    }

    /// Load a trial's entries and return every entry that has a duplicate
    pub fn find_candidates(
        &self,
        conn: &Connection,
        trial_id: &str,
    ) -> Result<Vec<DuplicateEntryRecord>> {
        let summaries = db::get_entry_summaries(conn, trial_id)?;
        Ok(self.build_candidates(summaries))
    }

    /// Group summaries and tag each member of a multi-entry group
    pub fn build_candidates(&self, summaries: Vec<EntrySummary>) -> Vec<DuplicateEntryRecord> {
        let mut groups: BTreeMap<GroupKey, Vec<EntrySummary>> = BTreeMap::new();
        for summary in summaries {
            let key = self.key_for(&summary);
            groups.entry(key).or_default().push(summary);
        }

        let mut records = Vec::new();
        for (_, mut members) in groups {
            if members.len() < 2 {
                continue;
            }

            members.sort_by(keep_order);
            for (index, member) in members.into_iter().enumerate() {
                let action = if index == 0 {
                    DuplicateAction::Keep
                } else {
                    DuplicateAction::for_duplicate(member.selection_count, member.score_count)
                };
                records.push(to_record(member, action));
            }
        }

        records
    }

    fn key_for(&self, summary: &EntrySummary) -> GroupKey {
        let entry = &summary.entry;
        if self.normalize_keys {
            GroupKey::normalized(
                &entry.handler_name,
                &entry.dog_call_name,
                &entry.registration_number,
            )
        } else {
            entry.group_key()
        }
    }
}

impl Default for DuplicateDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Best keep candidate sorts first
fn keep_order(a: &EntrySummary, b: &EntrySummary) -> Ordering {
    b.score_count
        .cmp(&a.score_count)
        .then_with(|| b.selection_count.cmp(&a.selection_count))
        .then_with(|| a.entry.submitted_at.cmp(&b.entry.submitted_at))
        .then_with(|| a.entry.id.cmp(&b.entry.id))
}

fn to_record(summary: EntrySummary, action: DuplicateAction) -> DuplicateEntryRecord {
    let entry = summary.entry;
    DuplicateEntryRecord {
        handler_name: entry.handler_name,
        dog_call_name: entry.dog_call_name,
        registration_number: entry.registration_number,
        entry_id: entry.id,
        submitted_at: Some(entry.submitted_at),
        selection_count: summary.selection_count,
        score_count: summary.score_count,
        status_badge: action.badge().to_string(),
        action,
    }
}

// ============================================================================
// TESTS
// ============================================================================
