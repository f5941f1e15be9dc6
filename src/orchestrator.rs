// 🔀 Group Merge Orchestrator - Fold one duplicate group into its primary entry
//
// Start → (no KEEP record)        → SkippedNoCanonical
//       → (several KEEP records)  → SkippedAmbiguousCanonical
//       → per duplicate: classify → resolve → drain check → delete entry
//       → Merged | PartiallyMerged
//
// A duplicate is deleted only after a fresh read shows it owns nothing.
// Failures reading the primary entry end the group with Err; every other
// store failure is recorded and the next duplicate is processed.

use crate::classifier::{classify, TakenSlots};
use crate::entities::{DuplicateAction, DuplicateEntryRecord, Entry, GroupKey};
use crate::error::StoreError;
use crate::resolver::{ConflictResolver, Resolution};
use crate::store::StoreGateway;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};

// ============================================================================
// GROUP STATE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupState {
    Start,

    /// Every duplicate folded in and removed
    Merged,

    /// At least one duplicate left behind or one step failed
    PartiallyMerged,

    SkippedNoCanonical,
    SkippedAmbiguousCanonical,

    /// Stopped by a store failure before any duplicate was touched
    Failed,
}

impl GroupState {
    pub fn is_skipped(&self) -> bool {
        matches!(
            self,
            GroupState::SkippedNoCanonical | GroupState::SkippedAmbiguousCanonical
        )
    }
}

// ============================================================================
// GROUP REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupReport {
    pub group_key: String,
    pub state: GroupState,
    pub canonical_entry_id: Option<String>,
    pub merged_entries: usize,
    pub deleted_entries: usize,
    pub moved_selections: usize,
    pub deleted_selections: usize,
    pub preserved_scores: usize,
    pub unresolvable_conflicts: usize,

    /// Duplicates that still own selections and were not deleted
    pub left_in_place: Vec<String>,

    pub errors: Vec<String>,
}

impl GroupReport {
    pub fn new(key: &GroupKey) -> Self {
        GroupReport {
            group_key: key.to_string(),
            state: GroupState::Start,
            canonical_entry_id: None,
            merged_entries: 0,
            deleted_entries: 0,
            moved_selections: 0,
            deleted_selections: 0,
            preserved_scores: 0,
            unresolvable_conflicts: 0,
            left_in_place: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn skip(mut self, state: GroupState, error: String) -> Self {
        warn!(group = %self.group_key, reason = %error, "group skipped");
        self.state = state;
        self.errors.push(error);
        self
    }

    fn absorb(&mut self, resolution: Resolution) {
        self.moved_selections += resolution.moved_selections;
        self.deleted_selections += resolution.deleted_selections;
        self.preserved_scores += resolution.preserved_scores;
        self.unresolvable_conflicts += resolution.unresolvable_conflicts;
        self.errors.extend(resolution.errors);
    }

    pub fn summary(&self) -> String {
        format!(
            "{}: {:?} | merged {}, deleted {}, moved {}, removed {} selections, {} scores kept, {} errors",
            self.group_key,
            self.state,
            self.merged_entries,
            self.deleted_entries,
            self.moved_selections,
            self.deleted_selections,
            self.preserved_scores,
            self.errors.len()
        )
    }
}

// ============================================================================
// ORCHESTRATOR
// ============================================================================

pub struct GroupMergeOrchestrator<'a, G: StoreGateway + ?Sized> {
    gateway: &'a G,
    trial_id: &'a str,
}

impl<'a, G: StoreGateway + ?Sized> GroupMergeOrchestrator<'a, G> {
    pub fn new(gateway: &'a G, trial_id: &'a str) -> Self {
        GroupMergeOrchestrator { gateway, trial_id }
    }

    /// Merge one group; `Err` means the group stopped before touching duplicates
    pub fn merge_group(
        &self,
        key: &GroupKey,
        records: &[DuplicateEntryRecord],
    ) -> Result<GroupReport, StoreError> {
        let mut report = GroupReport::new(key);

        let keeps: Vec<&DuplicateEntryRecord> = records.iter().filter(|r| r.is_keep()).collect();
        let keep = match keeps.as_slice() {
            [] => {
                return Ok(report.skip(
                    GroupState::SkippedNoCanonical,
                    format!("No primary entry for {}", key),
                ))
            }
            [keep] => *keep,
            _ => {
                return Ok(report.skip(
                    GroupState::SkippedAmbiguousCanonical,
                    format!("Multiple primary entries for {}", key),
                ))
            }
        };

        let canonical = match self.gateway.get_entry(&keep.entry_id)? {
            Some(entry) if entry.trial_id == self.trial_id => entry,
            Some(_) => {
                return Ok(report.skip(
                    GroupState::SkippedNoCanonical,
                    format!(
                        "Primary entry {} for {} belongs to another trial",
                        keep.entry_id, key
                    ),
                ))
            }
            None => {
                return Ok(report.skip(
                    GroupState::SkippedNoCanonical,
                    format!("Primary entry {} for {} not found", keep.entry_id, key),
                ))
            }
        };

        report.canonical_entry_id = Some(canonical.id.clone());
        let mut taken = TakenSlots::from_selections(self.gateway.get_selections(&canonical.id)?);

        info!(
            group = %key,
            canonical = %canonical.id,
            records = records.len(),
            slots = taken.len(),
            "merging group"
        );
        if taken.is_empty() {
            debug!(canonical = %canonical.id, "primary entry holds no selections yet");
        }

        let mut seen = HashSet::from([canonical.id.clone()]);
        for duplicate in records.iter().filter(|r| !r.is_keep()) {
            if !seen.insert(duplicate.entry_id.clone()) {
                continue;
            }
            self.merge_duplicate(&canonical, duplicate, &mut taken, &mut report);
        }

        report.state = if report.errors.is_empty() {
            GroupState::Merged
        } else {
            GroupState::PartiallyMerged
        };

        info!("{}", report.summary());
        Ok(report)
    }

    fn merge_duplicate(
        &self,
        canonical: &Entry,
        duplicate: &DuplicateEntryRecord,
        taken: &mut TakenSlots,
        report: &mut GroupReport,
    ) {
        let entry_id = duplicate.entry_id.as_str();

        match self.gateway.get_entry(entry_id) {
            Ok(Some(entry)) if entry.trial_id == self.trial_id => {}
            Ok(Some(_)) => {
                report.errors.push(format!(
                    "Entry {}: belongs to another trial, not merged",
                    entry_id
                ));
                return;
            }
            Ok(None) => {
                debug!(entry = %entry_id, "duplicate already removed");
                return;
            }
            Err(e) => {
                report
                    .errors
                    .push(format!("Entry {}: could not load entry: {}", entry_id, e));
                return;
            }
        }

        debug!(entry = %entry_id, action = duplicate.action.as_str(), "processing duplicate");

        if duplicate.action == DuplicateAction::DeleteEmpty {
            self.delete_entry(entry_id, report, false);
            return;
        }

        let selections = match self.gateway.get_selections(entry_id) {
            Ok(selections) => selections,
            Err(e) => {
                report
                    .errors
                    .push(format!("Entry {}: could not load selections: {}", entry_id, e));
                return;
            }
        };

        if selections.is_empty() {
            self.delete_entry(entry_id, report, false);
            return;
        }

        let ids: Vec<String> = selections.iter().map(|s| s.id.clone()).collect();
        let scored = match self.gateway.get_scores_for_selections(&ids) {
            Ok(scored) => scored,
            Err(e) => {
                report
                    .errors
                    .push(format!("Entry {}: could not load scores: {}", entry_id, e));
                return;
            }
        };

        let classification = classify(taken, selections, &scored);
        debug!(
            entry = %entry_id,
            total = classification.total(),
            scored = classification.with_scores.len(),
            redundant = classification.without_scores_conflicting.len(),
            free = classification.without_scores_free.len(),
            "classified duplicate selections"
        );

        let resolution =
            ConflictResolver::new(self.gateway, &canonical.id).resolve(entry_id, classification, taken);
        report.absorb(resolution);

        // Fresh read: only an entry that owns nothing may go
        match self.gateway.get_selections(entry_id) {
            Ok(remaining) if remaining.is_empty() => self.delete_entry(entry_id, report, true),
            Ok(remaining) => {
                warn!(entry = %entry_id, remaining = remaining.len(), "duplicate left in place");
                report.left_in_place.push(entry_id.to_string());
                report.errors.push(format!(
                    "Entry {}: not fully merged, {} selection(s) still attached",
                    entry_id,
                    remaining.len()
                ));
            }
            Err(e) => {
                report.left_in_place.push(entry_id.to_string());
                report.errors.push(format!(
                    "Entry {}: could not confirm it is empty, left in place: {}",
                    entry_id, e
                ));
            }
        }
    }

    fn delete_entry(&self, entry_id: &str, report: &mut GroupReport, merged: bool) {
        match self.gateway.delete_entry(entry_id) {
            Ok(()) if merged => report.merged_entries += 1,
            Ok(()) => report.deleted_entries += 1,
            Err(e) => {
                report.left_in_place.push(entry_id.to_string());
                report
                    .errors
                    .push(format!("Entry {}: could not delete entry: {}", entry_id, e));
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
