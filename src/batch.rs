// 📦 Batch Runner - Group the caller's records and merge each group in turn
//
// Groups never share state and never share fate: whatever happens inside
// one group ends up in the summary, and the next group runs regardless.

use crate::config::MergeOptions;
use crate::entities::{DuplicateEntryRecord, GroupKey};
use crate::error::InputError;
use crate::orchestrator::{GroupMergeOrchestrator, GroupReport, GroupState};
use crate::store::StoreGateway;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{error, info};

// ============================================================================
// REQUEST
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeRequest {
    #[serde(default)]
    pub trial_id: String,

    #[serde(default)]
    pub duplicates: Vec<DuplicateEntryRecord>,
}

impl MergeRequest {
    pub fn validate(&self) -> Result<(), InputError> {
        if self.trial_id.trim().is_empty() {
            return Err(InputError::MissingTrialId);
        }
        if self.duplicates.is_empty() {
            return Err(InputError::NoDuplicates);
        }
        if let Some(index) = self
            .duplicates
            .iter()
            .position(|r| r.entry_id.trim().is_empty())
        {
            return Err(InputError::MissingEntryId { index });
        }
        Ok(())
    }
}

// ============================================================================
// SUMMARY
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeSummary {
    pub success: bool,
    pub total_groups: usize,
    pub merged_entries: usize,
    pub deleted_entries: usize,
    pub moved_selections: usize,
    pub deleted_selections: usize,
    pub preserved_scores: usize,
    pub errors: Vec<String>,
    pub groups: Vec<GroupReport>,
}

impl MergeSummary {
    /// Summary for a request that never reached the groups
    pub fn rejected(error: &InputError) -> Self {
        MergeSummary {
            success: false,
            errors: vec![error.to_string()],
            ..Default::default()
        }
    }

    fn add(&mut self, report: GroupReport) {
        self.merged_entries += report.merged_entries;
        self.deleted_entries += report.deleted_entries;
        self.moved_selections += report.moved_selections;
        self.deleted_selections += report.deleted_selections;
        self.preserved_scores += report.preserved_scores;
        self.errors.extend(report.errors.iter().cloned());
        self.groups.push(report);
    }

    pub fn summary(&self) -> String {
        format!(
            "{} groups: {} merged, {} deleted, {} selections moved, {} removed, {} scores preserved, {} errors",
            self.total_groups,
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
// BATCH RUNNER
// ============================================================================

/// Bucket records by group key; groups come back in key order
pub fn group_records(
    records: &[DuplicateEntryRecord],
    normalize: bool,
) -> BTreeMap<GroupKey, Vec<DuplicateEntryRecord>> {
    let mut groups: BTreeMap<GroupKey, Vec<DuplicateEntryRecord>> = BTreeMap::new();
    for record in records {
        groups
            .entry(record.group_key(normalize))
            .or_default()
            .push(record.clone());
    }
    groups
}

pub struct BatchRunner<'a, G: StoreGateway + ?Sized> {
    gateway: &'a G,
    options: MergeOptions,
}

impl<'a, G: StoreGateway + ?Sized> BatchRunner<'a, G> {
    pub fn new(gateway: &'a G, options: MergeOptions) -> Self {
        BatchRunner { gateway, options }
    }

    /// Merge every group in the request; never fails, failures land in `errors`
    pub fn run(&self, request: &MergeRequest) -> MergeSummary {
        let groups = group_records(&request.duplicates, self.options.normalize_group_keys);
        let orchestrator = GroupMergeOrchestrator::new(self.gateway, &request.trial_id);

        let mut summary = MergeSummary {
            total_groups: groups.len(),
            ..Default::default()
        };

        info!(
            trial = %request.trial_id,
            groups = groups.len(),
            records = request.duplicates.len(),
            "starting duplicate merge"
        );

        for (key, records) in &groups {
            match orchestrator.merge_group(key, records) {
                Ok(report) => summary.add(report),
                Err(e) => {
                    error!(group = %key, error = %e, "group failed");
                    let mut report = GroupReport::new(key);
                    report.state = GroupState::Failed;
                    report.errors.push(format!("Group {}: {}", key, e));
                    summary.add(report);
                }
            }
        }

        summary.success = summary.errors.is_empty();
        info!("{}", summary.summary());
        summary
    }
}

// ============================================================================
// TESTS
// ============================================================================
