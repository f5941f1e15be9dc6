// ⚖️ Conflict Resolver - Move a duplicate's selections without losing a score
//
// Precedence for a slot both entries hold:
//   duplicate scored, canonical empty  → delete canonical's, move duplicate's
//   duplicate scored, canonical scored → unresolvable, touch neither
//   duplicate empty                    → delete duplicate's
//
// Every store call is its own failure boundary. A failed call is recorded
// and the rest of the duplicate's selections are still processed.

use crate::classifier::{Classification, TakenSlots};
use crate::entities::Selection;
use crate::store::StoreGateway;
use tracing::{debug, warn};

// ============================================================================
// RESOLUTION (what happened to one duplicate)
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    pub moved_selections: usize,
    pub deleted_selections: usize,
    pub preserved_scores: usize,

    /// Slots where both entries hold scores
    pub unresolvable_conflicts: usize,

    pub errors: Vec<String>,
}

impl Resolution {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

// ============================================================================
// CONFLICT RESOLVER
// ============================================================================

pub struct ConflictResolver<'a, G: StoreGateway + ?Sized> {
    gateway: &'a G,
    canonical_id: &'a str,
}

impl<'a, G: StoreGateway + ?Sized> ConflictResolver<'a, G> {
    pub fn new(gateway: &'a G, canonical_id: &'a str) -> Self {
        ConflictResolver {
            gateway,
            canonical_id,
        }
    }

    /// Apply one duplicate's classification, keeping `taken` in step with the store
    pub fn resolve(
        &self,
        duplicate_id: &str,
        classification: Classification,
        taken: &mut TakenSlots,
    ) -> Resolution {
        let mut resolution = Resolution::default();

        for selection in classification.with_scores {
            self.resolve_scored(duplicate_id, selection, taken, &mut resolution);
        }

        self.delete_redundant(
            duplicate_id,
            classification.without_scores_conflicting,
            &mut resolution,
        );

        self.move_free(
            duplicate_id,
            classification.without_scores_free,
            taken,
            &mut resolution,
        );

        resolution
    }

    fn resolve_scored(
        &self,
        duplicate_id: &str,
        selection: Selection,
        taken: &mut TakenSlots,
        resolution: &mut Resolution,
    ) {
        let key = selection.collision_key();

        // Read first so a failed read mutates nothing
        let score_count = match self.gateway.get_score_count(&selection.id) {
            Ok(count) => count,
            Err(e) => {
                resolution.errors.push(format!(
                    "Entry {}: could not read scores of selection {} for round {}: {}",
                    duplicate_id, selection.id, key, e
                ));
                return;
            }
        };

        if let Some(existing) = taken.get(&key).cloned() {
            // Re-read right before deciding; a judge may have scored it since
            let existing_scores = match self.gateway.get_score_count(&existing.id) {
                Ok(count) => count,
                Err(e) => {
                    resolution.errors.push(format!(
                        "Entry {}: could not read scores of primary selection {} for round {}: {}",
                        duplicate_id, existing.id, key, e
                    ));
                    return;
                }
            };

            if existing_scores > 0 {
                warn!(
                    duplicate = %duplicate_id,
                    round = %key,
                    "scores on both entries, leaving both selections"
                );
                resolution.unresolvable_conflicts += 1;
                resolution.errors.push(format!(
                    "Entry {}: both entries have scores for round {}; selection {} not moved",
                    duplicate_id, key, selection.id
                ));
                return;
            }

            if let Err(e) = self.gateway.delete_selections(&[existing.id.clone()]) {
                resolution.errors.push(format!(
                    "Entry {}: could not delete empty primary selection {} for round {}: {}",
                    duplicate_id, existing.id, key, e
                ));
                return;
            }
            debug!(selection = %existing.id, round = %key, "deleted empty primary selection");
            resolution.deleted_selections += 1;
            taken.release(&key);
        }

        self.move_scored(duplicate_id, selection, score_count, taken, resolution);
    }

    fn move_scored(
        &self,
        duplicate_id: &str,
        mut selection: Selection,
        score_count: usize,
        taken: &mut TakenSlots,
        resolution: &mut Resolution,
    ) {
        match self
            .gateway
            .reassign_selection(&selection.id, self.canonical_id)
        {
            Ok(()) => {
                resolution.moved_selections += 1;
                resolution.preserved_scores += score_count;
                selection.entry_id = self.canonical_id.to_string();
                taken.claim(selection);
            }
            Err(e) => resolution.errors.push(format!(
                "Entry {}: could not move scored selection {} for round {}: {}",
                duplicate_id, selection.id, selection.round_id, e
            )),
        }
    }

    fn delete_redundant(
        &self,
        duplicate_id: &str,
        selections: Vec<Selection>,
        resolution: &mut Resolution,
    ) {
        if selections.is_empty() {
            return;
        }

        let ids: Vec<String> = selections.iter().map(|s| s.id.clone()).collect();

        // Anything scored since classification is no longer redundant
        let now_scored = match self.gateway.get_scores_for_selections(&ids) {
            Ok(set) => set,
            Err(e) => {
                resolution.errors.push(format!(
                    "Entry {}: could not re-check {} redundant selections: {}",
                    duplicate_id,
                    ids.len(),
                    e
                ));
                return;
            }
        };

        let mut to_delete = Vec::new();
        for selection in selections {
            if now_scored.contains(&selection.id) {
                resolution.errors.push(format!(
                    "Entry {}: selection {} for round {} was scored during the merge; left in place",
                    duplicate_id,
                    selection.id,
                    selection.collision_key()
                ));
            } else {
                to_delete.push(selection.id);
            }
        }

        if to_delete.is_empty() {
            return;
        }

        match self.gateway.delete_selections(&to_delete) {
            Ok(()) => resolution.deleted_selections += to_delete.len(),
            Err(e) => resolution.errors.push(format!(
                "Entry {}: could not delete {} redundant selections: {}",
                duplicate_id,
                to_delete.len(),
                e
            )),
        }
    }

    fn move_free(
        &self,
        duplicate_id: &str,
        selections: Vec<Selection>,
        taken: &mut TakenSlots,
        resolution: &mut Resolution,
    ) {
        if selections.is_empty() {
            return;
        }

        let ids: Vec<String> = selections.iter().map(|s| s.id.clone()).collect();

        match self.gateway.reassign_selections_bulk(&ids, self.canonical_id) {
            Ok(()) => {
                resolution.moved_selections += selections.len();
                for mut selection in selections {
                    selection.entry_id = self.canonical_id.to_string();
                    taken.claim(selection);
                }
            }
            Err(e) => {
                // Bulk is all-or-nothing; fall back to one call per selection
                warn!(
                    duplicate = %duplicate_id,
                    count = ids.len(),
                    error = %e,
                    "bulk move failed, retrying one at a time"
                );
                for mut selection in selections {
                    match self
                        .gateway
                        .reassign_selection(&selection.id, self.canonical_id)
                    {
                        Ok(()) => {
                            resolution.moved_selections += 1;
                            selection.entry_id = self.canonical_id.to_string();
                            taken.claim(selection);
                        }
                        Err(e) => resolution.errors.push(format!(
                            "Entry {}: could not move selection {} for round {}: {}",
                            duplicate_id, selection.id, selection.round_id, e
                        )),
                    }
                }
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
