// 🔎 Selection Classifier - Sort a duplicate's selections before merging
//
// Three buckets:
//   with_scores                - judge results attached, must survive
//   without_scores_conflicting - empty, canonical already holds the slot
//   without_scores_free        - empty, slot open on the canonical
//
// Scored selections are looked at first. Whatever slot a scored selection
// occupies ends up taken on the canonical (moved there, or blocked by a
// scored canonical selection), so empty selections for that slot are
// always redundant.

use crate::entities::{CollisionKey, Selection};
use std::collections::{HashMap, HashSet};

// ============================================================================
// TAKEN SLOTS (canonical's live view)
// ============================================================================

/// The canonical entry's selections keyed by collision key
///
/// Seeded once per group from the store and kept current by the resolver,
/// so collisions are never re-queried mid-loop.
#[derive(Debug, Clone, Default)]
pub struct TakenSlots {
    slots: HashMap<CollisionKey, Selection>,
}

impl TakenSlots {
    pub fn from_selections(selections: Vec<Selection>) -> Self {
        let mut slots = HashMap::new();
        for selection in selections {
            slots.entry(selection.collision_key()).or_insert(selection);
        }
        TakenSlots { slots }
    }

    pub fn get(&self, key: &CollisionKey) -> Option<&Selection> {
        self.slots.get(key)
    }

    pub fn contains(&self, key: &CollisionKey) -> bool {
        self.slots.contains_key(key)
    }

    /// Record that the canonical now owns this selection
    pub fn claim(&mut self, selection: Selection) {
        self.slots.insert(selection.collision_key(), selection);
    }

    /// Drop a slot after its selection was deleted
    pub fn release(&mut self, key: &CollisionKey) -> Option<Selection> {
        self.slots.remove(key)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

// ============================================================================
// CLASSIFICATION
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification {
    pub with_scores: Vec<Selection>,
    pub without_scores_conflicting: Vec<Selection>,
    pub without_scores_free: Vec<Selection>,
}

impl Classification {
    pub fn total(&self) -> usize {
        self.with_scores.len()
            + self.without_scores_conflicting.len()
            + self.without_scores_free.len()
    }
}

/// Partition one duplicate's selections against the canonical's slots
///
/// `scored` is the set of selection ids known to have at least one score.
pub fn classify(
    taken: &TakenSlots,
    duplicate: Vec<Selection>,
    scored: &HashSet<String>,
) -> Classification {
    let (with_scores, without_scores): (Vec<_>, Vec<_>) = duplicate
        .into_iter()
        .partition(|s| scored.contains(&s.id));

    // Slots that will be occupied once the scored selections are resolved
    let mut occupied: HashSet<CollisionKey> = with_scores
        .iter()
        .map(Selection::collision_key)
        .collect();

    let mut classification = Classification {
        with_scores,
        ..Default::default()
    };

    for selection in without_scores {
        let key = selection.collision_key();
        if taken.contains(&key) || occupied.contains(&key) {
            classification.without_scores_conflicting.push(selection);
        } else {
            occupied.insert(key);
            classification.without_scores_free.push(selection);
        }
    }

    classification
}

// ============================================================================
// TESTS
// ============================================================================
