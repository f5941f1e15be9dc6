// 🎯 Selection Entity - One entry's registration for one scheduled round
//
// Invariant: at most one selection per (entry, round, entry type).
// A selection that owns scores may be re-pointed, never deleted.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ENTRY TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    /// Competing for qualifying scores
    Regular,

    /// For exhibition only
    Feo,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Regular => "regular",
            EntryType::Feo => "feo",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "regular" => Some(EntryType::Regular),
            "feo" => Some(EntryType::Feo),
            _ => None,
        }
    }
}

// ============================================================================
// SELECTION STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionStatus {
    Entered,
    Waitlisted,
    Scratched,
}

impl SelectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionStatus::Entered => "entered",
            SelectionStatus::Waitlisted => "waitlisted",
            SelectionStatus::Scratched => "scratched",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "entered" => Some(SelectionStatus::Entered),
            "waitlisted" => Some(SelectionStatus::Waitlisted),
            "scratched" => Some(SelectionStatus::Scratched),
            _ => None,
        }
    }
}

// ============================================================================
// SELECTION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub id: String,

    /// Owning entry - the only column the merge rewrites
    pub entry_id: String,

    /// Scheduled round (class / day / judge slot)
    pub round_id: String,

    pub entry_type: EntryType,
    pub status: SelectionStatus,
}

impl Selection {
    pub fn new(entry_id: &str, round_id: &str, entry_type: EntryType) -> Self {
        Selection {
            id: uuid::Uuid::new_v4().to_string(),
            entry_id: entry_id.to_string(),
            round_id: round_id.to_string(),
            entry_type,
            status: SelectionStatus::Entered,
        }
    }

    pub fn collision_key(&self) -> CollisionKey {
        CollisionKey {
            round_id: self.round_id.clone(),
            entry_type: self.entry_type,
        }
    }
}

// ============================================================================
// COLLISION KEY
// ============================================================================

/// Two selections of the same entry may never share this key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollisionKey {
    pub round_id: String,
    pub entry_type: EntryType,
}

impl fmt::Display for CollisionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.round_id, self.entry_type.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collision_key_separates_entry_types() {
        let regular = Selection::new("e1", "round-1", EntryType::Regular);
        let feo = Selection::new("e1", "round-1", EntryType::Feo);

        assert_ne!(regular.collision_key(), feo.collision_key());
        assert_eq!(regular.collision_key().to_string(), "round-1 (regular)");
    }

    #[test]
    fn test_enum_round_trip_through_column_text() {
        for t in [EntryType::Regular, EntryType::Feo] {
            assert_eq!(EntryType::parse(t.as_str()), Some(t));
        }
        for s in [
            SelectionStatus::Entered,
            SelectionStatus::Waitlisted,
            SelectionStatus::Scratched,
        ] {
            assert_eq!(SelectionStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(EntryType::parse("FEO"), None);
    }
}
