// 🐕 Entry Entity - One handler + dog registration for a trial
//
// Identity: entry id (never changes, selections point at it)
// Values: handler name, dog call name, registration number
//
// Duplicates share the same values under different identities. The merge
// keeps one identity and retires the rest.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ENTRY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    /// Stable identity - the foreign key every selection references
    pub id: String,

    /// Trial this entry was submitted to
    pub trial_id: String,

    pub handler_name: String,
    pub dog_call_name: String,
    pub registration_number: String,

    /// When the entry form was submitted
    pub submitted_at: DateTime<Utc>,
}

impl Entry {
    pub fn new(
        trial_id: &str,
        handler_name: &str,
        dog_call_name: &str,
        registration_number: &str,
    ) -> Self {
        Entry {
            id: uuid::Uuid::new_v4().to_string(),
            trial_id: trial_id.to_string(),
            handler_name: handler_name.to_string(),
            dog_call_name: dog_call_name.to_string(),
            registration_number: registration_number.to_string(),
            submitted_at: Utc::now(),
        }
    }

    /// Key under which this entry groups with its duplicates
    pub fn group_key(&self) -> GroupKey {
        GroupKey::new(
            &self.handler_name,
            &self.dog_call_name,
            &self.registration_number,
        )
    }
}

// ============================================================================
// GROUP KEY
// ============================================================================

/// (handler name, dog call name, registration number)
///
/// Exact string equality unless built through [`GroupKey::normalized`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupKey {
    pub handler_name: String,
    pub dog_call_name: String,
    pub registration_number: String,
}

impl GroupKey {
    pub fn new(handler_name: &str, dog_call_name: &str, registration_number: &str) -> Self {
        GroupKey {
            handler_name: handler_name.to_string(),
            dog_call_name: dog_call_name.to_string(),
            registration_number: registration_number.to_string(),
        }
    }

    /// Trimmed, case-folded, inner whitespace collapsed
    pub fn normalized(handler_name: &str, dog_call_name: &str, registration_number: &str) -> Self {
        GroupKey {
            handler_name: normalize_part(handler_name),
            dog_call_name: normalize_part(dog_call_name),
            registration_number: normalize_part(registration_number),
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} / {} / {}",
            self.handler_name, self.dog_call_name, self.registration_number
        )
    }
}

fn normalize_part(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

// ============================================================================
// TESTS
// ============================================================================
