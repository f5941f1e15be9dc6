// Entity Models - Entries, selections, scores and the duplicate records
// that describe what the merge should do with them

pub mod duplicate;
pub mod entry;
pub mod score;
pub mod selection;

// Re-export main types
pub use duplicate::{DuplicateAction, DuplicateEntryRecord};
pub use entry::{Entry, GroupKey};
pub use score::Score;
pub use selection::{CollisionKey, EntryType, Selection, SelectionStatus};
