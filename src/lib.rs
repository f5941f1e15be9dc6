// Trial Entry Merge - Core Library
// Duplicate-entry reconciliation for dog-sport trials, used by the API server and tests

pub mod batch;
pub mod classifier;
pub mod config;
pub mod db;
pub mod detection;
pub mod entities;
pub mod error;
pub mod orchestrator;
pub mod resolver;
pub mod store;

#[cfg(test)]
pub(crate) mod fixtures;

// Re-export commonly used types
pub use batch::{group_records, BatchRunner, MergeRequest, MergeSummary};
pub use classifier::{classify, Classification, TakenSlots};
pub use config::{MergeOptions, ServerConfig};
pub use db::{
    get_entry_summaries, get_events_for_entity, insert_entry, insert_score, insert_selection,
    open_database, setup_database, EntrySummary, MergeEvent,
};
pub use detection::DuplicateDetector;
pub use entities::{
    CollisionKey, DuplicateAction, DuplicateEntryRecord, Entry, EntryType, GroupKey, Score,
    Selection, SelectionStatus,
};
pub use error::{InputError, StoreError};
pub use orchestrator::{GroupMergeOrchestrator, GroupReport, GroupState};
pub use resolver::{ConflictResolver, Resolution};
pub use store::{SqliteStore, StoreGateway};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
