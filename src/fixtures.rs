// Shared test helpers: seeded in-memory databases and a gateway that fails on demand

use crate::db::{self, setup_database};
use crate::entities::{DuplicateAction, DuplicateEntryRecord, Entry, EntryType, Score, Selection};
use crate::error::StoreError;
use crate::store::{SqliteStore, StoreGateway};
use rusqlite::{Connection, OptionalExtension};
use std::cell::RefCell;
use std::collections::HashSet;

pub const TRIAL: &str = "trial-1";

pub fn test_conn() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    setup_database(&conn).unwrap();
    conn
}

pub fn seed_entry(conn: &Connection, handler: &str, dog: &str, reg: &str) -> Entry {
    let entry = Entry::new(TRIAL, handler, dog, reg);
    db::insert_entry(conn, &entry).unwrap();
    entry
}

pub fn seed_selection(
    conn: &Connection,
    entry_id: &str,
    round_id: &str,
    entry_type: EntryType,
) -> Selection {
    let selection = Selection::new(entry_id, round_id, entry_type);
    db::insert_selection(conn, &selection).unwrap();
    selection
}

pub fn seed_score(conn: &Connection, selection_id: &str) -> Score {
    let score = Score::new(selection_id, "Judge Ames", 95.0);
    db::insert_score(conn, &score).unwrap();
    score
}

pub fn selection_owner(conn: &Connection, selection_id: &str) -> Option<String> {
    conn.query_row(
        "SELECT entry_id FROM entry_selections WHERE id = ?1",
        [selection_id],
        |row| row.get(0),
    )
    .optional()
    .unwrap()
}

pub fn entry_exists(conn: &Connection, entry_id: &str) -> bool {
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM entries WHERE id = ?1", [entry_id], |row| {
            row.get(0)
        })
        .unwrap();
    count > 0
}

pub fn selection_count(conn: &Connection, entry_id: &str) -> i64 {
    conn.query_row(
        "SELECT COUNT(*) FROM entry_selections WHERE entry_id = ?1",
        [entry_id],
        |row| row.get(0),
    )
    .unwrap()
}

/// True when no entry owns two selections with the same (round, entry type)
pub fn slots_unique(conn: &Connection) -> bool {
    let clashes: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM (
                SELECT entry_id, round_id, entry_type FROM entry_selections
                GROUP BY entry_id, round_id, entry_type HAVING COUNT(*) > 1
            )",
            [],
            |row| row.get(0),
        )
        .unwrap();
    clashes == 0
}

pub fn record(entry: &Entry, action: DuplicateAction) -> DuplicateEntryRecord {
    DuplicateEntryRecord {
        handler_name: entry.handler_name.clone(),
        dog_call_name: entry.dog_call_name.clone(),
        registration_number: entry.registration_number.clone(),
        entry_id: entry.id.clone(),
        submitted_at: Some(entry.submitted_at),
        selection_count: 0,
        score_count: 0,
        status_badge: action.badge().to_string(),
        action,
    }
}

// ============================================================================
// FAULT INJECTION
// ============================================================================

/// Delegates to SQLite except for calls touching a configured id
pub struct FlakyStore<'c> {
    inner: SqliteStore<'c>,
    fail_ids: HashSet<String>,
    pub calls: RefCell<Vec<String>>,
}

impl<'c> FlakyStore<'c> {
    pub fn new(conn: &'c Connection, fail_ids: &[&str]) -> Self {
        FlakyStore {
            inner: SqliteStore::new(conn),
            fail_ids: fail_ids.iter().map(|s| s.to_string()).collect(),
            calls: RefCell::new(Vec::new()),
        }
    }

    fn check(&self, op: &str, ids: &[&str]) -> Result<(), StoreError> {
        self.calls.borrow_mut().push(op.to_string());
        match ids.iter().find(|id| self.fail_ids.contains(**id)) {
            Some(id) => Err(StoreError::Unavailable(format!("{} failed for {}", op, id))),
            None => Ok(()),
        }
    }

    pub fn count_calls(&self, op: &str) -> usize {
        self.calls.borrow().iter().filter(|c| c.as_str() == op).count()
    }
}

fn as_strs(ids: &[String]) -> Vec<&str> {
    ids.iter().map(String::as_str).collect()
}

impl StoreGateway for FlakyStore<'_> {
    fn get_entry(&self, entry_id: &str) -> Result<Option<Entry>, StoreError> {
        self.check("get_entry", &[entry_id])?;
        self.inner.get_entry(entry_id)
    }

    fn get_selections(&self, entry_id: &str) -> Result<Vec<Selection>, StoreError> {
        self.check("get_selections", &[entry_id])?;
        self.inner.get_selections(entry_id)
    }

    fn get_score_count(&self, selection_id: &str) -> Result<usize, StoreError> {
        self.check("get_score_count", &[selection_id])?;
        self.inner.get_score_count(selection_id)
    }

    fn get_scores_for_selections(
        &self,
        selection_ids: &[String],
    ) -> Result<HashSet<String>, StoreError> {
        self.check("get_scores_for_selections", &as_strs(selection_ids))?;
        self.inner.get_scores_for_selections(selection_ids)
    }

    fn reassign_selection(
        &self,
        selection_id: &str,
        new_entry_id: &str,
    ) -> Result<(), StoreError> {
        self.check("reassign_selection", &[selection_id])?;
        self.inner.reassign_selection(selection_id, new_entry_id)
    }

    fn reassign_selections_bulk(
        &self,
        selection_ids: &[String],
        new_entry_id: &str,
    ) -> Result<(), StoreError> {
        self.check("reassign_selections_bulk", &as_strs(selection_ids))?;
        self.inner.reassign_selections_bulk(selection_ids, new_entry_id)
    }

    fn delete_selections(&self, selection_ids: &[String]) -> Result<(), StoreError> {
        self.check("delete_selections", &as_strs(selection_ids))?;
        self.inner.delete_selections(selection_ids)
    }

    fn delete_entry(&self, entry_id: &str) -> Result<(), StoreError> {
        self.check("delete_entry", &[entry_id])?;
        self.inner.delete_entry(entry_id)
    }
}
