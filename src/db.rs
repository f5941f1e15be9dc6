use crate::entities::{Entry, EntryType, Score, Selection, SelectionStatus};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Audit record for one merge mutation ("every change is an event")
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MergeEvent {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl MergeEvent {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

/// Entry plus what hangs off it, as the duplicate review table shows it
#[derive(Debug, Clone, PartialEq)]
pub struct EntrySummary {
    pub entry: Entry,
    pub selection_count: usize,
    pub score_count: usize,
}

/// Open (or create) a database file and make sure the schema exists
pub fn open_database(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)
        .with_context(|| format!("Failed to open database at {}", db_path.display()))?;

    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;
    setup_database(&conn)?;

    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // The store relies on these to refuse deleting rows that still own children
    conn.pragma_update(None, "foreign_keys", "ON")?;

    // ==========================================================================
    // Entries
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS entries (
            id TEXT PRIMARY KEY,
            trial_id TEXT NOT NULL,
            handler_name TEXT NOT NULL,
            dog_call_name TEXT NOT NULL,
            registration_number TEXT NOT NULL,
            submitted_at TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Entry selections (one per entry per round per entry type)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS entry_selections (
            id TEXT PRIMARY KEY,
            entry_id TEXT NOT NULL REFERENCES entries(id),
            round_id TEXT NOT NULL,
            entry_type TEXT NOT NULL CHECK (entry_type IN ('regular', 'feo')),
            status TEXT NOT NULL DEFAULT 'entered',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Scores
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS scores (
            id TEXT PRIMARY KEY,
            selection_id TEXT NOT NULL REFERENCES entry_selections(id),
            judge_name TEXT NOT NULL,
            result REAL NOT NULL,
            recorded_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Merge events (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS merge_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_selection_slot
         ON entry_selections(entry_id, round_id, entry_type)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_entries_trial ON entries(trial_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_scores_selection ON scores(selection_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_merge_events_entity ON merge_events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// WRITES (used by intake and by tests; the merge itself never inserts)
// ============================================================================

pub fn insert_entry(conn: &Connection, entry: &Entry) -> Result<()> {
    conn.execute(
        "INSERT INTO entries (
            id, trial_id, handler_name, dog_call_name, registration_number, submitted_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            entry.id,
            entry.trial_id,
            entry.handler_name,
            entry.dog_call_name,
            entry.registration_number,
            entry.submitted_at.to_rfc3339(),
        ],
    )
    .with_context(|| format!("Failed to insert entry {}", entry.id))?;

    Ok(())
}

pub fn insert_selection(conn: &Connection, selection: &Selection) -> Result<()> {
    conn.execute(
        "INSERT INTO entry_selections (id, entry_id, round_id, entry_type, status)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            selection.id,
            selection.entry_id,
            selection.round_id,
            selection.entry_type.as_str(),
            selection.status.as_str(),
        ],
    )
    .with_context(|| format!("Failed to insert selection {}", selection.id))?;

    Ok(())
}

pub fn insert_score(conn: &Connection, score: &Score) -> Result<()> {
    conn.execute(
        "INSERT INTO scores (id, selection_id, judge_name, result, recorded_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            score.id,
            score.selection_id,
            score.judge_name,
            score.result,
            score.recorded_at.to_rfc3339(),
        ],
    )
    .with_context(|| format!("Failed to insert score {}", score.id))?;

    Ok(())
}

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &MergeEvent) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO merge_events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            event.data.to_string(),
            event.actor,
        ],
    )?;

    Ok(())
}

// ============================================================================
// READS
// ============================================================================

/// Get events for a specific entity, newest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<MergeEvent>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM merge_events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY id DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(5)?;

            Ok(MergeEvent {
                event_id: row.get(0)?,
                timestamp: parse_timestamp(1, &timestamp_str)?,
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e))
                })?,
                actor: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

/// Every entry of a trial with its selection and score counts
pub fn get_entry_summaries(conn: &Connection, trial_id: &str) -> Result<Vec<EntrySummary>> {
    let mut stmt = conn.prepare(
        "SELECT e.id, e.trial_id, e.handler_name, e.dog_call_name,
                e.registration_number, e.submitted_at,
                (SELECT COUNT(*) FROM entry_selections s WHERE s.entry_id = e.id),
                (SELECT COUNT(*) FROM scores sc
                   JOIN entry_selections s ON sc.selection_id = s.id
                  WHERE s.entry_id = e.id)
         FROM entries e
         WHERE e.trial_id = ?1
         ORDER BY e.submitted_at, e.id",
    )?;

    let summaries = stmt
        .query_map([trial_id], |row| {
            let selection_count: i64 = row.get(6)?;
            let score_count: i64 = row.get(7)?;

            Ok(EntrySummary {
                entry: entry_from_row(row)?,
                selection_count: selection_count as usize,
                score_count: score_count as usize,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(summaries)
}

pub fn count_scores(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM scores", [], |row| row.get(0))?;

    Ok(count)
}

pub fn count_entries(conn: &Connection, trial_id: &str) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM entries WHERE trial_id = ?1",
        [trial_id],
        |row| row.get(0),
    )?;

    Ok(count)
}

// ============================================================================
// ROW DECODING
// ============================================================================

/// Columns 0..=5: id, trial_id, handler_name, dog_call_name, registration_number, submitted_at
pub(crate) fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<Entry> {
    let submitted_at: String = row.get(5)?;

    Ok(Entry {
        id: row.get(0)?,
        trial_id: row.get(1)?,
        handler_name: row.get(2)?,
        dog_call_name: row.get(3)?,
        registration_number: row.get(4)?,
        submitted_at: parse_timestamp(5, &submitted_at)?,
    })
}

/// Columns 0..=4: id, entry_id, round_id, entry_type, status
pub(crate) fn selection_from_row(row: &Row<'_>) -> rusqlite::Result<Selection> {
    let entry_type: String = row.get(3)?;
    let status: String = row.get(4)?;

    Ok(Selection {
        id: row.get(0)?,
        entry_id: row.get(1)?,
        round_id: row.get(2)?,
        entry_type: EntryType::parse(&entry_type)
            .ok_or_else(|| conversion_error(3, format!("unknown entry type '{}'", entry_type)))?,
        status: SelectionStatus::parse(&status)
            .ok_or_else(|| conversion_error(4, format!("unknown selection status '{}'", status)))?,
    })
}

fn parse_timestamp(column: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

fn conversion_error(column: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::EntryType;
    use crate::fixtures::test_conn;
    use tempfile::TempDir;

    #[test]
    fn test_setup_is_idempotent() {
        let conn = test_conn();
        setup_database(&conn).unwrap();

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('entries', 'entry_selections', 'scores', 'merge_events')",
                [],
                |row| row.get(0),
            )
            .unwrap();

        assert_eq!(tables, 4);
    }

    #[test]
    fn test_open_database_on_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trial.db");

        {
            let conn = open_database(&path).unwrap();
            insert_entry(&conn, &Entry::new("t1", "Pat Lee", "Scout", "DN1")).unwrap();
        }

        let conn = open_database(&path).unwrap();
        assert_eq!(count_entries(&conn, "t1").unwrap(), 1);
    }

    #[test]
    fn test_selection_slot_is_unique_per_entry() {
        let conn = test_conn();
        let entry = Entry::new("t1", "Pat Lee", "Scout", "DN1");
        insert_entry(&conn, &entry).unwrap();

        insert_selection(&conn, &Selection::new(&entry.id, "r1", EntryType::Regular)).unwrap();
        insert_selection(&conn, &Selection::new(&entry.id, "r1", EntryType::Feo)).unwrap();

        let again = insert_selection(&conn, &Selection::new(&entry.id, "r1", EntryType::Regular));
        assert!(again.is_err(), "second regular selection for r1 must be rejected");
    }

    #[test]
    fn test_scored_selection_cannot_be_deleted() {
        let conn = test_conn();
        let entry = Entry::new("t1", "Pat Lee", "Scout", "DN1");
        let selection = Selection::new(&entry.id, "r1", EntryType::Regular);
        insert_entry(&conn, &entry).unwrap();
        insert_selection(&conn, &selection).unwrap();
        insert_score(&conn, &Score::new(&selection.id, "Judge Ames", 98.5)).unwrap();

        let result = conn.execute("DELETE FROM entry_selections WHERE id = ?1", [&selection.id]);
        assert!(result.is_err(), "foreign key must protect scored selections");
        assert_eq!(count_scores(&conn).unwrap(), 1);
    }

    #[test]
    fn test_entry_summaries_count_children() {
        let conn = test_conn();
        let a = Entry::new("t1", "Pat Lee", "Scout", "DN1");
        let b = Entry::new("t1", "Pat Lee", "Scout", "DN1");
        let other_trial = Entry::new("t2", "Pat Lee", "Scout", "DN1");
        for e in [&a, &b, &other_trial] {
            insert_entry(&conn, e).unwrap();
        }

        let s1 = Selection::new(&a.id, "r1", EntryType::Regular);
        let s2 = Selection::new(&a.id, "r2", EntryType::Regular);
        insert_selection(&conn, &s1).unwrap();
        insert_selection(&conn, &s2).unwrap();
        insert_score(&conn, &Score::new(&s1.id, "Judge Ames", 100.0)).unwrap();

        let summaries = get_entry_summaries(&conn, "t1").unwrap();
        assert_eq!(summaries.len(), 2);

        let summary_a = summaries.iter().find(|s| s.entry.id == a.id).unwrap();
        assert_eq!(summary_a.selection_count, 2);
        assert_eq!(summary_a.score_count, 1);
        assert_eq!(summary_a.entry, a);

        let summary_b = summaries.iter().find(|s| s.entry.id == b.id).unwrap();
        assert_eq!(summary_b.selection_count, 0);
        assert_eq!(summary_b.score_count, 0);
    }

    #[test]
    fn test_event_log() {
        let conn = test_conn();

        let event = MergeEvent::new(
            "selection_reassigned",
            "selection",
            "sel-123",
            serde_json::json!({"to_entry": "e-1"}),
            "test_actor",
        );

        insert_event(&conn, &event).unwrap();

        let events = get_events_for_entity(&conn, "selection", "sel-123").unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "selection_reassigned");
        assert_eq!(events[0].data["to_entry"], "e-1");
        assert_eq!(events[0].actor, "test_actor");
    }
}
