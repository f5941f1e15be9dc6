// 🗄️ Store Gateway - The only door between the merge and the database
//
// Reads and writes for entries, selections and scores. Every call can fail
// on its own; nothing spans calls, so callers must tolerate a sequence
// that stops halfway.

use crate::db::{self, MergeEvent};
use crate::entities::{Entry, Selection};
use crate::error::StoreError;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::collections::HashSet;

// ============================================================================
// GATEWAY CONTRACT
// ============================================================================

pub trait StoreGateway {
    fn get_entry(&self, entry_id: &str) -> Result<Option<Entry>, StoreError>;

    /// Selections owned by an entry
    fn get_selections(&self, entry_id: &str) -> Result<Vec<Selection>, StoreError>;

    fn get_score_count(&self, selection_id: &str) -> Result<usize, StoreError>;

    /// Which of the given selections have at least one score (one round trip)
    fn get_scores_for_selections(
        &self,
        selection_ids: &[String],
    ) -> Result<HashSet<String>, StoreError>;

    fn reassign_selection(&self, selection_id: &str, new_entry_id: &str)
        -> Result<(), StoreError>;

    fn reassign_selections_bulk(
        &self,
        selection_ids: &[String],
        new_entry_id: &str,
    ) -> Result<(), StoreError>;

    fn delete_selections(&self, selection_ids: &[String]) -> Result<(), StoreError>;

    fn delete_entry(&self, entry_id: &str) -> Result<(), StoreError>;
}

// ============================================================================
// SQLITE GATEWAY
// ============================================================================

/// Gateway over a borrowed SQLite connection
///
/// Bulk calls run inside one transaction each, so a single call either
/// applies to every id or to none. With an audit actor set, each mutation
/// also writes a `merge_events` row inside the same transaction.
pub struct SqliteStore<'c> {
    conn: &'c Connection,
    audit_actor: Option<String>,
}

impl<'c> SqliteStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        SqliteStore {
            conn,
            audit_actor: None,
        }
    }

    pub fn with_audit(conn: &'c Connection, actor: &str) -> Self {
        SqliteStore {
            conn,
            audit_actor: Some(actor.to_string()),
        }
    }

    fn audit(
        &self,
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
    ) -> Result<(), StoreError> {
        if let Some(actor) = &self.audit_actor {
            let event = MergeEvent::new(event_type, entity_type, entity_id, data, actor);
            db::insert_event(self.conn, &event)?;
        }
        Ok(())
    }
}

impl StoreGateway for SqliteStore<'_> {
    fn get_entry(&self, entry_id: &str) -> Result<Option<Entry>, StoreError> {
        let entry = self
            .conn
            .query_row(
                "SELECT id, trial_id, handler_name, dog_call_name, registration_number, submitted_at
                 FROM entries
                 WHERE id = ?1",
                [entry_id],
                db::entry_from_row,
            )
            .optional()?;

        Ok(entry)
    }

    fn get_selections(&self, entry_id: &str) -> Result<Vec<Selection>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, entry_id, round_id, entry_type, status
             FROM entry_selections
             WHERE entry_id = ?1
             ORDER BY created_at, id",
        )?;

        let selections = stmt
            .query_map([entry_id], db::selection_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(selections)
    }

    fn get_score_count(&self, selection_id: &str) -> Result<usize, StoreError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM scores WHERE selection_id = ?1",
            [selection_id],
            |row| row.get(0),
        )?;

        Ok(count as usize)
    }

    fn get_scores_for_selections(
        &self,
        selection_ids: &[String],
    ) -> Result<HashSet<String>, StoreError> {
        if selection_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let sql = format!(
            "SELECT DISTINCT selection_id FROM scores WHERE selection_id IN ({})",
            numbered_placeholders(1, selection_ids.len())
        );
        let mut stmt = self.conn.prepare(&sql)?;

        let scored = stmt
            .query_map(params_from_iter(selection_ids.iter()), |row| {
                row.get::<_, String>(0)
            })?
            .collect::<Result<HashSet<_>, _>>()?;

        Ok(scored)
    }

    fn reassign_selection(
        &self,
        selection_id: &str,
        new_entry_id: &str,
    ) -> Result<(), StoreError> {
        let tx = self.conn.unchecked_transaction()?;

        let changed = tx.execute(
            "UPDATE entry_selections SET entry_id = ?1 WHERE id = ?2",
            params![new_entry_id, selection_id],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("selection {}", selection_id)));
        }

        self.audit(
            "selection_reassigned",
            "selection",
            selection_id,
            serde_json::json!({ "to_entry": new_entry_id }),
        )?;

        tx.commit()?;
        Ok(())
    }

    fn reassign_selections_bulk(
        &self,
        selection_ids: &[String],
        new_entry_id: &str,
    ) -> Result<(), StoreError> {
        if selection_ids.is_empty() {
            return Ok(());
        }

        let tx = self.conn.unchecked_transaction()?;

        let sql = format!(
            "UPDATE entry_selections SET entry_id = ?1 WHERE id IN ({})",
            numbered_placeholders(2, selection_ids.len())
        );
        let changed = tx.execute(
            &sql,
            params_from_iter(
                std::iter::once(new_entry_id).chain(selection_ids.iter().map(String::as_str)),
            ),
        )?;

        // Dropping the transaction rolls the partial update back
        if changed != selection_ids.len() {
            return Err(StoreError::NotFound(format!(
                "{} of {} selections",
                selection_ids.len() - changed,
                selection_ids.len()
            )));
        }

        for id in selection_ids {
            self.audit(
                "selection_reassigned",
                "selection",
                id,
                serde_json::json!({ "to_entry": new_entry_id, "bulk": true }),
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn delete_selections(&self, selection_ids: &[String]) -> Result<(), StoreError> {
        if selection_ids.is_empty() {
            return Ok(());
        }

        let tx = self.conn.unchecked_transaction()?;

        let sql = format!(
            "DELETE FROM entry_selections WHERE id IN ({})",
            numbered_placeholders(1, selection_ids.len())
        );
        tx.execute(&sql, params_from_iter(selection_ids.iter()))?;

        for id in selection_ids {
            self.audit("selection_deleted", "selection", id, serde_json::json!({}))?;
        }

        tx.commit()?;
        Ok(())
    }

    fn delete_entry(&self, entry_id: &str) -> Result<(), StoreError> {
        let tx = self.conn.unchecked_transaction()?;

        let changed = tx.execute("DELETE FROM entries WHERE id = ?1", [entry_id])?;
        if changed > 0 {
            self.audit("entry_deleted", "entry", entry_id, serde_json::json!({}))?;
        }

        tx.commit()?;
        Ok(())
    }
}

/// "?start, ?start+1, ..." for `count` parameters
fn numbered_placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::EntryType;
    use crate::fixtures::*;

    #[test]
    fn test_placeholders() {
        assert_eq!(numbered_placeholders(1, 3), "?1, ?2, ?3");
        assert_eq!(numbered_placeholders(2, 1), "?2");
    }

    #[test]
    fn test_get_entry_and_selections() {
        let conn = test_conn();
        let entry = seed_entry(&conn, "Pat Lee", "Scout", "DN1");
        let r1 = seed_selection(&conn, &entry.id, "r1", EntryType::Regular);
        let r2 = seed_selection(&conn, &entry.id, "r2", EntryType::Feo);
        let store = SqliteStore::new(&conn);

        assert_eq!(store.get_entry(&entry.id).unwrap(), Some(entry.clone()));
        assert_eq!(store.get_entry("missing").unwrap(), None);

        let selections = store.get_selections(&entry.id).unwrap();
        let ids: HashSet<_> = selections.iter().map(|s| s.id.clone()).collect();
        assert_eq!(ids, HashSet::from([r1.id, r2.id]));
    }

    #[test]
    fn test_scores_for_selections_is_batched_lookup() {
        let conn = test_conn();
        let entry = seed_entry(&conn, "Pat Lee", "Scout", "DN1");
        let scored = seed_selection(&conn, &entry.id, "r1", EntryType::Regular);
        let empty = seed_selection(&conn, &entry.id, "r2", EntryType::Regular);
        seed_score(&conn, &scored.id);
        seed_score(&conn, &scored.id);
        let store = SqliteStore::new(&conn);

        let set = store
            .get_scores_for_selections(&[scored.id.clone(), empty.id.clone()])
            .unwrap();

        assert_eq!(set, HashSet::from([scored.id.clone()]));
        assert_eq!(store.get_score_count(&scored.id).unwrap(), 2);
        assert_eq!(store.get_score_count(&empty.id).unwrap(), 0);
        assert!(store.get_scores_for_selections(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_reassign_and_audit() {
        let conn = test_conn();
        let keep = seed_entry(&conn, "Pat Lee", "Scout", "DN1");
        let dup = seed_entry(&conn, "Pat Lee", "Scout", "DN1");
        let sel = seed_selection(&conn, &dup.id, "r1", EntryType::Regular);
        let store = SqliteStore::with_audit(&conn, "merge-test");

        store.reassign_selection(&sel.id, &keep.id).unwrap();

        assert_eq!(selection_owner(&conn, &sel.id).as_deref(), Some(keep.id.as_str()));
        let events = db::get_events_for_entity(&conn, "selection", &sel.id).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].actor, "merge-test");

        let missing = store.reassign_selection("nope", &keep.id);
        assert!(matches!(missing, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_bulk_reassign_is_all_or_nothing() {
        let conn = test_conn();
        let keep = seed_entry(&conn, "Pat Lee", "Scout", "DN1");
        let dup = seed_entry(&conn, "Pat Lee", "Scout", "DN1");
        let a = seed_selection(&conn, &dup.id, "r1", EntryType::Regular);
        let b = seed_selection(&conn, &dup.id, "r2", EntryType::Regular);
        let store = SqliteStore::new(&conn);

        let result = store.reassign_selections_bulk(&[a.id.clone(), "ghost".to_string()], &keep.id);
        assert!(result.is_err());
        assert_eq!(selection_owner(&conn, &a.id).as_deref(), Some(dup.id.as_str()));

        store
            .reassign_selections_bulk(&[a.id.clone(), b.id.clone()], &keep.id)
            .unwrap();
        assert_eq!(store.get_selections(&keep.id).unwrap().len(), 2);
        assert!(store.get_selections(&dup.id).unwrap().is_empty());
    }

    #[test]
    fn test_store_refuses_to_drop_owned_rows() {
        let conn = test_conn();
        let entry = seed_entry(&conn, "Pat Lee", "Scout", "DN1");
        let scored = seed_selection(&conn, &entry.id, "r1", EntryType::Regular);
        seed_score(&conn, &scored.id);
        let store = SqliteStore::new(&conn);

        assert!(store.delete_selections(&[scored.id.clone()]).is_err());
        assert!(store.delete_entry(&entry.id).is_err());
        assert_eq!(db::count_scores(&conn).unwrap(), 1);
        assert!(store.get_entry(&entry.id).unwrap().is_some());
    }

    #[test]
    fn test_delete_entry_twice_is_harmless() {
        let conn = test_conn();
        let entry = seed_entry(&conn, "Pat Lee", "Scout", "DN1");
        let store = SqliteStore::new(&conn);

        store.delete_entry(&entry.id).unwrap();
        store.delete_entry(&entry.id).unwrap();
        assert_eq!(store.get_entry(&entry.id).unwrap(), None);
    }
}
