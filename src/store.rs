use crate::aggregate::{FailureModeCount, count_failure_modes, has_failures};
use crate::TraceError;
use rusqlite::{Connection, OptionalExtension, params};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trace {
    pub id: i64,
    pub timestamp: String,
    pub user_query: String,
    pub bot_response: String,
    pub error: Option<String>,
    pub metadata: Option<String>,
    pub notes: String,
    pub failure_modes: String,
}

/// One row of the sidebar list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceSummary {
    pub id: i64,
    pub timestamp: String,
    pub user_query: String,
    pub has_failures: bool,
}

/// A trace as handed over by the chatbot logger.
#[derive(Debug, Clone, Default)]
pub struct NewTrace {
    pub user_query: String,
    pub bot_response: String,
    pub error: Option<String>,
    pub metadata: Option<String>,
}

pub trait TraceStore: Send + Sync {
    /// Every trace, newest first.
    fn list_traces(&self) -> Result<Vec<TraceSummary>, TraceError>;
    fn get_trace(&self, id: i64) -> Result<Option<Trace>, TraceError>;
    /// Overwrite notes and failure_modes. `Ok(false)` when the id is unknown.
    fn update_trace(&self, id: i64, notes: &str, failure_modes: &str) -> Result<bool, TraceError>;
    /// The trace listed directly above `id`, if any.
    fn next_trace_id(&self, id: i64) -> Result<Option<i64>, TraceError>;
    /// Full records, newest first.
    fn all_traces(&self) -> Result<Vec<Trace>, TraceError>;
}

pub trait ErrorAggregator: Send + Sync {
    fn failure_mode_counts(&self) -> Result<Vec<FailureModeCount>, TraceError>;
}

pub type DbHandle = Arc<Mutex<Connection>>;

#[derive(Clone)]
pub struct SqliteTraceStore {
    db: DbHandle,
}

const TRACE_COLUMNS: &str = "id, timestamp, user_query, bot_response, error, metadata,
     COALESCE(notes, ''), COALESCE(failure_modes, '')";

fn row_to_trace(row: &rusqlite::Row) -> rusqlite::Result<Trace> {
    Ok(Trace {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        user_query: row.get(2)?,
        bot_response: row.get(3)?,
        error: row.get(4)?,
        metadata: row.get(5)?,
        notes: row.get(6)?,
        failure_modes: row.get(7)?,
    })
}

fn lock_err<T>(e: std::sync::PoisonError<T>) -> TraceError {
    TraceError::Lock(format!("database handle: {e}"))
}

impl SqliteTraceStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
        }
    }

    pub fn from_handle(db: DbHandle) -> Self {
        Self { db }
    }

    pub fn insert_trace(&self, trace: &NewTrace) -> Result<i64, TraceError> {
        let db = self.db.lock().map_err(lock_err)?;
        db.execute(
            "INSERT INTO traces (user_query, bot_response, error, metadata) VALUES (?1, ?2, ?3, ?4)",
            params![trace.user_query, trace.bot_response, trace.error, trace.metadata],
        )?;
        Ok(db.last_insert_rowid())
    }
}

impl TraceStore for SqliteTraceStore {
    fn list_traces(&self) -> Result<Vec<TraceSummary>, TraceError> {
        let db = self.db.lock().map_err(lock_err)?;
        let mut stmt = db.prepare(
            "SELECT id, timestamp, user_query, COALESCE(failure_modes, '')
             FROM traces ORDER BY id DESC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                let failure_modes: String = row.get(3)?;
                Ok(TraceSummary {
                    id: row.get(0)?,
                    timestamp: row.get(1)?,
                    user_query: row.get(2)?,
                    has_failures: has_failures(&failure_modes),
                })
            })?
            .collect::<Result<_, _>>()?;
        Ok(rows)
    }

    fn get_trace(&self, id: i64) -> Result<Option<Trace>, TraceError> {
        let db = self.db.lock().map_err(lock_err)?;
        let trace = db
            .query_row(
                &format!("SELECT {TRACE_COLUMNS} FROM traces WHERE id = ?1"),
                params![id],
                row_to_trace,
            )
            .optional()?;
        Ok(trace)
    }

    fn update_trace(&self, id: i64, notes: &str, failure_modes: &str) -> Result<bool, TraceError> {
        let db = self.db.lock().map_err(lock_err)?;
        let updated = db.execute(
            "UPDATE traces SET notes = ?1, failure_modes = ?2 WHERE id = ?3",
            params![notes, failure_modes, id],
        )?;
        Ok(updated > 0)
    }

    fn next_trace_id(&self, id: i64) -> Result<Option<i64>, TraceError> {
        let db = self.db.lock().map_err(lock_err)?;
        // Unknown ids have no position in the list, hence no neighbour.
        let next: Option<i64> = db.query_row(
            "SELECT MIN(t.id) FROM traces t
             WHERE t.id > ?1 AND EXISTS (SELECT 1 FROM traces WHERE id = ?1)",
            params![id],
            |r| r.get(0),
        )?;
        Ok(next)
    }

    fn all_traces(&self) -> Result<Vec<Trace>, TraceError> {
        let db = self.db.lock().map_err(lock_err)?;
        let mut stmt = db.prepare(&format!("SELECT {TRACE_COLUMNS} FROM traces ORDER BY id DESC"))?;
        let rows = stmt
            .query_map([], row_to_trace)?
            .collect::<Result<_, _>>()?;
        Ok(rows)
    }
}

impl ErrorAggregator for SqliteTraceStore {
    fn failure_mode_counts(&self) -> Result<Vec<FailureModeCount>, TraceError> {
        let db = self.db.lock().map_err(lock_err)?;
        let mut stmt = db.prepare(
            "SELECT failure_modes FROM traces
             WHERE failure_modes IS NOT NULL AND failure_modes != ''
             ORDER BY id DESC",
        )?;
        let fields: Vec<String> = stmt
            .query_map([], |r| r.get(0))?
            .collect::<Result<_, _>>()?;
        Ok(count_failure_modes(fields.iter().map(String::as_str)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_db_in_memory;

    fn store_with(traces: &[(&str, &str)]) -> SqliteTraceStore {
        let store = SqliteTraceStore::new(open_db_in_memory().unwrap());
        for (q, r) in traces {
            store
                .insert_trace(&NewTrace {
                    user_query: (*q).into(),
                    bot_response: (*r).into(),
                    ..Default::default()
                })
                .unwrap();
        }
        store
    }

    #[test]
    fn list_is_newest_first() {
        let store = store_with(&[("first", "a"), ("second", "b"), ("third", "c")]);
        let list = store.list_traces().unwrap();
        let ids: Vec<i64> = list.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
        assert_eq!(list[0].user_query, "third");
        assert!(list.iter().all(|t| !t.has_failures));
    }

    #[test]
    fn get_missing_trace_is_none() {
        let store = store_with(&[("q", "r")]);
        assert!(store.get_trace(99).unwrap().is_none());
    }

    #[test]
    fn update_changes_only_annotations() {
        let store = store_with(&[("Quick vegan breakfast?", "Try oatmeal...")]);
        let before = store.get_trace(1).unwrap().unwrap();

        assert!(store
            .update_trace(1, "tastes bland", "missing_prep_detail,serving_size")
            .unwrap());
        let after = store.get_trace(1).unwrap().unwrap();

        assert_eq!(after.notes, "tastes bland");
        assert_eq!(after.failure_modes, "missing_prep_detail,serving_size");
        assert_eq!(
            Trace {
                notes: before.notes.clone(),
                failure_modes: before.failure_modes.clone(),
                ..after.clone()
            },
            before
        );

        // Saving the same values again yields the same record
        store
            .update_trace(1, "tastes bland", "missing_prep_detail,serving_size")
            .unwrap();
        assert_eq!(store.get_trace(1).unwrap().unwrap(), after);
    }

    #[test]
    fn update_missing_trace_reports_false() {
        let store = store_with(&[("q", "r")]);
        assert!(!store.update_trace(42, "n", "f").unwrap());
    }

    #[test]
    fn has_failures_follows_annotation() {
        let store = store_with(&[("q1", "r1"), ("q2", "r2")]);
        store.update_trace(1, "", "serving_size").unwrap();
        store.update_trace(2, "just notes", " , ").unwrap();
        let list = store.list_traces().unwrap();
        let by_id = |id| list.iter().find(|t| t.id == id).unwrap().has_failures;
        assert!(by_id(1));
        assert!(!by_id(2));
    }

    #[test]
    fn next_is_the_entry_listed_above() {
        let store = store_with(&[("a", "a"), ("b", "b"), ("c", "c")]);
        assert_eq!(store.next_trace_id(1).unwrap(), Some(2));
        assert_eq!(store.next_trace_id(2).unwrap(), Some(3));
        assert_eq!(store.next_trace_id(3).unwrap(), None);
        assert_eq!(store.next_trace_id(77).unwrap(), None);
    }

    #[test]
    fn next_skips_gaps() {
        let store = store_with(&[("a", "a"), ("b", "b"), ("c", "c")]);
        store
            .db
            .lock()
            .unwrap()
            .execute("DELETE FROM traces WHERE id = 2", [])
            .unwrap();
        assert_eq!(store.next_trace_id(1).unwrap(), Some(3));
    }

    #[test]
    fn null_annotations_read_as_empty() {
        let store = store_with(&[]);
        {
            let db = store.db.lock().unwrap();
            // Simulate a row written by an older logger with NULL annotations
            db.execute_batch(
                "CREATE TABLE legacy AS SELECT * FROM traces;
                 DROP TABLE traces;
                 CREATE TABLE traces (id INTEGER PRIMARY KEY, timestamp TEXT, user_query TEXT,
                     bot_response TEXT, error TEXT, metadata TEXT, notes TEXT, failure_modes TEXT);
                 INSERT INTO traces (id, timestamp, user_query, bot_response)
                     VALUES (1, '2025-06-01 10:00:00', 'q', 'r');",
            )
            .unwrap();
        }
        let trace = store.get_trace(1).unwrap().unwrap();
        assert_eq!(trace.notes, "");
        assert_eq!(trace.failure_modes, "");
        assert!(!store.list_traces().unwrap()[0].has_failures);
        assert!(store.failure_mode_counts().unwrap().is_empty());
    }

    #[test]
    fn counts_scan_newest_first() {
        let store = store_with(&[("a", "a"), ("b", "b"), ("c", "c")]);
        store.update_trace(1, "", "old_label,shared").unwrap();
        store.update_trace(3, "", "shared, new_label").unwrap();
        let counts = store.failure_mode_counts().unwrap();
        let labels: Vec<(&str, u64)> = counts.iter().map(|c| (c.label.as_str(), c.count)).collect();
        assert_eq!(labels, vec![("shared", 2), ("new_label", 1), ("old_label", 1)]);
    }

    #[test]
    fn insert_keeps_error_and_metadata() {
        let store = store_with(&[]);
        let id = store
            .insert_trace(&NewTrace {
                user_query: "q".into(),
                bot_response: String::new(),
                error: Some("rate limited".into()),
                metadata: Some(r#"{"model":"gpt-4o-mini"}"#.into()),
            })
            .unwrap();
        let trace = store.get_trace(id).unwrap().unwrap();
        assert_eq!(trace.error.as_deref(), Some("rate limited"));
        assert_eq!(trace.metadata.as_deref(), Some(r#"{"model":"gpt-4o-mini"}"#));
    }

    #[test]
    fn poisoned_handle_reports_lock_error() {
        let store = store_with(&[("q", "r")]);
        let handle = store.db.clone();
        let _ = std::thread::spawn(move || {
            let _guard = handle.lock().unwrap();
            panic!("writer died");
        })
        .join();
        assert!(matches!(store.list_traces(), Err(TraceError::Lock(_))));
        assert!(matches!(store.update_trace(1, "n", ""), Err(TraceError::Lock(_))));
    }
}
