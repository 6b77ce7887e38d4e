use crate::db::open_db_readonly;
use crate::store::{ErrorAggregator, SqliteTraceStore, TraceStore};
use crate::TraceError;
use std::path::Path;

pub fn handle_status(db_path: &Path) -> Result<(), TraceError> {
    if !db_path.exists() {
        eprintln!("tracereview: no database at {}", db_path.display());
        return Ok(());
    }

    // File sizes
    let db_size = std::fs::metadata(db_path)?.len();
    let wal_path = db_path.with_extension("db-wal");
    let wal_size = std::fs::metadata(&wal_path).map(|m| m.len()).ok();

    let conn = open_db_readonly(db_path)?;

    let total: i64 = conn.query_row("SELECT COUNT(*) FROM traces", [], |r| r.get(0))?;
    let annotated: i64 = conn.query_row(
        "SELECT COUNT(*) FROM traces
         WHERE COALESCE(notes, '') != '' OR COALESCE(failure_modes, '') != ''",
        [],
        |r| r.get(0),
    )?;
    let errored: i64 = conn.query_row(
        "SELECT COUNT(*) FROM traces WHERE COALESCE(error, '') != ''",
        [],
        |r| r.get(0),
    )?;
    let last: Option<String> = conn.query_row("SELECT MAX(timestamp) FROM traces", [], |r| r.get(0))?;

    let store = SqliteTraceStore::new(conn);
    let mut counts = store.failure_mode_counts()?;
    let with_failures = count_with_failures(&store)?;
    counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));

    match wal_size {
        Some(ws) => eprintln!("tracereview: database — {} (+{} WAL)", fmt_size(db_size), fmt_size(ws)),
        None => eprintln!("tracereview: database — {}", fmt_size(db_size)),
    }
    eprintln!("tracereview: traces — {total} ({annotated} annotated, {with_failures} with failure modes, {errored} errored)");

    if !counts.is_empty() {
        let parts: Vec<String> = counts
            .iter()
            .take(5)
            .map(|c| format!("{}: {}", c.label, c.count))
            .collect();
        eprintln!("tracereview: top failure modes — {}", parts.join(", "));
    }

    if let Some(ts) = last {
        eprintln!("tracereview: last trace — {ts}");
    }

    Ok(())
}

fn count_with_failures(store: &SqliteTraceStore) -> Result<usize, TraceError> {
    Ok(store
        .list_traces()?
        .iter()
        .filter(|t| t.has_failures)
        .count())
}

fn fmt_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
