use rusqlite_migration::{M, Migrations};
use std::sync::LazyLock;

pub static MIGRATIONS: LazyLock<Migrations<'static>> = LazyLock::new(|| {
    Migrations::new(vec![
        M::up(
            "
CREATE TABLE traces (
    id            INTEGER PRIMARY KEY,
    timestamp     TEXT NOT NULL DEFAULT (datetime('now')),
    user_query    TEXT NOT NULL,
    bot_response  TEXT NOT NULL,
    error         TEXT,
    metadata      TEXT,
    notes         TEXT NOT NULL DEFAULT '',
    failure_modes TEXT NOT NULL DEFAULT ''
);
",
        ),
        M::up("CREATE INDEX idx_traces_failures ON traces(id) WHERE failure_modes != '';"),
    ])
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_valid() {
        assert!(crate::schema_migrations().validate().is_ok());
    }

    #[test]
    fn migrations_apply_to_memory_db() {
        let mut conn = rusqlite::Connection::open_in_memory().unwrap();
        MIGRATIONS.to_latest(&mut conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |r| r.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert!(tables.contains(&"traces".into()));

        let indexes: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='index' ORDER BY name")
            .unwrap()
            .query_map([], |r| r.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert!(indexes.contains(&"idx_traces_failures".into()));
    }

    #[test]
    fn annotation_columns_default_to_empty() {
        let mut conn = rusqlite::Connection::open_in_memory().unwrap();
        MIGRATIONS.to_latest(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO traces (user_query, bot_response) VALUES ('q', 'r')",
            [],
        )
        .unwrap();

        let (notes, modes, ts): (String, String, String) = conn
            .query_row(
                "SELECT notes, failure_modes, timestamp FROM traces",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .unwrap();
        assert_eq!(notes, "");
        assert_eq!(modes, "");
        assert_eq!(ts.len(), "2025-01-01 00:00:00".len());
    }
}
