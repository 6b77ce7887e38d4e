pub mod aggregate;
pub mod cli;
pub mod config;
pub mod content;
pub mod db;
pub mod export;
pub mod pyliteral;
pub mod record;
pub mod render;
pub mod schema;
pub mod server;
pub mod status;
pub mod store;
pub mod view;

#[derive(Debug)]
pub enum TraceError {
    Database(rusqlite::Error),
    Io(std::io::Error),
    Json(serde_json::Error),
    Csv(csv::Error),
    Config(String),
    InvalidTrace(String),
    Lock(String),
}

impl std::fmt::Display for TraceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TraceError::Database(e) => write!(f, "database: {e}"),
            TraceError::Io(e) => write!(f, "io: {e}"),
            TraceError::Json(e) => write!(f, "json: {e}"),
            TraceError::Csv(e) => write!(f, "csv: {e}"),
            TraceError::Config(msg) => write!(f, "config: {msg}"),
            TraceError::InvalidTrace(msg) => write!(f, "invalid trace: {msg}"),
            TraceError::Lock(msg) => write!(f, "lock poisoned: {msg}"),
        }
    }
}

impl std::error::Error for TraceError {}

impl From<rusqlite::Error> for TraceError {
    fn from(e: rusqlite::Error) -> Self {
        TraceError::Database(e)
    }
}

impl From<std::io::Error> for TraceError {
    fn from(e: std::io::Error) -> Self {
        TraceError::Io(e)
    }
}

impl From<serde_json::Error> for TraceError {
    fn from(e: serde_json::Error) -> Self {
        TraceError::Json(e)
    }
}

impl From<csv::Error> for TraceError {
    fn from(e: csv::Error) -> Self {
        TraceError::Csv(e)
    }
}

impl From<rusqlite_migration::Error> for TraceError {
    fn from(e: rusqlite_migration::Error) -> Self {
        match e {
            rusqlite_migration::Error::RusqliteError { query: _, err } => TraceError::Database(err),
            other => TraceError::Config(format!("migration: {other}")),
        }
    }
}

pub fn schema_migrations() -> &'static rusqlite_migration::Migrations<'static> {
    &schema::MIGRATIONS
}
