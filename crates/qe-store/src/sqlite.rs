//! SQLite data store.
//!
//! A connection is opened for each statement and dropped when it finishes;
//! pooling is left to whoever fronts the engine.
use qe_core::config::DatabaseConfig;
use qe_core::Record;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::{ExecutionOutcome, QueryStore, StoreError};

pub struct SqliteStore {
    path: PathBuf,
    busy_timeout: Duration,
    read_only: bool,
}

impl SqliteStore {
    pub fn new(config: &DatabaseConfig) -> Self {
        Self {
            path: PathBuf::from(&config.path),
            busy_timeout: Duration::from_millis(config.busy_timeout_ms),
            read_only: config.read_only,
        }
    }

    pub fn open_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout: Duration::from_secs(30),
            read_only: true,
        }
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        let flags = if self.read_only {
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX
        } else {
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX
        };
        let conn = Connection::open_with_flags(&self.path, flags)?;
        conn.busy_timeout(self.busy_timeout)?;
        Ok(conn)
    }

    fn run(&self, sql: &str) -> Result<Vec<Record>, StoreError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(str::to_string).collect();
        if columns.is_empty() {
            return Err(StoreError::Unsupported(
                "statement returns no columns".to_string(),
            ));
        }

        let mut rows = stmt.query([])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Record::new();
            for (idx, column) in columns.iter().enumerate() {
                record.insert(column.clone(), to_json(row.get_ref(idx)?));
            }
            records.push(record);
        }
        Ok(records)
    }
}

impl QueryStore for SqliteStore {
    fn execute(&self, sql: &str) -> ExecutionOutcome {
        let start = Instant::now();
        match self.run(sql) {
            Ok(records) => {
                let elapsed = start.elapsed().as_secs_f64();
                tracing::info!(
                    records = records.len(),
                    "query executed in {:.1}ms",
                    elapsed * 1000.0
                );
                ExecutionOutcome::succeeded(records, elapsed)
            }
            Err(err) => {
                tracing::error!(error = %err, "database execution failed");
                ExecutionOutcome::failed(err.to_string(), start.elapsed().as_secs_f64())
            }
        }
    }
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => json!(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(bytes.iter().map(|b| format!("{:02x}", b)).collect()),
    }
}
