use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::DateTime;
use rusqlite::{Connection, Row, params};

use crate::{
    error::StoreError,
    invariants::{Hostname, StatusCode},
    models::{LogRecord, StoredRecord},
};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS access_logs (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    remote_host     TEXT NOT NULL,
    remote_logname  TEXT NOT NULL,
    user            TEXT NOT NULL,
    time            TEXT NOT NULL,
    method          TEXT NOT NULL,
    path            TEXT NOT NULL,
    protocol        TEXT NOT NULL,
    status_code     INTEGER NOT NULL,
    bytes_sent      INTEGER NOT NULL,
    referer         TEXT,
    user_agent      TEXT,
    stored_at       DATETIME DEFAULT CURRENT_TIMESTAMP
)";

const INSERT: &str = "INSERT INTO access_logs (
    remote_host, remote_logname, user, time, method, path,
    protocol, status_code, bytes_sent, referer, user_agent
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)";

const SELECT: &str = "SELECT id, stored_at, remote_host, remote_logname, user, time, method,
    path, protocol, status_code, bytes_sent, referer, user_agent FROM access_logs";

/// Destination for parsed batches.
pub trait RecordSink: Send + Sync {
    /// Writes every record or none of them. Returns the number written.
    fn insert_batch(&self, records: &[LogRecord]) -> Result<usize, StoreError>;
}

/// SQLite-backed store. Each call acquires its own connection and releases it when the call returns.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    /// Opens (creating if needed) the database and its table.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let store = Self {
            path: path.as_ref().to_path_buf(),
        };
        store.connect()?.execute(SCHEMA, [])?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }

    /// All records in storage order.
    pub fn list_all(&self) -> Result<Vec<StoredRecord>, StoreError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!("{SELECT} ORDER BY id"))?;
        let rows = stmt.query_map([], read_row)?;
        rows.map(|row| row?).collect()
    }

    /// Records with the given status, in storage order.
    pub fn by_status(&self, status: StatusCode) -> Result<Vec<StoredRecord>, StoreError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!("{SELECT} WHERE status_code = ?1 ORDER BY id"))?;
        let rows = stmt.query_map(params![status.as_u16()], read_row)?;
        rows.map(|row| row?).collect()
    }
}

impl RecordSink for SqliteStore {
    fn insert_batch(&self, records: &[LogRecord]) -> Result<usize, StoreError> {
        let mut conn = self.connect()?;
        // Dropping the transaction without commit rolls the whole batch back.
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(INSERT)?;
            for record in records {
                stmt.execute(params![
                    record.remote_host.as_str(),
                    record.remote_logname,
                    record.user,
                    record.timestamp.to_rfc3339(),
                    record.method,
                    record.path,
                    record.protocol,
                    record.status.as_u16(),
                    record.bytes_sent,
                    record.referer,
                    record.user_agent,
                ])?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }
}

// Row decoding is two-staged: rusqlite errors for the column reads, then our own invariants.
fn read_row(row: &Row<'_>) -> rusqlite::Result<Result<StoredRecord, StoreError>> {
    let id: i64 = row.get("id")?;
    let time: String = row.get("time")?;
    let status: u16 = row.get("status_code")?;
    let host: String = row.get("remote_host")?;

    let invalid = |reason: String| StoreError::InvalidRow { id, reason };
    let timestamp = match DateTime::parse_from_rfc3339(&time) {
        Ok(ts) => ts,
        Err(e) => return Ok(Err(invalid(format!("time {time:?}: {e}")))),
    };
    let Some(status) = StatusCode::new(status) else {
        return Ok(Err(invalid(format!("status {status}"))));
    };
    let remote_host = match host.parse::<Hostname>() {
        Ok(host) => host,
        Err(e) => return Ok(Err(invalid(e.to_string()))),
    };

    Ok(Ok(StoredRecord {
        id,
        stored_at: row.get("stored_at")?,
        record: LogRecord {
            remote_host,
            remote_logname: row.get("remote_logname")?,
            user: row.get("user")?,
            timestamp,
            method: row.get("method")?,
            path: row.get("path")?,
            protocol: row.get("protocol")?,
            status,
            bytes_sent: row.get("bytes_sent")?,
            referer: row.get("referer")?,
            user_agent: row.get("user_agent")?,
        },
    }))
}
