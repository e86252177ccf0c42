use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use crate::invariants::{Hostname, StatusCode};

// Combined log format timestamp: 10/Oct/2023:13:55:36 -0700
pub const TS_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

/// One parsed line of a combined-format access log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogRecord {
    pub remote_host: Hostname,
    pub remote_logname: String,
    pub user: String,
    pub timestamp: DateTime<FixedOffset>,
    pub method: String,
    pub path: String,
    pub protocol: String,
    pub status: StatusCode,
    pub bytes_sent: u64,
    pub referer: Option<String>,
    pub user_agent: Option<String>,
}

/// A record as read back from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredRecord {
    pub id: i64,
    pub stored_at: String,
    #[serde(flatten)]
    pub record: LogRecord,
}

impl fmt::Display for LogRecord {
    /// Writes the record back out as one combined-format line.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} [{}] ",
            self.remote_host,
            self.remote_logname,
            self.user,
            self.timestamp.format(TS_FORMAT)
        )?;
        let request = format!("{} {} {}", self.method, self.path, self.protocol);
        write_quoted(f, Some(request.as_str()))?;
        write!(f, " {} {} ", self.status, self.bytes_sent)?;
        write_quoted(f, self.referer.as_deref())?;
        f.write_str(" ")?;
        write_quoted(f, self.user_agent.as_deref())
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, value: Option<&str>) -> fmt::Result {
    f.write_str("\"")?;
    match value {
        None => f.write_str("-")?,
        Some(v) => {
            for c in v.chars() {
                if c == '"' || c == '\\' {
                    f.write_str("\\")?;
                }
                write!(f, "{c}")?;
            }
        }
    }
    f.write_str("\"")
}
