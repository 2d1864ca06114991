use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::error::Result;

pub const LOG_HEADERS: [&str; 8] = [
    "ts",
    "query",
    "answer",
    "fallback",
    "latency_ms",
    "score",
    "reasoning",
    "ids",
];

/// One completed query cycle. Field order matches [`LOG_HEADERS`].
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub ts: DateTime<Utc>,
    pub query: String,
    pub answer: String,
    pub fallback: bool,
    pub latency_ms: u64,
    pub score: Option<u8>,
    pub reasoning: String,
    #[serde(serialize_with = "ids_as_json")]
    pub ids: Vec<String>,
}

fn ids_as_json<S: Serializer>(ids: &[String], serializer: S) -> std::result::Result<S::Ok, S::Error> {
    let json = serde_json::to_string(ids).map_err(serde::ser::Error::custom)?;
    serializer.serialize_str(&json)
}

/// Append-only CSV file. The header is written once, when the file is empty.
/// Appends are serialized, so one sink can be shared between sessions.
#[derive(Debug)]
pub struct CsvLogSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl CsvLogSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, record: &LogRecord) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let is_empty = file.metadata()?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if is_empty {
            writer.write_record(LOG_HEADERS)?;
        }
        writer.serialize(record)?;
        writer.flush()?;
        Ok(())
    }
}
