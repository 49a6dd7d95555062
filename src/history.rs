use std::{
    collections::BTreeMap,
    io::Write,
    path::{Path, PathBuf},
};

use chrono::{DateTime, TimeDelta, Utc};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::{
    config::OutputId,
    local_time::{format_utc_timestamp, parse_utc_timestamp},
    settings::TRIGGER_SUPPRESSION_HOURS,
};

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("History file {path:?} does not exist, create it with '{{}}' before the first run")]
    Missing { path: PathBuf },
    #[error("Cannot access history file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("History file {path:?} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("History entry for output [{output}] has an invalid timestamp '{value}': {source}")]
    Timestamp {
        output: String,
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// Last-triggered instants per output, kept in a flat JSON object on disk.
///
/// The file is read again on every call, nothing is cached between calls. Writes replace the
/// whole file through a temporary sibling and a rename.
#[derive(Debug, Clone)]
pub struct HistoryFile {
    path: PathBuf,
}

type HistoryRecord = BTreeMap<String, String>;

impl HistoryFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<HistoryRecord, HistoryError> {
        let content = std::fs::read_to_string(&self.path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                HistoryError::Missing {
                    path: self.path.clone(),
                }
            } else {
                HistoryError::Io {
                    path: self.path.clone(),
                    source,
                }
            }
        })?;

        serde_json::from_str(&content).map_err(|source| HistoryError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn write(&self, history: &HistoryRecord) -> Result<(), HistoryError> {
        let io_err = |source| HistoryError::Io {
            path: self.path.clone(),
            source,
        };
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
        let content = serde_json::to_string(history).map_err(|source| HistoryError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        tmp.write_all(content.as_bytes()).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;
        Ok(())
    }

    pub fn last_triggered(&self, output: OutputId) -> Result<Option<DateTime<Utc>>, HistoryError> {
        let history = self.read()?;
        let key = output.to_string();
        history
            .get(&key)
            .map(|value| {
                parse_utc_timestamp(value).map_err(|source| HistoryError::Timestamp {
                    output: key.clone(),
                    value: value.clone(),
                    source,
                })
            })
            .transpose()
    }

    /// `true` while `now` is within the suppression window after the last trigger of `output`.
    pub fn was_triggered_recently(&self, output: OutputId, now: DateTime<Utc>) -> Result<bool, HistoryError> {
        let last_set = self.last_triggered(output)?;
        log::debug!(
            "Output [{}] was last set on: {}",
            output,
            last_set.map(|d| d.to_string()).unwrap_or_else(|| "never".to_string())
        );

        Ok(last_set.is_some_and(|last| now <= last + TimeDelta::hours(TRIGGER_SUPPRESSION_HOURS)))
    }

    pub fn record_trigger(&self, output: OutputId, when: DateTime<Utc>) -> Result<(), HistoryError> {
        let mut history = self.read()?;
        let date = format_utc_timestamp(&when);
        log::debug!("Logging output [{}] on: {}", output, date);
        history.insert(output.to_string(), date);
        self.write(&history)
    }
}
