//! Append-only per-identity logs and the consolidated chat transcript.
//!
//! Each identity gets `<logs_dir>/<identity>.log` with one
//! `[ISO-8601 timestamp] event text` line per event. Chat lines (observed,
//! sent, broadcast) and kick/end/error notices also go to one shared
//! transcript file.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{SecondsFormat, Utc};
use tracing::warn;

use crate::{AppError, Result};

/// Sink for session log records.
///
/// Implementations must be [`Send`] and [`Sync`] to allow sharing across
/// async task boundaries via [`std::sync::Arc`].
pub trait Journal: Send + Sync {
    /// Append one event line to `identity`'s log.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying write fails.
    fn record(&self, identity: &str, text: &str) -> Result<()>;

    /// Append one line to the chat transcript.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying write fails.
    fn transcript(&self, line: &str) -> Result<()>;

    /// Last `lines` entries of `identity`'s log, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no log exists for `identity`.
    fn tail(&self, identity: &str, lines: usize) -> Result<Vec<String>>;
}

/// Format a log line with the current UTC timestamp.
#[must_use]
pub fn stamp(text: &str) -> String {
    format!(
        "[{}] {text}",
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
    )
}

/// File name for an identity's log; characters outside `[A-Za-z0-9_.-]`
/// are replaced so an identity can never escape the log directory.
#[must_use]
pub fn log_file_name(identity: &str) -> String {
    let safe: String = identity
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let safe = safe.trim_start_matches('.');
    if safe.is_empty() {
        "_.log".to_owned()
    } else {
        format!("{safe}.log")
    }
}

/// Journal writing to the filesystem.
pub struct FileJournal {
    logs_dir: PathBuf,
    chatlog_path: PathBuf,
    identity_writers: Mutex<HashMap<String, BufWriter<File>>>,
    chat_writer: Mutex<Option<BufWriter<File>>>,
}

impl FileJournal {
    /// Construct a journal that stores per-identity logs in `logs_dir` and
    /// the chat transcript at `chatlog_path`.
    ///
    /// Creates `logs_dir` and the transcript's parent directory if they do
    /// not exist.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`] if a directory cannot be created.
    pub fn new(logs_dir: PathBuf, chatlog_path: PathBuf) -> Result<Self> {
        fs::create_dir_all(&logs_dir).map_err(|e| {
            AppError::Io(format!(
                "failed to create log directory {}: {e}",
                logs_dir.display()
            ))
        })?;
        if let Some(parent) = chatlog_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                AppError::Io(format!(
                    "failed to create transcript directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
        Ok(Self {
            logs_dir,
            chatlog_path,
            identity_writers: Mutex::new(HashMap::new()),
            chat_writer: Mutex::new(None),
        })
    }

    /// Path of `identity`'s log file.
    #[must_use]
    pub fn log_path(&self, identity: &str) -> PathBuf {
        self.logs_dir.join(log_file_name(identity))
    }

    fn open_append(path: &Path) -> Result<BufWriter<File>> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| AppError::Io(format!("failed to open {}: {e}", path.display())))?;
        Ok(BufWriter::new(file))
    }

    fn write_line(writer: &mut BufWriter<File>, line: &str) -> Result<()> {
        if let Err(e) = writeln!(writer, "{line}") {
            warn!("failed to write journal line: {e}");
            return Err(AppError::Io(format!("journal write failed: {e}")));
        }
        if let Err(e) = writer.flush() {
            warn!("failed to flush journal: {e}");
            return Err(AppError::Io(format!("journal flush failed: {e}")));
        }
        Ok(())
    }
}

impl Journal for FileJournal {
    fn record(&self, identity: &str, text: &str) -> Result<()> {
        let mut writers = self
            .identity_writers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if !writers.contains_key(identity) {
            let writer = Self::open_append(&self.log_path(identity))?;
            writers.insert(identity.to_owned(), writer);
        }

        match writers.get_mut(identity) {
            Some(writer) => Self::write_line(writer, &stamp(text)),
            None => Ok(()),
        }
    }

    fn transcript(&self, line: &str) -> Result<()> {
        let mut guard = self
            .chat_writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if guard.is_none() {
            *guard = Some(Self::open_append(&self.chatlog_path)?);
        }

        match guard.as_mut() {
            Some(writer) => Self::write_line(writer, line),
            None => Ok(()),
        }
    }

    fn tail(&self, identity: &str, lines: usize) -> Result<Vec<String>> {
        let path = self.log_path(identity);
        let file = File::open(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::NotFound(format!("no log for {identity}"))
            } else {
                AppError::Io(format!("failed to open {}: {e}", path.display()))
            }
        })?;

        let all: Vec<String> = BufReader::new(file)
            .lines()
            .collect::<std::io::Result<_>>()?;
        let skip = all.len().saturating_sub(lines);
        Ok(all.into_iter().skip(skip).collect())
    }
}

/// In-memory journal, used when file output is not wanted and in tests.
#[derive(Debug, Default)]
pub struct MemoryJournal {
    records: Mutex<Vec<(String, String)>>,
    transcript: Mutex<Vec<String>>,
}

impl MemoryJournal {
    /// Create an empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All event texts recorded for `identity`, oldest first.
    #[must_use]
    pub fn records_for(&self, identity: &str) -> Vec<String> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(who, _)| who == identity)
            .map(|(_, text)| text.clone())
            .collect()
    }

    /// All transcript lines, oldest first.
    #[must_use]
    pub fn transcript_lines(&self) -> Vec<String> {
        self.transcript
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Journal for MemoryJournal {
    fn record(&self, identity: &str, text: &str) -> Result<()> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((identity.to_owned(), text.to_owned()));
        Ok(())
    }

    fn transcript(&self, line: &str) -> Result<()> {
        self.transcript
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_owned());
        Ok(())
    }

    fn tail(&self, identity: &str, lines: usize) -> Result<Vec<String>> {
        let all = self.records_for(identity);
        if all.is_empty() {
            return Err(AppError::NotFound(format!("no log for {identity}")));
        }
        let skip = all.len().saturating_sub(lines);
        Ok(all.into_iter().skip(skip).collect())
    }
}
