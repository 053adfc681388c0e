//! Event storage for WordGuard
//!
//! Filter events are persisted per session in JSON Lines format; each
//! service run opens a new log file. [`StorageSink`] adapts any
//! [`EventStorage`] to the pipeline's [`EventSink`].

use crate::error::{CoreError, StorageError};
use crate::event::{Event, EventSink};
use chrono::{DateTime, Utc};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::warn;

/// Trait for event storage implementations
pub trait EventStorage: Send {
    /// Write an event to storage
    fn write_event(&mut self, event: &Event) -> Result<(), CoreError>;
    /// Flush buffered data to disk
    fn flush(&mut self) -> Result<(), CoreError>;
    /// Get the storage file path
    fn path(&self) -> &PathBuf;
}

/// Session-based log file writer
///
/// Format: `session-{timestamp}-{uuid}.jsonl`
pub struct SessionLogger {
    session_id: String,
    session_start: DateTime<Utc>,
    file_path: PathBuf,
    writer: BufWriter<File>,
    event_count: usize,
}

impl SessionLogger {
    /// Create a new session logger
    ///
    /// # Arguments
    /// * `log_dir` - Directory to store log files
    /// * `session_id` - Optional custom session ID (auto-generated if None)
    pub fn new(log_dir: &PathBuf, session_id: Option<String>) -> Result<Self, CoreError> {
        if !log_dir.exists() {
            std::fs::create_dir_all(log_dir).map_err(|e| StorageError::CreateDir {
                path: log_dir.clone(),
                source: e,
            })?;
        }

        let session_start = Utc::now();
        let session_id = session_id.unwrap_or_else(|| {
            format!(
                "{}-{}",
                session_start.format("%Y%m%d-%H%M%S"),
                &uuid::Uuid::new_v4().to_string()[..8]
            )
        });

        let file_path = log_dir.join(format!("session-{}.jsonl", session_id));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file_path)
            .map_err(|e| StorageError::OpenFile {
                path: file_path.clone(),
                source: e,
            })?;

        Ok(Self {
            session_id,
            session_start,
            file_path,
            writer: BufWriter::new(file),
            event_count: 0,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn session_start(&self) -> DateTime<Utc> {
        self.session_start
    }

    /// Get number of events written
    pub fn event_count(&self) -> usize {
        self.event_count
    }

    /// Write session metadata as first line
    pub fn write_session_header(&mut self, source: &str) -> Result<(), CoreError> {
        let header = serde_json::json!({
            "session_id": self.session_id,
            "session_start": self.session_start.to_rfc3339(),
            "source": source,
            "version": crate::VERSION,
            "type": "session_start"
        });
        writeln!(self.writer, "{}", header).map_err(StorageError::Write)?;
        self.flush()?;
        Ok(())
    }

    /// Write session end marker
    pub fn write_session_footer(&mut self) -> Result<(), CoreError> {
        let footer = serde_json::json!({
            "session_id": self.session_id,
            "session_end": Utc::now().to_rfc3339(),
            "event_count": self.event_count,
            "type": "session_end"
        });
        writeln!(self.writer, "{}", footer).map_err(StorageError::Write)?;
        self.flush()?;
        Ok(())
    }
}

impl EventStorage for SessionLogger {
    fn write_event(&mut self, event: &Event) -> Result<(), CoreError> {
        let json = serde_json::to_string(event).map_err(StorageError::Serialize)?;
        writeln!(self.writer, "{}", json).map_err(StorageError::Write)?;
        self.event_count += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), CoreError> {
        self.writer.flush().map_err(StorageError::Flush)?;
        Ok(())
    }

    fn path(&self) -> &PathBuf {
        &self.file_path
    }
}

impl Drop for SessionLogger {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

/// Writes pipeline events into an [`EventStorage`]
pub struct StorageSink<S: EventStorage> {
    storage: Mutex<S>,
}

impl<S: EventStorage> StorageSink<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage: Mutex::new(storage),
        }
    }

    /// Run `f` against the wrapped storage
    pub fn with_storage<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        let mut guard = self
            .storage
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }

    pub fn into_inner(self) -> S {
        self.storage
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<S: EventStorage> EventSink for StorageSink<S> {
    fn emit(&self, event: &Event) {
        let result = self.with_storage(|storage| {
            storage.write_event(event)?;
            storage.flush()
        });
        if let Err(e) = result {
            warn!("Failed to persist event {}: {}", event.id, e);
        }
    }
}

/// Clean up old log files based on retention policy
pub fn cleanup_old_logs(log_dir: &PathBuf, retention_days: u32) -> Result<usize, CoreError> {
    if retention_days == 0 || !log_dir.exists() {
        return Ok(0);
    }

    let cutoff = Utc::now() - chrono::Duration::days(retention_days as i64);
    let mut removed = 0;

    for entry in std::fs::read_dir(log_dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
            continue;
        }

        let modified = entry.metadata().and_then(|m| m.modified());
        if let Ok(modified) = modified {
            let modified: DateTime<Utc> = modified.into();
            if modified < cutoff && std::fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::CheckCategory;
    use crate::event::{EventType, Severity};
    use tempfile::TempDir;

    fn create_test_event() -> Event {
        Event::classification("com.chat", CheckCategory::Text, 1, 12)
    }

    #[test]
    fn test_session_logger_creation() {
        let temp_dir = TempDir::new().unwrap();
        let log_dir = temp_dir.path().to_path_buf();

        let logger = SessionLogger::new(&log_dir, None).unwrap();

        assert!(logger.path().exists());
        assert!(logger.path().to_string_lossy().contains("session-"));
        assert!(logger.path().to_string_lossy().ends_with(".jsonl"));
        assert_eq!(logger.event_count(), 0);
    }

    #[test]
    fn test_session_logger_custom_id() {
        let temp_dir = TempDir::new().unwrap();
        let log_dir = temp_dir.path().to_path_buf();

        let logger = SessionLogger::new(&log_dir, Some("replay-1".to_string())).unwrap();

        assert_eq!(logger.session_id(), "replay-1");
        assert!(logger.path().to_string_lossy().contains("replay-1"));
    }

    #[test]
    fn test_session_logger_write_event() {
        let temp_dir = TempDir::new().unwrap();
        let mut logger =
            SessionLogger::new(&temp_dir.path().to_path_buf(), Some("test".to_string())).unwrap();

        logger.write_event(&create_test_event()).unwrap();
        logger.flush().unwrap();

        assert_eq!(logger.event_count(), 1);
        let content = std::fs::read_to_string(logger.path()).unwrap();
        assert!(content.contains("\"type\":\"classification\""));
        assert!(content.contains("\"package\":\"com.chat\""));
    }

    #[test]
    fn test_session_header_footer() {
        let temp_dir = TempDir::new().unwrap();
        let mut logger =
            SessionLogger::new(&temp_dir.path().to_path_buf(), Some("hf".to_string())).unwrap();

        logger.write_session_header("replay").unwrap();
        logger.write_event(&create_test_event()).unwrap();
        logger.write_session_footer().unwrap();

        let content = std::fs::read_to_string(logger.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("\"type\":\"session_start\""));
        assert!(lines[0].contains("\"source\":\"replay\""));
        assert!(lines[2].contains("\"type\":\"session_end\""));
        assert!(lines[2].contains("\"event_count\":1"));
    }

    #[test]
    fn test_creates_log_directory() {
        let temp_dir = TempDir::new().unwrap();
        let log_dir = temp_dir.path().join("nested").join("logs");
        assert!(!log_dir.exists());

        let logger = SessionLogger::new(&log_dir, None).unwrap();

        assert!(log_dir.exists());
        assert!(logger.path().exists());
    }

    #[test]
    fn test_cleanup_old_logs() {
        let temp_dir = TempDir::new().unwrap();
        let log_dir = temp_dir.path().to_path_buf();

        for i in 0..3 {
            std::fs::write(log_dir.join(format!("session-test-{}.jsonl", i)), "x").unwrap();
        }

        assert_eq!(cleanup_old_logs(&log_dir, 0).unwrap(), 0);
        // Fresh files survive retention
        assert_eq!(cleanup_old_logs(&log_dir, 30).unwrap(), 0);
        assert_eq!(
            cleanup_old_logs(&temp_dir.path().join("missing"), 30).unwrap(),
            0
        );
    }

    #[test]
    fn test_storage_sink_persists_events() {
        let temp_dir = TempDir::new().unwrap();
        let logger =
            SessionLogger::new(&temp_dir.path().to_path_buf(), Some("sink".to_string())).unwrap();
        let sink = StorageSink::new(logger);

        sink.emit(&create_test_event());
        sink.emit(&Event::new(
            EventType::SiteMatch {
                url: "pornhub.com".to_string(),
                root: "pornhub".to_string(),
            },
            "com.browser",
            Severity::Warning,
        ));

        assert_eq!(sink.with_storage(|s| s.event_count()), 2);
        let path = sink.with_storage(|s| s.path().clone());
        let content = std::fs::read_to_string(path).unwrap();
        for line in content.lines() {
            let parsed: serde_json::Value = serde_json::from_str(line).unwrap();
            assert!(parsed.is_object());
        }
    }
}
