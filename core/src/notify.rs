//! Outbound notifications
//!
//! Recipients are told about blocked content and about the filter being
//! switched off. Delivery is fire-and-forget: payloads are appended to a
//! JSON Lines outbox that an external forwarder posts to the webhook.

use crate::error::{CoreError, StorageError};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, warn};

/// What a notification is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ContentBlocked,
    AccessibilityOff,
    AppForceStopped,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::ContentBlocked => "content_blocked",
            NotificationKind::AccessibilityOff => "accessibility_off",
            NotificationKind::AppForceStopped => "app_force_stopped",
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One webhook request body, addressed to a single recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    pub secret: String,
    pub event_type: NotificationKind,
    pub details: String,
    pub recipients: Vec<String>,
}

/// Receiver of outbound notifications
pub trait Notifier: Send + Sync {
    /// Queue `kind` for every recipient. Returns how many were queued.
    fn notify(&self, kind: NotificationKind, details: &str, recipients: &[String]) -> usize;
}

/// Notifier that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _kind: NotificationKind, _details: &str, _recipients: &[String]) -> usize {
        0
    }
}

/// Appends webhook payloads to a JSON Lines outbox file
#[derive(Debug)]
pub struct OutboxNotifier {
    path: PathBuf,
    secret: String,
    lock: Mutex<()>,
}

impl OutboxNotifier {
    pub fn new(path: PathBuf, secret: impl Into<String>) -> Self {
        Self {
            path,
            secret: secret.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn payload(&self, kind: NotificationKind, details: &str, recipient: &str) -> WebhookPayload {
        WebhookPayload {
            secret: self.secret.clone(),
            event_type: kind,
            details: details.to_string(),
            recipients: vec![recipient.to_string()],
        }
    }

    fn append(&self, payloads: &[WebhookPayload]) -> Result<(), CoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| StorageError::CreateDir {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }

        let _guard = self
            .lock
            .lock()
            .map_err(|_| CoreError::Storage(StorageError::Poisoned))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| StorageError::OpenFile {
                path: self.path.clone(),
                source: e,
            })?;

        let mut buffer = String::new();
        for payload in payloads {
            buffer.push_str(&serde_json::to_string(payload).map_err(StorageError::Serialize)?);
            buffer.push('\n');
        }
        file.write_all(buffer.as_bytes())
            .map_err(StorageError::Write)?;
        file.flush().map_err(StorageError::Flush)?;
        Ok(())
    }

    /// Read back every queued payload
    pub fn read_outbox(&self) -> Result<Vec<WebhookPayload>, CoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line)
                    .map_err(|e| CoreError::Storage(StorageError::Serialize(e)))
            })
            .collect()
    }
}

impl Notifier for OutboxNotifier {
    fn notify(&self, kind: NotificationKind, details: &str, recipients: &[String]) -> usize {
        if recipients.is_empty() {
            debug!("No recipients for {} notification", kind);
            return 0;
        }

        let payloads: Vec<WebhookPayload> = recipients
            .iter()
            .map(|recipient| self.payload(kind, details, recipient))
            .collect();

        match self.append(&payloads) {
            Ok(()) => {
                debug!(
                    "Queued {} notification for {} recipient(s)",
                    kind,
                    payloads.len()
                );
                payloads.len()
            }
            Err(e) => {
                warn!("Failed to queue {} notification: {}", kind, e);
                0
            }
        }
    }
}

impl<T: Notifier + ?Sized> Notifier for std::sync::Arc<T> {
    fn notify(&self, kind: NotificationKind, details: &str, recipients: &[String]) -> usize {
        (**self).notify(kind, details, recipients)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn recipients(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_one_payload_per_recipient() {
        let temp_dir = TempDir::new().unwrap();
        let notifier = OutboxNotifier::new(temp_dir.path().join("outbox.jsonl"), "s3cret");

        let queued = notifier.notify(
            NotificationKind::ContentBlocked,
            "Blocked content in com.browser",
            &recipients(&["a@example.com", "b@example.com"]),
        );
        assert_eq!(queued, 2);

        let outbox = notifier.read_outbox().unwrap();
        assert_eq!(outbox.len(), 2);
        assert_eq!(outbox[0].recipients, vec!["a@example.com"]);
        assert_eq!(outbox[1].recipients, vec!["b@example.com"]);
        assert_eq!(outbox[0].secret, "s3cret");
        assert_eq!(outbox[0].event_type, NotificationKind::ContentBlocked);
    }

    #[test]
    fn test_payload_wire_names() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("outbox.jsonl");
        let notifier = OutboxNotifier::new(path.clone(), "k");
        notifier.notify(
            NotificationKind::AppForceStopped,
            "details",
            &recipients(&["x@example.com"]),
        );

        let line = std::fs::read_to_string(&path).unwrap();
        assert!(line.contains("\"eventType\":\"app_force_stopped\""));
        assert!(line.contains("\"details\":\"details\""));
        assert!(line.contains("\"recipients\":[\"x@example.com\"]"));
    }

    #[test]
    fn test_no_recipients_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("outbox.jsonl");
        let notifier = OutboxNotifier::new(path.clone(), "k");

        assert_eq!(
            notifier.notify(NotificationKind::AccessibilityOff, "off", &[]),
            0
        );
        assert!(!path.exists());
        assert!(notifier.read_outbox().unwrap().is_empty());
    }

    #[test]
    fn test_unwritable_outbox_is_swallowed() {
        let temp_dir = TempDir::new().unwrap();
        // A directory where the file should be
        let notifier = OutboxNotifier::new(temp_dir.path().to_path_buf(), "k");
        assert_eq!(
            notifier.notify(
                NotificationKind::ContentBlocked,
                "d",
                &recipients(&["a@example.com"])
            ),
            0
        );
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(NotificationKind::ContentBlocked.to_string(), "content_blocked");
        assert_eq!(
            serde_json::to_string(&NotificationKind::AccessibilityOff).unwrap(),
            "\"accessibility_off\""
        );
    }
}
