//! Notification sink abstraction.
//!
//! The tracker publishes a notification for every user-visible transition.
//! Where the notifications end up is the sink's business: the CLI prints
//! them, tests collect them in memory.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Severity of a user-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
}

/// One user-facing message about an execution transition.
#[derive(Debug, Clone)]
pub struct Notification {
    pub id: String,
    pub kind: NotificationKind,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Success, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Error, message)
    }

    fn new(kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            message: message.into(),
            created_at: Utc::now(),
        }
    }
}

/// Receives notifications published by the tracker.
pub trait NotificationSink: Send + Sync {
    fn publish(&self, notification: Notification);
}

/// Sink that forwards notifications to the tracing subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn publish(&self, notification: Notification) {
        match notification.kind {
            NotificationKind::Success => {
                tracing::info!(id = %notification.id, "{}", notification.message);
            }
            NotificationKind::Error => {
                tracing::error!(id = %notification.id, "{}", notification.message);
            }
        }
    }
}

/// Sink that appends notifications to a shared in-memory list.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    entries: Arc<Mutex<Vec<Notification>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all published notifications, oldest first.
    pub fn entries(&self) -> Vec<Notification> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

impl NotificationSink for MemorySink {
    fn publish(&self, notification: Notification) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(notification);
        }
    }
}
