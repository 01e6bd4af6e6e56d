//! User-facing notifications
//!
//! Every failed asynchronous operation ends here instead of propagating; the
//! UI layer implements [`Notifier`] to show transient messages.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Severity of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    /// Progress information
    Info,
    /// Operation succeeded
    Success,
    /// Operation partially succeeded
    Warning,
    /// Operation failed
    Error,
}

/// One transient message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Severity
    pub level: NotificationLevel,
    /// Headline
    pub text: String,
    /// Optional detail line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl Notification {
    /// Notification without details
    #[must_use]
    pub fn new(level: NotificationLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
            details: None,
        }
    }

    /// Info notification
    #[must_use]
    pub fn info(text: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Info, text)
    }

    /// Success notification
    #[must_use]
    pub fn success(text: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Success, text)
    }

    /// Warning notification
    #[must_use]
    pub fn warning(text: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Warning, text)
    }

    /// Error notification
    #[must_use]
    pub fn error(text: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Error, text)
    }

    /// With detail line
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Sink for user-facing notifications
pub trait Notifier: Send + Sync {
    /// Show a notification
    fn notify(&self, notification: Notification);
}

/// Notifier that only logs
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        let details = notification.details.as_deref().unwrap_or_default();
        match notification.level {
            NotificationLevel::Error => {
                tracing::error!(details, "{}", notification.text);
            }
            NotificationLevel::Warning => {
                tracing::warn!(details, "{}", notification.text);
            }
            NotificationLevel::Info | NotificationLevel::Success => {
                tracing::info!(details, "{}", notification.text);
            }
        }
    }
}

/// Notifier that keeps every notification
#[derive(Debug, Default)]
pub struct NotificationLog {
    entries: Mutex<Vec<Notification>>,
}

impl NotificationLog {
    /// Empty log
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all notifications
    #[must_use]
    pub fn entries(&self) -> Vec<Notification> {
        self.entries.lock().clone()
    }

    /// Most recent notification
    #[must_use]
    pub fn last(&self) -> Option<Notification> {
        self.entries.lock().last().cloned()
    }

    /// Take all notifications
    pub fn drain(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.entries.lock())
    }

    /// Number of notifications
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// No notifications
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Notifier for NotificationLog {
    fn notify(&self, notification: Notification) {
        self.entries.lock().push(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_keeps_order() {
        let log = NotificationLog::new();
        log.notify(Notification::info("Uploading 2 file(s)..."));
        log.notify(Notification::warning("1 files uploaded successfully. 1 files failed.")
            .with_details("Failed files: b.pdf"));

        assert_eq!(log.len(), 2);
        let last = log.last().unwrap();
        assert_eq!(last.level, NotificationLevel::Warning);
        assert_eq!(last.details.as_deref(), Some("Failed files: b.pdf"));

        let drained = log.drain();
        assert_eq!(drained[0].text, "Uploading 2 file(s)...");
        assert!(log.is_empty());
    }
}
