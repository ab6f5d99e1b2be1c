//! Notification service port (driven/secondary port)
//!
//! This module defines the interface for telling the user how a sync went
//! and when connectivity changes. Presentation is up to the adapter: the
//! daemon and CLI log them, a UI would show a toast.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because notification delivery is adapter-specific.
//! - Notifications are fire-and-forget; callers log delivery failures and
//!   carry on.

use serde::{Deserialize, Serialize};

/// Category for sync results
pub const CATEGORY_SYNC: &str = "sync";
/// Category for online/offline transitions
pub const CATEGORY_CONNECTIVITY: &str = "connectivity";

/// Priority level for a notification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    /// Low priority, may not be shown immediately
    Low,
    /// Normal priority
    #[default]
    Normal,
    /// High priority, something needs attention
    High,
    /// Critical priority, an operation failed outright
    Critical,
}

impl std::fmt::Display for NotificationPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NotificationPriority::Low => "low",
            NotificationPriority::Normal => "normal",
            NotificationPriority::High => "high",
            NotificationPriority::Critical => "critical",
        };
        write!(f, "{}", s)
    }
}

/// A user-facing message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Short, descriptive title
    pub title: String,
    pub body: String,
    pub priority: NotificationPriority,
    /// [`CATEGORY_SYNC`] or [`CATEGORY_CONNECTIVITY`]
    pub category: String,
}

impl Notification {
    /// Creates a notification with `Normal` priority and no category
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            priority: NotificationPriority::Normal,
            category: String::new(),
        }
    }

    pub fn with_priority(mut self, priority: NotificationPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Creates a sync-related notification
    pub fn sync(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(title, body).with_category(CATEGORY_SYNC)
    }

    /// Creates a connectivity notification
    pub fn connectivity(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(title, body).with_category(CATEGORY_CONNECTIVITY)
    }
}

/// Port trait for user-facing notifications
#[async_trait::async_trait]
pub trait INotificationService: Send + Sync {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()>;
}
