//! Notification adapter that writes to the log
//!
//! Used by the daemon and the CLI, where there is no toast surface; the
//! priority decides the log level.

use tracing::{error, info, warn};

use agrodrone_core::ports::{INotificationService, Notification, NotificationPriority};

#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl INotificationService for LogNotifier {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()> {
        let Notification {
            title,
            body,
            priority,
            category,
        } = notification;

        match priority {
            NotificationPriority::Low | NotificationPriority::Normal => {
                info!(%category, %priority, "{title}: {body}")
            }
            NotificationPriority::High => warn!(%category, %priority, "{title}: {body}"),
            NotificationPriority::Critical => error!(%category, %priority, "{title}: {body}"),
        }
        Ok(())
    }
}
