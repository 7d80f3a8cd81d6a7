//! Notification sink.
//!
//! Notifications are fire-and-forget: handlers record them and move on, and
//! a failed write is logged rather than surfaced. The UI polls the list
//! endpoint to render toasts. Share-password delivery (email/sms/manual) is
//! simulated here as well; a real implementation would plug a transport in
//! behind [`Notifier::deliver_share_password`] without changing callers.

use std::sync::Arc;

use crate::models::{Notification, NotificationLevel, PasswordDelivery, Share};
use crate::store::Store;

pub struct Notifier {
    store: Arc<Store>,
}

impl Notifier {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Record a toast for the user. Never fails the calling operation.
    pub fn toast(&self, user_id: &str, level: NotificationLevel, message: impl Into<String>) {
        let mut notification = Notification {
            id: String::new(),
            user_id: user_id.to_string(),
            level,
            message: message.into(),
            created_at: chrono::Utc::now(),
        };
        if let Err(e) = self.store.create_notification(&mut notification) {
            log::warn!("Failed to record notification: {}", e);
        }
    }

    pub fn success(&self, user_id: &str, message: impl Into<String>) {
        self.toast(user_id, NotificationLevel::Success, message);
    }

    pub fn info(&self, user_id: &str, message: impl Into<String>) {
        self.toast(user_id, NotificationLevel::Info, message);
    }

    /// Simulated separate-channel password delivery. The password itself is
    /// never recorded; only the fact of delivery is.
    pub fn deliver_share_password(
        &self,
        share: &Share,
        method: PasswordDelivery,
        recipient: Option<&str>,
    ) {
        let message = match method {
            PasswordDelivery::Email => format!(
                "Share password sent by email to {}",
                recipient.unwrap_or("the recipient")
            ),
            PasswordDelivery::Sms => format!(
                "Share password sent by SMS to {}",
                recipient.unwrap_or("the recipient")
            ),
            PasswordDelivery::Manual => {
                "Share password ready for manual delivery".to_string()
            }
        };
        log::info!("share {}: {}", share.id, message);
        self.toast(&share.user_id, NotificationLevel::Info, message);
    }
}
