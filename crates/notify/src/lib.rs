//! Outbound notifications for workflow transitions.
//!
//! Notifications are strictly fire-and-forget: a transition that has
//! committed is never rolled back because a webhook was down. Delivery
//! runs on a spawned task and failures are logged, not propagated.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use thiserror::Error;

pub mod webhook;

pub use webhook::WebhookNotifier;

/// Snapshot of a committed transition, sent to interested parties.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TransitionNotification {
    pub demande_id: String,
    pub numero: String,
    pub from: String,
    pub to: String,
    pub step: String,
    pub action: String,
    pub actor_id: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("webhook transport error: {0}")]
    Transport(String),
    #[error("webhook returned status {0}")]
    Status(u16),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &TransitionNotification) -> Result<(), NotifyError>;
}

/// Discards every notification. Used when no webhook is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _notification: &TransitionNotification) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Deliver on a background task. The returned handle is only useful to
/// tests; callers drop it and move on.
pub fn dispatch(
    notifier: Arc<dyn Notifier>,
    notification: TransitionNotification,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(error) = notifier.notify(&notification).await {
            tracing::warn!(
                event_name = "notify.delivery_failed",
                numero = %notification.numero,
                to = %notification.to,
                error = %error,
                "notification delivery failed"
            );
        } else {
            tracing::debug!(
                event_name = "notify.delivered",
                numero = %notification.numero,
                to = %notification.to,
                "notification delivered"
            );
        }
    })
}

/// Settings a [`WebhookNotifier`] is built from, already validated by the
/// configuration layer.
#[derive(Clone)]
pub struct WebhookSettings {
    pub url: String,
    pub token: Option<SecretString>,
    pub timeout: Duration,
}

impl WebhookSettings {
    pub(crate) fn bearer(&self) -> Option<String> {
        self.token.as_ref().map(|token| format!("Bearer {}", token.expose_secret()))
    }
}

/// Test double that records every notification it receives.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    received: Arc<Mutex<Vec<TransitionNotification>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn received(&self) -> Vec<TransitionNotification> {
        match self.received.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &TransitionNotification) -> Result<(), NotifyError> {
        match self.received.lock() {
            Ok(mut guard) => guard.push(notification.clone()),
            Err(poisoned) => poisoned.into_inner().push(notification.clone()),
        }
        Ok(())
    }
}
