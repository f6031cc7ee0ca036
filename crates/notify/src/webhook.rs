//! HTTP webhook delivery.

use async_trait::async_trait;
use reqwest::Client;

use crate::{Notifier, NotifyError, TransitionNotification, WebhookSettings};

pub struct WebhookNotifier {
    client: Client,
    settings: WebhookSettings,
}

impl WebhookNotifier {
    pub fn new(settings: WebhookSettings) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        Ok(Self { client, settings })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notification: &TransitionNotification) -> Result<(), NotifyError> {
        let mut request = self.client.post(&self.settings.url).json(notification);
        if let Some(bearer) = self.settings.bearer() {
            request = request.header(reqwest::header::AUTHORIZATION, bearer);
        }

        let response =
            request.send().await.map_err(|e| NotifyError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }
        Ok(())
    }
}
