use std::time::Duration;

use async_trait::async_trait;
use quiesce_core::{ReadyNotifier, StudyReady, WatchError};
use reqwest::Client;
use tracing::debug;

/// Posts each ready event as JSON to a fixed endpoint.
#[derive(Debug, Clone)]
pub struct HttpNotifier {
    client: Client,
    endpoint: String,
}

impl HttpNotifier {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, WatchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WatchError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ReadyNotifier for HttpNotifier {
    async fn notify_ready(&self, event: &StudyReady) -> Result<(), WatchError> {
        debug!(
            target: "quiesce::notify",
            endpoint = %self.endpoint,
            tenant = %event.tenant,
            study = %event.study,
            "posting ready notification"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(event)
            .send()
            .await
            .map_err(|e| WatchError::Notify(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(WatchError::NotifyStatus {
                status: status.as_u16(),
            })
        }
    }
}
