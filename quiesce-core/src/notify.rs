//! Ready notification boundary.
//!
//! The core only knows [`ReadyNotifier`]; the HTTP transport lives in
//! `quiesce-server`. [`NotificationDispatcher`] runs each call on its own task
//! so a slow endpoint never holds up scanning or deadline bookkeeping.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::classify::StudyKey;
use crate::error::{Result, WatchError};

/// Payload describing a study that has stabilized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyReady {
    pub tenant: String,
    pub study: String,
    pub model: String,
}

impl StudyReady {
    pub fn new(key: &StudyKey, model: impl Into<String>) -> Self {
        Self {
            tenant: key.tenant.clone(),
            study: key.study.clone(),
            model: model.into(),
        }
    }
}

/// Downstream consumer of ready events.
#[async_trait]
pub trait ReadyNotifier: Send + Sync {
    async fn notify_ready(&self, event: &StudyReady) -> Result<()>;
}

/// Notifier that forwards events into a channel. Handy for tests and for
/// embedding the watcher inside another process.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<StudyReady>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StudyReady>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ReadyNotifier for ChannelNotifier {
    async fn notify_ready(&self, event: &StudyReady) -> Result<()> {
        self.tx
            .send(event.clone())
            .map_err(|_| WatchError::Notify("ready receiver dropped".to_string()))
    }
}

/// Fire-and-forget delivery of ready events.
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifier: Arc<dyn ReadyNotifier>,
}

impl fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NotificationDispatcher")
    }
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn ReadyNotifier>) -> Self {
        Self { notifier }
    }

    /// Spawn delivery of one event. Failures are logged and not retried.
    pub fn dispatch(&self, event: StudyReady) -> JoinHandle<()> {
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            match notifier.notify_ready(&event).await {
                Ok(()) => info!(
                    target: "quiesce::notify",
                    tenant = %event.tenant,
                    study = %event.study,
                    "ready notification sent"
                ),
                Err(e) => warn!(
                    target: "quiesce::notify",
                    tenant = %event.tenant,
                    study = %event.study,
                    error = %e,
                    "ready notification failed"
                ),
            }
        })
    }
}
