//! Fire-and-forget notification seam.  Delivery failures are logged, never
//! propagated.

use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

use crate::response::Warning;

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, warning: &Warning) -> Result<()>;
}

/// Push `warnings` through `sink`, swallowing per-item failures.
pub async fn notify_all(sink: &dyn NotificationSink, warnings: &[Warning]) {
    for warning in warnings {
        if let Err(error) = sink.deliver(warning).await {
            warn!(%error, text = %warning.text, "notification delivery failed");
        }
    }
}

/// Default sink: just logs the warning.
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn deliver(&self, warning: &Warning) -> Result<()> {
        info!(
            severity = ?warning.severity,
            action_required = warning.action_required,
            "{}",
            warning.text
        );
        Ok(())
    }
}
