//! Analytics side channel
//!
//! Fire-and-forget event reporting. The pipeline calls [`AnalyticsSink`]
//! and never inspects the result; sinks must not fail the calling flow.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

/// Fire-and-forget analytics events.
#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    async fn track(&self, event: &str, props: Value);
}

/// Default sink: structured log lines only.
#[derive(Debug, Default, Clone)]
pub struct LogSink;

#[async_trait]
impl AnalyticsSink for LogSink {
    async fn track(&self, event: &str, props: Value) {
        tracing::info!(target: "analytics", event, %props, "Analytics event");
    }
}

/// Capturing sink for tests: records every event in order.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<(String, Value)>>,
}

#[async_trait]
impl AnalyticsSink for MemorySink {
    async fn track(&self, event: &str, props: Value) {
        self.events.lock().await.push((event.to_string(), props));
    }
}

impl MemorySink {
    pub async fn events(&self) -> Vec<(String, Value)> {
        self.events.lock().await.clone()
    }

    pub async fn count(&self, event: &str) -> usize {
        self.events
            .lock()
            .await
            .iter()
            .filter(|(name, _)| name == event)
            .count()
    }
}
