//! Event sinks: HTTP collector or log-only

use reqwest::Client;
use tracing::{debug, warn};

use super::AnalyticsEvent;

/// Fire-and-forget event delivery. Failures never reach the caller.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: AnalyticsEvent);
}

/// POSTs each event as JSON to the analytics collector
#[derive(Clone)]
pub struct HttpEventSink {
    client: Client,
    url: String,
}

impl HttpEventSink {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }
}

impl EventSink for HttpEventSink {
    fn publish(&self, event: AnalyticsEvent) {
        let client = self.client.clone();
        let url = self.url.clone();

        tokio::spawn(async move {
            let kind = event.kind();
            match client.post(&url).json(&event).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(event = kind, "Analytics event delivered");
                }
                Ok(response) => {
                    warn!(event = kind, status = response.status().as_u16(), "Analytics collector rejected event");
                }
                Err(e) => {
                    warn!(event = kind, error = %e, "Failed to deliver analytics event");
                }
            }
        });
    }
}

/// Writes events to the log only
#[derive(Clone, Default)]
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn publish(&self, event: AnalyticsEvent) {
        match serde_json::to_string(&event) {
            Ok(json) => debug!(event = event.kind(), payload = %json, "Analytics event"),
            Err(e) => warn!(event = event.kind(), error = %e, "Failed to encode analytics event"),
        }
    }
}
