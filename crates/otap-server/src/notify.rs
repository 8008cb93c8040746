//! Best-effort event notifications.
//!
//! Check-in decisions and delivery results are published as JSON to a
//! configured sink endpoint. Publishing is fire-and-forget: one attempt,
//! failures logged and otherwise ignored, the caller is never blocked.
//! With no endpoint configured the publisher is a silent no-op.

use serde::Serialize;
use tracing::{debug, warn};

/// An outbound notification event.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum NotifyEvent {
    Checkin {
        imei: String,
        custid: String,
        tid: Option<String>,
        reported: String,
        upgrade: bool,
        offered_version: Option<String>,
        tstamp: i64,
    },
    DeliveryResult {
        tid: String,
        result: String,
        tstamp: i64,
    },
}

/// One-way outbound publisher the core calls without awaiting a result.
#[derive(Debug, Clone)]
pub struct Notifier {
    http: reqwest::Client,
    endpoint: Option<String>,
}

impl Notifier {
    pub fn new(endpoint: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
        }
    }

    /// Publish an event. Returns immediately; the single delivery attempt
    /// runs on a spawned task and its failure is not observable here.
    pub fn publish(&self, event: NotifyEvent) {
        let Some(endpoint) = self.endpoint.clone() else {
            return;
        };
        let http = self.http.clone();

        tokio::spawn(async move {
            match http.post(&endpoint).json(&event).send().await {
                Ok(resp) if resp.status().is_success() => {
                    debug!(endpoint = %endpoint, "Notification published");
                }
                Ok(resp) => {
                    warn!(
                        endpoint = %endpoint,
                        status = %resp.status(),
                        "Notification sink rejected event"
                    );
                }
                Err(e) => {
                    warn!(endpoint = %endpoint, error = %e, "Notification publish failed");
                }
            }
        });
    }
}
