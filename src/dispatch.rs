//! Best-effort event delivery to downstream consumers.
//!
//! Each event's target consumer is resolved to a delivery address through a
//! static directory; one consumer (Triage) is provisioned on demand and has
//! no standing address. Delivery is fire-and-forget: one attempt per
//! event with a bounded timeout, failures logged and swallowed, never
//! retried.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use snafu::ResultExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{DeliverySnafu, HttpClientSnafu, Result};
use crate::types::{Consumer, MonitorEvent};

/// Static mapping from consumer identity to delivery address.
#[derive(Debug, Clone)]
pub struct ConsumerDirectory {
    addresses: HashMap<Consumer, String>,
}

impl ConsumerDirectory {
    /// Create a directory from an explicit address map.
    pub fn new(addresses: HashMap<Consumer, String>) -> Self {
        Self { addresses }
    }

    /// Standard directory rooted at `base_url`.
    ///
    /// Every consumer except Triage receives events at
    /// `{base_url}/agents/{name}/events`. Triage is provisioned on demand
    /// and has no standing address.
    pub fn with_base_url(base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/');
        let addresses = [
            Consumer::Commander,
            Consumer::Guardian,
            Consumer::Forge,
            Consumer::Ledger,
            Consumer::Briefer,
        ]
        .into_iter()
        .map(|consumer| (consumer, format!("{base_url}/agents/{consumer}/events")))
        .collect();

        Self { addresses }
    }

    /// Resolve a consumer to its delivery address, if it has one.
    pub fn resolve(&self, consumer: Consumer) -> Option<&str> {
        self.addresses.get(&consumer).map(String::as_str)
    }
}

/// Outcome of one best-effort delivery attempt.
///
/// Explicitly discardable: the monitor records outcomes in its stats but
/// never acts on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The consumer accepted the event.
    Delivered,
    /// The target has no address; the event was logged and dropped.
    Dropped,
    /// The single delivery attempt failed; the event is not retried.
    Failed,
}

/// Transport for delivering events to a resolved address.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Attempt exactly one delivery of `event` to `address`.
    async fn deliver(&self, address: &str, event: &MonitorEvent) -> Result<()>;
}

/// Sink that POSTs events as JSON over HTTP.
pub struct HttpEventSink {
    client: reqwest::Client,
}

impl HttpEventSink {
    /// Create a sink with a bounded per-delivery timeout.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context(HttpClientSnafu)?;

        Ok(Self { client })
    }
}

#[async_trait]
impl EventSink for HttpEventSink {
    async fn deliver(&self, address: &str, event: &MonitorEvent) -> Result<()> {
        let response = self
            .client
            .post(address)
            .json(event)
            .send()
            .await
            .map_err(|source| {
                DeliverySnafu {
                    target: event.target.to_string(),
                    reason: source.to_string(),
                }
                .build()
            })?;

        let status = response.status();
        if !status.is_success() {
            return DeliverySnafu {
                target: event.target.to_string(),
                reason: format!("HTTP {status}"),
            }
            .fail();
        }

        Ok(())
    }
}

/// Recording sink for tests and development.
///
/// Stores every delivered event in memory instead of performing network I/O.
#[derive(Clone, Default)]
pub struct InMemoryEventSink {
    delivered: Arc<Mutex<Vec<(String, MonitorEvent)>>>,
}

impl InMemoryEventSink {
    /// Create an empty recording sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// All (address, event) pairs delivered so far.
    pub async fn delivered(&self) -> Vec<(String, MonitorEvent)> {
        self.delivered.lock().await.clone()
    }

    /// Number of deliveries recorded.
    pub async fn count(&self) -> usize {
        self.delivered.lock().await.len()
    }

    /// Forget all recorded deliveries.
    pub async fn clear(&self) {
        self.delivered.lock().await.clear();
    }
}

#[async_trait]
impl EventSink for InMemoryEventSink {
    async fn deliver(&self, address: &str, event: &MonitorEvent) -> Result<()> {
        self.delivered
            .lock()
            .await
            .push((address.to_string(), event.clone()));
        Ok(())
    }
}

/// Resolves targets and performs best-effort deliveries.
pub struct EventDispatcher {
    directory: ConsumerDirectory,
    sink: Arc<dyn EventSink>,
}

impl EventDispatcher {
    /// Create a dispatcher over a directory and a sink.
    pub fn new(directory: ConsumerDirectory, sink: Arc<dyn EventSink>) -> Self {
        Self { directory, sink }
    }

    /// Dispatch one event, returning the (discardable) outcome.
    pub async fn dispatch(&self, event: &MonitorEvent) -> DeliveryOutcome {
        let Some(address) = self.directory.resolve(event.target) else {
            debug!(
                event_id = %event.event_id,
                event_type = %event.event_type,
                target = %event.target,
                "no address for target; event dropped"
            );
            return DeliveryOutcome::Dropped;
        };

        match self.sink.deliver(address, event).await {
            Ok(()) => {
                debug!(
                    event_id = %event.event_id,
                    event_type = %event.event_type,
                    target = %event.target,
                    "event delivered"
                );
                DeliveryOutcome::Delivered
            }
            Err(error) => {
                // Non-fatal by contract: log and move on.
                debug!(
                    event_id = %event.event_id,
                    event_type = %event.event_type,
                    target = %event.target,
                    error = %error,
                    "event delivery failed; not retried"
                );
                DeliveryOutcome::Failed
            }
        }
    }

    /// Dispatch a batch in order, returning one outcome per event.
    pub async fn dispatch_all(&self, events: &[MonitorEvent]) -> Vec<DeliveryOutcome> {
        let mut outcomes = Vec::with_capacity(events.len());
        for event in events {
            outcomes.push(self.dispatch(event).await);
        }
        outcomes
    }
}
