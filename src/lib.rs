//! Fleet health monitor for paired VPS instances.
//!
//! This crate polls an aggregate status snapshot of a managed fleet,
//! evaluates a fixed set of threshold rules against it, and emits typed
//! notification events to downstream agent consumers. Conditions that remain
//! continuously true are debounced through a suppression ledger; safety
//! critical conditions (failed instances, failed pairs) are never suppressed.
//!
//! # Features
//!
//! - **Scheduled sweeps**: one sweep immediately on start, then one per
//!   fixed interval, with an explicit overlap guard
//! - **Threshold rules**: five independent checks covering instance health,
//!   cost anomalies, provision backlog, per-provider health, and fleet
//!   recovery edge detection
//! - **Suppression ledger**: per-condition debouncing with expiry, cleared
//!   on recovery so re-degradation is reported promptly
//! - **Best-effort dispatch**: fire-and-forget delivery with bounded
//!   timeouts; failures are logged and swallowed, never retried
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use fleetwatch::{
//!     ConsumerDirectory, EventDispatcher, FleetMonitor, HttpEventSink,
//!     HttpStatusFetcher, MonitorConfig,
//! };
//!
//! let config = MonitorConfig::default();
//! let fetcher = HttpStatusFetcher::new(
//!     "https://fleet.example.com/api/status",
//!     config.fetch_timeout,
//! )?;
//! let dispatcher = EventDispatcher::new(
//!     ConsumerDirectory::with_base_url("https://fleet.example.com"),
//!     Arc::new(HttpEventSink::new(config.delivery_timeout)?),
//! );
//! let monitor = FleetMonitor::new(config, Arc::new(fetcher), dispatcher)?;
//! monitor.start().await;
//! ```

#![warn(missing_docs)]

mod config;
mod dispatch;
mod error;
mod fetch;
mod monitor;
mod rules;
mod suppression;
mod types;

pub use config::MonitorConfig;
pub use config::MonitorThresholds;
pub use dispatch::ConsumerDirectory;
pub use dispatch::DeliveryOutcome;
pub use dispatch::EventDispatcher;
pub use dispatch::EventSink;
pub use dispatch::HttpEventSink;
pub use dispatch::InMemoryEventSink;
pub use error::MonitorError;
pub use error::Result;
pub use fetch::HttpStatusFetcher;
pub use fetch::StatusFetcher;
pub use monitor::FleetMonitor;
pub use monitor::MonitorStats;
pub use rules::RuleEvaluator;
pub use suppression::SuppressionLedger;
pub use types::ActiveAlert;
pub use types::AlertSeverity;
pub use types::Consumer;
pub use types::CostSummary;
pub use types::EventPriority;
pub use types::EventType;
pub use types::FleetStatusSnapshot;
pub use types::MonitorEvent;
pub use types::ProviderHealth;
