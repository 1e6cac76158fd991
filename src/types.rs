//! Shared types: the fleet status snapshot consumed per sweep and the
//! monitor events produced for downstream consumers.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Aggregate fleet status snapshot, one consistent read per sweep.
///
/// Supplied by the external fleet-management service; immutable once fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetStatusSnapshot {
    /// Total instances under management.
    pub total_instances: u32,
    /// Primary/standby pairs currently active.
    #[serde(default)]
    pub active_pairs: u32,
    /// Instances in a degraded state.
    pub degraded_instances: u32,
    /// Instances that have failed.
    pub failed_instances: u32,
    /// Instances still bootstrapping (provision queue depth).
    pub bootstrapping_instances: u32,
    /// Mean health score across the fleet (0-100).
    #[serde(default)]
    pub avg_health_score: f32,
    /// Monthly cost summary.
    pub cost: CostSummary,
    /// Per-provider health, keyed by provider identifier.
    pub providers: HashMap<String, ProviderHealth>,
    /// Alerts currently active fleet-wide.
    #[serde(default)]
    pub active_alerts: Vec<ActiveAlert>,
}

/// Actual versus projected monthly spend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostSummary {
    /// Actual monthly spend in USD.
    pub monthly_actual_usd: f64,
    /// Projected monthly spend in USD.
    pub monthly_projected_usd: f64,
    /// Signed deviation of actual from projected, in percentage points.
    pub deviation_pct: f32,
}

/// Health summary for a single provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderHealth {
    /// Provider health score (0-100).
    pub health_score: u8,
    /// Active instances at this provider.
    pub active_instances: u32,
    /// Degraded instances at this provider.
    pub degraded_instances: u32,
}

/// An alert currently active in the fleet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveAlert {
    /// Alert severity.
    pub severity: AlertSeverity,
    /// Human-readable alert message.
    pub message: String,
}

/// Severity of an active alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    /// Informational only.
    Info,
    /// Needs attention but not user-impacting.
    Warning,
    /// User-impacting or data-loss risk.
    Critical,
}

/// The kind of condition a monitor event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// One or more instances degraded fleet-wide.
    InstanceDegraded,
    /// A single instance has failed.
    InstanceFailed,
    /// One or more primary/standby pairs have failed.
    PairFailed,
    /// Actual spend deviates from projection beyond the ceiling.
    CostAnomaly,
    /// Provision queue depth at or above the ceiling.
    ProvisionQueueBacklog,
    /// A provider's health score dropped below the floor.
    ProviderDegraded,
    /// The fleet transitioned from unhealthy to healthy.
    FleetRecovering,
    /// The fleet is fully healthy.
    FleetHealthy,
}

impl EventType {
    /// The consumer this kind of event is addressed to.
    pub fn default_target(&self) -> Consumer {
        match self {
            Self::InstanceDegraded | Self::InstanceFailed | Self::PairFailed => Consumer::Guardian,
            Self::CostAnomaly => Consumer::Ledger,
            Self::ProvisionQueueBacklog => Consumer::Forge,
            Self::ProviderDegraded => Consumer::Commander,
            Self::FleetRecovering | Self::FleetHealthy => Consumer::Briefer,
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::InstanceDegraded => "INSTANCE_DEGRADED",
            Self::InstanceFailed => "INSTANCE_FAILED",
            Self::PairFailed => "PAIR_FAILED",
            Self::CostAnomaly => "COST_ANOMALY",
            Self::ProvisionQueueBacklog => "PROVISION_QUEUE_BACKLOG",
            Self::ProviderDegraded => "PROVIDER_DEGRADED",
            Self::FleetRecovering => "FLEET_RECOVERING",
            Self::FleetHealthy => "FLEET_HEALTHY",
        };
        write!(f, "{name}")
    }
}

/// Priority tier of a monitor event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventPriority {
    /// Informational; safe to batch.
    Low,
    /// Attention within normal operations.
    Medium,
    /// Prompt attention expected.
    High,
    /// Safety-critical; act immediately.
    Critical,
}

impl std::fmt::Display for EventPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        write!(f, "{name}")
    }
}

/// Downstream agent identities events are addressed to.
///
/// `Triage` is provisioned on demand and has no delivery address in the
/// static directory; its events are logged and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Consumer {
    /// Fleet orchestrator.
    Commander,
    /// Health and auto-heal agent.
    Guardian,
    /// Provisioning agent.
    Forge,
    /// Cost analysis agent.
    Ledger,
    /// Reporting agent.
    Briefer,
    /// On-demand incident agent.
    Triage,
}

impl std::fmt::Display for Consumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Commander => "commander",
            Self::Guardian => "guardian",
            Self::Forge => "forge",
            Self::Ledger => "ledger",
            Self::Briefer => "briefer",
            Self::Triage => "triage",
        };
        write!(f, "{name}")
    }
}

/// A typed, targeted notification produced by one rule evaluation.
///
/// Immutable once created. The payload carries human-readable context plus
/// the numeric evidence behind the decision; `suppressed_until` advises the
/// consumer when the same condition may next be expected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorEvent {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Condition kind.
    pub event_type: EventType,
    /// Priority tier.
    pub priority: EventPriority,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Consumer this event is addressed to.
    pub target: Consumer,
    /// Context and numeric evidence for the decision.
    pub payload: serde_json::Value,
    /// When the same condition may next be re-notified, if suppressed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suppressed_until: Option<DateTime<Utc>>,
}

impl MonitorEvent {
    /// Create a new event addressed to the event type's default consumer.
    pub fn new(
        event_type: EventType,
        priority: EventPriority,
        payload: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type,
            priority,
            created_at: now,
            target: event_type.default_target(),
            payload,
            suppressed_until: None,
        }
    }

    /// Attach a suppression-window hint for the consumer.
    pub fn with_suppressed_until(mut self, until: DateTime<Utc>) -> Self {
        self.suppressed_until = Some(until);
        self
    }
}
