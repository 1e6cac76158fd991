//! Suppression ledger for debouncing repeat alerts.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

/// Keyed expiry stores that debounce repeat notifications.
///
/// Two independent stores: a single aggregate slot for fleet-wide
/// degraded-instance alerts, and a per-provider map for provider-health
/// alerts. An armed entry with a future expiry blocks re-emission; an absent
/// or expired entry permits emission. Entries are removed outright when the
/// underlying condition clears, so a condition that recovers and later
/// recurs is not blocked by stale history.
///
/// All checks take an explicit `now` so expiry behavior is testable without
/// waiting on wall-clock time.
#[derive(Debug, Default)]
pub struct SuppressionLedger {
    /// Expiry for the fleet-wide degraded-instance alert.
    aggregate: Option<DateTime<Utc>>,
    /// Expiries for provider-health alerts, keyed by provider identifier.
    providers: HashMap<String, DateTime<Utc>>,
}

impl SuppressionLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the fleet-wide degraded-instance alert is currently blocked.
    pub fn aggregate_suppressed(&self, now: DateTime<Utc>) -> bool {
        self.aggregate.is_some_and(|expiry| expiry > now)
    }

    /// Arm the aggregate slot until `until`.
    pub fn arm_aggregate(&mut self, until: DateTime<Utc>) {
        self.aggregate = Some(until);
    }

    /// Remove the aggregate slot (condition cleared).
    pub fn clear_aggregate(&mut self) {
        self.aggregate = None;
    }

    /// Whether the alert for `provider` is currently blocked.
    pub fn provider_suppressed(&self, provider: &str, now: DateTime<Utc>) -> bool {
        self.providers
            .get(provider)
            .is_some_and(|expiry| *expiry > now)
    }

    /// Arm the entry for `provider` until `until`.
    pub fn arm_provider(&mut self, provider: &str, until: DateTime<Utc>) {
        self.providers.insert(provider.to_string(), until);
    }

    /// Remove the entry for `provider` (condition cleared).
    pub fn clear_provider(&mut self, provider: &str) {
        self.providers.remove(provider);
    }

    /// Drop provider entries not accepted by `keep`.
    ///
    /// Used to prune history for providers that no longer appear in the
    /// snapshot, so a decommissioned provider leaves nothing stale behind.
    pub fn retain_providers<F>(&mut self, keep: F)
    where
        F: Fn(&str) -> bool,
    {
        self.providers.retain(|provider, _| keep(provider));
    }

    /// Number of armed provider entries, expired or not.
    pub fn provider_entry_count(&self) -> usize {
        self.providers.len()
    }
}
