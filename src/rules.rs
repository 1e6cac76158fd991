//! Threshold rule evaluation over fleet status snapshots.
//!
//! Five independent checks run every sweep in a fixed order. Each check is
//! pure given the snapshot, the thresholds, and the suppression ledger; the
//! order only affects log readability. A failure inside one check is logged
//! and does not prevent the remaining checks from running.

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use snafu::ResultExt;
use tracing::{debug, warn};

use crate::config::MonitorThresholds;
use crate::error::{Result, RuleEvaluationSnafu};
use crate::suppression::SuppressionLedger;
use crate::types::{
    AlertSeverity, EventPriority, EventType, FleetStatusSnapshot, MonitorEvent,
};

/// Degraded-instance count above which the alert escalates to high priority.
const DEGRADED_HIGH_COUNT: u32 = 10;

/// Absolute cost deviation above which the anomaly escalates to high priority.
const COST_HIGH_DEVIATION_PCT: f32 = 25.0;

/// Provision queue depth above which the backlog escalates to high priority.
const BACKLOG_HIGH_DEPTH: u32 = 50;

/// Provider score below which degradation is critical rather than high.
const PROVIDER_CRITICAL_SCORE: u8 = 50;

/// Suppression window for repeat provider-health alerts.
const PROVIDER_SUPPRESSION_MINS: i64 = 60;

/// Evaluates the fixed rule set against each sweep's snapshot.
///
/// Owns the suppression ledger; one evaluator instance belongs to one
/// monitor, so no locking is needed beyond the monitor's own sweep guard.
pub struct RuleEvaluator {
    thresholds: MonitorThresholds,
    ledger: SuppressionLedger,
}

impl RuleEvaluator {
    /// Create an evaluator with the given thresholds and an empty ledger.
    pub fn new(thresholds: MonitorThresholds) -> Self {
        Self {
            thresholds,
            ledger: SuppressionLedger::new(),
        }
    }

    /// The suppression ledger, for inspection.
    pub fn ledger(&self) -> &SuppressionLedger {
        &self.ledger
    }

    /// Run all checks against `snapshot`, in fixed order.
    ///
    /// `previous` is the prior sweep's snapshot, consulted only by the fleet
    /// recovery check. Returns the candidate events in rule order.
    pub fn evaluate(
        &mut self,
        snapshot: &FleetStatusSnapshot,
        previous: Option<&FleetStatusSnapshot>,
        now: DateTime<Utc>,
    ) -> Vec<MonitorEvent> {
        let mut events = Vec::new();

        let results = [
            ("instance_health", self.check_instance_health(snapshot, now)),
            ("cost_anomaly", self.check_cost_anomaly(snapshot, now)),
            ("provision_backlog", self.check_provision_backlog(snapshot, now)),
            ("provider_health", self.check_provider_health(snapshot, now)),
            ("fleet_recovery", self.check_fleet_recovery(snapshot, previous, now)),
        ];

        for (rule, result) in results {
            match result {
                Ok(mut produced) => events.append(&mut produced),
                Err(error) => {
                    warn!(rule, error = %error, "rule evaluation failed; remaining rules continue");
                }
            }
        }

        events
    }

    /// Check 1: fleet-wide degraded and failed instance counts.
    ///
    /// Degraded alerts are debounced through the aggregate suppression slot;
    /// pair failures are safety-critical and never suppressed.
    fn check_instance_health(
        &mut self,
        snapshot: &FleetStatusSnapshot,
        now: DateTime<Utc>,
    ) -> Result<Vec<MonitorEvent>> {
        let mut events = Vec::new();

        if snapshot.degraded_instances > 0 {
            if self.ledger.aggregate_suppressed(now) {
                debug!(
                    degraded = snapshot.degraded_instances,
                    "degraded-instance alert suppressed"
                );
            } else {
                let until = now + Duration::minutes(self.thresholds.degraded_suppression_mins);
                let priority = if snapshot.degraded_instances > DEGRADED_HIGH_COUNT {
                    EventPriority::High
                } else {
                    EventPriority::Medium
                };
                let breakdown = serde_json::to_value(&snapshot.providers)
                    .context(RuleEvaluationSnafu { rule: "instance_health" })?;

                events.push(
                    MonitorEvent::new(
                        EventType::InstanceDegraded,
                        priority,
                        json!({
                            "message": format!(
                                "{} degraded instance(s) across the fleet",
                                snapshot.degraded_instances
                            ),
                            "degraded_instances": snapshot.degraded_instances,
                            "failed_instances": snapshot.failed_instances,
                            "instance_health_floor": self.thresholds.instance_health_floor,
                            "by_provider": breakdown,
                        }),
                        now,
                    )
                    .with_suppressed_until(until),
                );
                self.ledger.arm_aggregate(until);
            }
        } else {
            self.ledger.clear_aggregate();
        }

        if snapshot.failed_instances > 0 {
            let critical_alerts: Vec<_> = snapshot
                .active_alerts
                .iter()
                .filter(|alert| alert.severity == AlertSeverity::Critical)
                .collect();
            let alerts = serde_json::to_value(&critical_alerts)
                .context(RuleEvaluationSnafu { rule: "instance_health" })?;

            events.push(MonitorEvent::new(
                EventType::PairFailed,
                EventPriority::Critical,
                json!({
                    "message": format!(
                        "{} failed instance(s); pair integrity at risk",
                        snapshot.failed_instances
                    ),
                    "failed_instances": snapshot.failed_instances,
                    "critical_alerts": alerts,
                }),
                now,
            ));
        }

        Ok(events)
    }

    /// Check 2: actual versus projected spend. Never suppressed.
    fn check_cost_anomaly(
        &mut self,
        snapshot: &FleetStatusSnapshot,
        now: DateTime<Utc>,
    ) -> Result<Vec<MonitorEvent>> {
        let deviation = snapshot.cost.deviation_pct;
        if deviation.abs() < self.thresholds.cost_deviation_ceiling_pct {
            return Ok(Vec::new());
        }

        let priority = if deviation.abs() > COST_HIGH_DEVIATION_PCT {
            EventPriority::High
        } else {
            EventPriority::Medium
        };
        let direction = if deviation >= 0.0 { "over" } else { "under" };

        Ok(vec![MonitorEvent::new(
            EventType::CostAnomaly,
            priority,
            json!({
                "message": format!(
                    "Monthly spend {:.1}% {} projection",
                    deviation.abs(),
                    direction
                ),
                "monthly_actual_usd": snapshot.cost.monthly_actual_usd,
                "monthly_projected_usd": snapshot.cost.monthly_projected_usd,
                "deviation_pct": deviation,
                "direction": direction,
            }),
            now,
        )])
    }

    /// Check 3: provision queue depth. Never suppressed.
    fn check_provision_backlog(
        &mut self,
        snapshot: &FleetStatusSnapshot,
        now: DateTime<Utc>,
    ) -> Result<Vec<MonitorEvent>> {
        let depth = snapshot.bootstrapping_instances;
        if depth < self.thresholds.provision_queue_ceiling {
            return Ok(Vec::new());
        }

        let priority = if depth > BACKLOG_HIGH_DEPTH {
            EventPriority::High
        } else {
            EventPriority::Medium
        };

        Ok(vec![MonitorEvent::new(
            EventType::ProvisionQueueBacklog,
            priority,
            json!({
                "message": format!("{depth} instance(s) waiting in the provision queue"),
                "queue_depth": depth,
                "queue_ceiling": self.thresholds.provision_queue_ceiling,
            }),
            now,
        )])
    }

    /// Check 4: per-provider health scores.
    ///
    /// Each provider debounces independently; recovery deletes the ledger
    /// entry so the next degradation is reported promptly. Providers that
    /// left the snapshot are pruned from the ledger.
    fn check_provider_health(
        &mut self,
        snapshot: &FleetStatusSnapshot,
        now: DateTime<Utc>,
    ) -> Result<Vec<MonitorEvent>> {
        self.ledger
            .retain_providers(|provider| snapshot.providers.contains_key(provider));

        let mut providers: Vec<_> = snapshot.providers.iter().collect();
        providers.sort_by_key(|(name, _)| name.as_str());

        let mut events = Vec::new();
        for (name, health) in providers {
            if health.health_score < self.thresholds.provider_health_floor {
                if self.ledger.provider_suppressed(name, now) {
                    debug!(provider = %name, score = health.health_score, "provider alert suppressed");
                    continue;
                }

                let until = now + Duration::minutes(PROVIDER_SUPPRESSION_MINS);
                let priority = if health.health_score < PROVIDER_CRITICAL_SCORE {
                    EventPriority::Critical
                } else {
                    EventPriority::High
                };

                events.push(
                    MonitorEvent::new(
                        EventType::ProviderDegraded,
                        priority,
                        json!({
                            "message": format!(
                                "Provider {name} health at {} (floor {})",
                                health.health_score,
                                self.thresholds.provider_health_floor
                            ),
                            "provider": name,
                            "health_score": health.health_score,
                            "active_instances": health.active_instances,
                            "degraded_instances": health.degraded_instances,
                        }),
                        now,
                    )
                    .with_suppressed_until(until),
                );
                self.ledger.arm_provider(name, until);
            } else {
                self.ledger.clear_provider(name);
            }
        }

        Ok(events)
    }

    /// Check 5: edge detection for the transition into fleet health.
    ///
    /// Fires once on the transition, not on every healthy sweep.
    fn check_fleet_recovery(
        &mut self,
        snapshot: &FleetStatusSnapshot,
        previous: Option<&FleetStatusSnapshot>,
        now: DateTime<Utc>,
    ) -> Result<Vec<MonitorEvent>> {
        let Some(previous) = previous else {
            return Ok(Vec::new());
        };

        let was_unhealthy = previous.failed_instances > 0 || previous.degraded_instances > 0;
        let is_healthy = snapshot.failed_instances == 0 && snapshot.degraded_instances == 0;
        if !(was_unhealthy && is_healthy) {
            return Ok(Vec::new());
        }

        Ok(vec![MonitorEvent::new(
            EventType::FleetRecovering,
            EventPriority::Low,
            json!({
                "message": "Fleet recovered: no failed or degraded instances",
                "previous_failed_instances": previous.failed_instances,
                "previous_degraded_instances": previous.degraded_instances,
                "total_instances": snapshot.total_instances,
                "avg_health_score": snapshot.avg_health_score,
            }),
            now,
        )])
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use proptest::prelude::*;

    use super::*;
    use crate::types::{ActiveAlert, Consumer, CostSummary, ProviderHealth};

    fn healthy_snapshot() -> FleetStatusSnapshot {
        FleetStatusSnapshot {
            total_instances: 40,
            active_pairs: 20,
            degraded_instances: 0,
            failed_instances: 0,
            bootstrapping_instances: 0,
            avg_health_score: 96.0,
            cost: CostSummary {
                monthly_actual_usd: 500.0,
                monthly_projected_usd: 500.0,
                deviation_pct: 0.0,
            },
            providers: HashMap::from([(
                "hetzner".to_string(),
                ProviderHealth {
                    health_score: 95,
                    active_instances: 40,
                    degraded_instances: 0,
                },
            )]),
            active_alerts: Vec::new(),
        }
    }

    fn events_of(evaluator: &mut RuleEvaluator, snapshot: &FleetStatusSnapshot) -> Vec<MonitorEvent> {
        evaluator.evaluate(snapshot, None, Utc::now())
    }

    #[test]
    fn healthy_snapshot_produces_no_instance_events() {
        let mut evaluator = RuleEvaluator::new(MonitorThresholds::default());
        let events = events_of(&mut evaluator, &healthy_snapshot());

        assert!(events
            .iter()
            .all(|e| e.event_type != EventType::InstanceDegraded
                && e.event_type != EventType::PairFailed));
        assert!(events.is_empty());
    }

    #[test]
    fn degraded_count_selects_priority_band() {
        let mut evaluator = RuleEvaluator::new(MonitorThresholds::default());
        let mut snapshot = healthy_snapshot();
        snapshot.degraded_instances = 12;

        let events = events_of(&mut evaluator, &snapshot);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::InstanceDegraded);
        assert_eq!(events[0].priority, EventPriority::High);
        assert_eq!(events[0].target, Consumer::Guardian);
        assert!(events[0].suppressed_until.is_some());

        let mut evaluator = RuleEvaluator::new(MonitorThresholds::default());
        snapshot.degraded_instances = 3;
        let events = events_of(&mut evaluator, &snapshot);
        assert_eq!(events[0].priority, EventPriority::Medium);
    }

    #[test]
    fn degraded_alert_suppressed_within_window_and_reemits_after() {
        let mut evaluator = RuleEvaluator::new(MonitorThresholds::default());
        let mut snapshot = healthy_snapshot();
        snapshot.degraded_instances = 5;
        let start = Utc::now();

        let first = evaluator.evaluate(&snapshot, None, start);
        assert_eq!(first.len(), 1);

        // Second sweep inside the window: suppressed.
        let second = evaluator.evaluate(&snapshot, None, start + Duration::minutes(5));
        assert!(second.is_empty());

        // Third sweep after the window elapsed: re-emitted.
        let third = evaluator.evaluate(&snapshot, None, start + Duration::minutes(31));
        assert_eq!(third.len(), 1);
        assert_eq!(third[0].event_type, EventType::InstanceDegraded);
    }

    #[test]
    fn degraded_recovery_clears_the_aggregate_slot() {
        let mut evaluator = RuleEvaluator::new(MonitorThresholds::default());
        let mut snapshot = healthy_snapshot();
        snapshot.degraded_instances = 5;
        let start = Utc::now();

        evaluator.evaluate(&snapshot, None, start);

        // Condition clears, then recurs two minutes later: not blocked by
        // the earlier expiry.
        snapshot.degraded_instances = 0;
        evaluator.evaluate(&snapshot, None, start + Duration::minutes(1));

        snapshot.degraded_instances = 5;
        let events = evaluator.evaluate(&snapshot, None, start + Duration::minutes(2));
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn pair_failure_is_never_suppressed() {
        let mut evaluator = RuleEvaluator::new(MonitorThresholds::default());
        let mut snapshot = healthy_snapshot();
        snapshot.failed_instances = 2;
        snapshot.active_alerts = vec![
            ActiveAlert {
                severity: AlertSeverity::Critical,
                message: "primary unreachable".to_string(),
            },
            ActiveAlert {
                severity: AlertSeverity::Warning,
                message: "disk 82%".to_string(),
            },
        ];
        let start = Utc::now();

        for sweep in 0..3 {
            let events = evaluator.evaluate(&snapshot, None, start + Duration::minutes(sweep));
            let pair_failed: Vec<_> = events
                .iter()
                .filter(|e| e.event_type == EventType::PairFailed)
                .collect();
            assert_eq!(pair_failed.len(), 1, "sweep {sweep} must re-emit");
            assert_eq!(pair_failed[0].priority, EventPriority::Critical);
            // Only the critical-severity alerts ride along.
            let alerts = pair_failed[0].payload["critical_alerts"].as_array().unwrap();
            assert_eq!(alerts.len(), 1);
        }
    }

    #[test]
    fn cost_deviation_direction_follows_sign() {
        let mut evaluator = RuleEvaluator::new(MonitorThresholds::default());
        let mut snapshot = healthy_snapshot();
        snapshot.cost.deviation_pct = 16.0;

        let events = events_of(&mut evaluator, &snapshot);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::CostAnomaly);
        assert_eq!(events[0].payload["direction"], "over");
        assert_eq!(events[0].priority, EventPriority::Medium);
        assert_eq!(events[0].target, Consumer::Ledger);

        snapshot.cost.deviation_pct = -16.0;
        let events = events_of(&mut evaluator, &snapshot);
        assert_eq!(events[0].payload["direction"], "under");

        snapshot.cost.deviation_pct = -30.0;
        let events = events_of(&mut evaluator, &snapshot);
        assert_eq!(events[0].priority, EventPriority::High);
    }

    #[test]
    fn cost_below_ceiling_is_quiet() {
        let mut evaluator = RuleEvaluator::new(MonitorThresholds::default());
        let mut snapshot = healthy_snapshot();
        snapshot.cost.deviation_pct = 14.9;

        assert!(events_of(&mut evaluator, &snapshot).is_empty());
    }

    #[test]
    fn provision_backlog_bands_on_depth() {
        let mut evaluator = RuleEvaluator::new(MonitorThresholds::default());
        let mut snapshot = healthy_snapshot();

        snapshot.bootstrapping_instances = 19;
        assert!(events_of(&mut evaluator, &snapshot).is_empty());

        snapshot.bootstrapping_instances = 20;
        let events = events_of(&mut evaluator, &snapshot);
        assert_eq!(events[0].event_type, EventType::ProvisionQueueBacklog);
        assert_eq!(events[0].priority, EventPriority::Medium);
        assert_eq!(events[0].target, Consumer::Forge);

        snapshot.bootstrapping_instances = 51;
        let events = events_of(&mut evaluator, &snapshot);
        assert_eq!(events[0].priority, EventPriority::High);
    }

    #[test]
    fn provider_degradation_suppresses_then_clears_on_recovery() {
        let mut evaluator = RuleEvaluator::new(MonitorThresholds::default());
        let mut snapshot = healthy_snapshot();
        let start = Utc::now();

        let set_score = |snapshot: &mut FleetStatusSnapshot, score: u8| {
            snapshot.providers.insert(
                "hetzner".to_string(),
                ProviderHealth {
                    health_score: score,
                    active_instances: 40,
                    degraded_instances: 0,
                },
            );
        };

        // 80 -> 60 (floor 75): exactly one event.
        set_score(&mut snapshot, 60);
        let events = evaluator.evaluate(&snapshot, None, start);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::ProviderDegraded);
        assert_eq!(events[0].priority, EventPriority::High);
        assert_eq!(events[0].target, Consumer::Commander);

        // Still 60 within the hour: none.
        let events = evaluator.evaluate(&snapshot, None, start + Duration::minutes(30));
        assert!(events.is_empty());

        // Recovers to 80, then re-degrades to 60: a fresh event, because
        // recovery deleted the ledger entry.
        set_score(&mut snapshot, 80);
        evaluator.evaluate(&snapshot, None, start + Duration::minutes(35));
        set_score(&mut snapshot, 60);
        let events = evaluator.evaluate(&snapshot, None, start + Duration::minutes(40));
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn provider_reemits_after_hour_window() {
        let mut evaluator = RuleEvaluator::new(MonitorThresholds::default());
        let mut snapshot = healthy_snapshot();
        snapshot.providers.insert(
            "vultr".to_string(),
            ProviderHealth {
                health_score: 40,
                active_instances: 10,
                degraded_instances: 6,
            },
        );
        let start = Utc::now();

        let events = evaluator.evaluate(&snapshot, None, start);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].priority, EventPriority::Critical);

        let events = evaluator.evaluate(&snapshot, None, start + Duration::minutes(61));
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn decommissioned_provider_is_pruned_from_ledger() {
        let mut evaluator = RuleEvaluator::new(MonitorThresholds::default());
        let mut snapshot = healthy_snapshot();
        snapshot.providers.insert(
            "contabo".to_string(),
            ProviderHealth {
                health_score: 60,
                active_instances: 5,
                degraded_instances: 2,
            },
        );
        let start = Utc::now();
        evaluator.evaluate(&snapshot, None, start);
        assert_eq!(evaluator.ledger().provider_entry_count(), 1);

        snapshot.providers.remove("contabo");
        evaluator.evaluate(&snapshot, None, start + Duration::minutes(1));
        assert_eq!(evaluator.ledger().provider_entry_count(), 0);
    }

    #[test]
    fn recovery_fires_only_on_the_edge() {
        let mut evaluator = RuleEvaluator::new(MonitorThresholds::default());
        let now = Utc::now();

        let mut unhealthy = healthy_snapshot();
        unhealthy.failed_instances = 3;
        let healthy = healthy_snapshot();

        // Edge: previous had failures, current has none.
        let events = evaluator.evaluate(&healthy, Some(&unhealthy), now);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::FleetRecovering);
        assert_eq!(events[0].priority, EventPriority::Low);
        assert_eq!(events[0].payload["previous_failed_instances"], 3);

        // No edge: previous already healthy.
        let events = evaluator.evaluate(&healthy, Some(&healthy), now);
        assert!(events.is_empty());

        // No previous snapshot at all.
        let events = evaluator.evaluate(&healthy, None, now);
        assert!(events.is_empty());
    }

    proptest! {
        #[test]
        fn degraded_priority_banding(count in 1u32..200) {
            let mut evaluator = RuleEvaluator::new(MonitorThresholds::default());
            let mut snapshot = healthy_snapshot();
            snapshot.degraded_instances = count;

            let events = evaluator.evaluate(&snapshot, None, Utc::now());
            let expected = if count > 10 { EventPriority::High } else { EventPriority::Medium };
            prop_assert_eq!(events[0].priority, expected);
        }

        #[test]
        fn cost_anomaly_fires_iff_abs_deviation_meets_ceiling(deviation in -60.0f32..60.0) {
            let mut evaluator = RuleEvaluator::new(MonitorThresholds::default());
            let mut snapshot = healthy_snapshot();
            snapshot.cost.deviation_pct = deviation;

            let events = evaluator.evaluate(&snapshot, None, Utc::now());
            let fired = events.iter().any(|e| e.event_type == EventType::CostAnomaly);
            prop_assert_eq!(fired, deviation.abs() >= 15.0);
        }
    }
}
