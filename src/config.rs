//! Monitor configuration with validation.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{InvalidConfigSnafu, Result};

/// Threshold knobs for the rule evaluator.
///
/// Defaults are fixed constants; any subset may be overridden at
/// construction with struct-update syntax:
///
/// ```
/// use fleetwatch::MonitorThresholds;
///
/// let thresholds = MonitorThresholds {
///     provider_health_floor: 80,
///     ..MonitorThresholds::default()
/// };
/// assert!(thresholds.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorThresholds {
    /// Health score below which an instance counts as degraded (0-100).
    pub instance_health_floor: u8,

    /// Absolute cost deviation (percentage points) that triggers an anomaly.
    pub cost_deviation_ceiling_pct: f32,

    /// Bootstrapping-instance count that triggers a backlog alert.
    pub provision_queue_ceiling: u32,

    /// Health score below which a provider counts as degraded (0-100).
    pub provider_health_floor: u8,

    /// Minutes to suppress repeat fleet-wide degraded-instance alerts.
    pub degraded_suppression_mins: i64,
}

impl Default for MonitorThresholds {
    fn default() -> Self {
        Self {
            instance_health_floor: 70,
            cost_deviation_ceiling_pct: 15.0,
            provision_queue_ceiling: 20,
            provider_health_floor: 75,
            degraded_suppression_mins: 30,
        }
    }
}

impl MonitorThresholds {
    /// Validate threshold values.
    pub fn validate(&self) -> Result<()> {
        if self.instance_health_floor > 100 {
            return InvalidConfigSnafu {
                reason: "instance_health_floor must be <= 100",
            }
            .fail();
        }

        if self.provider_health_floor > 100 {
            return InvalidConfigSnafu {
                reason: "provider_health_floor must be <= 100",
            }
            .fail();
        }

        if !self.cost_deviation_ceiling_pct.is_finite() || self.cost_deviation_ceiling_pct <= 0.0 {
            return InvalidConfigSnafu {
                reason: "cost_deviation_ceiling_pct must be a positive number",
            }
            .fail();
        }

        if self.provision_queue_ceiling < 1 {
            return InvalidConfigSnafu {
                reason: "provision_queue_ceiling must be >= 1",
            }
            .fail();
        }

        if self.degraded_suppression_mins < 1 {
            return InvalidConfigSnafu {
                reason: "degraded_suppression_mins must be >= 1",
            }
            .fail();
        }

        Ok(())
    }
}

/// Configuration for the fleet monitor.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Interval between sweeps (default: 5 minutes).
    pub sweep_interval: Duration,
    /// Timeout for the snapshot fetch (default: 15 seconds).
    pub fetch_timeout: Duration,
    /// Timeout for each individual event delivery (default: 10 seconds).
    pub delivery_timeout: Duration,
    /// Rule evaluator thresholds.
    pub thresholds: MonitorThresholds,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_millis(300_000),
            fetch_timeout: Duration::from_secs(15),
            delivery_timeout: Duration::from_secs(10),
            thresholds: MonitorThresholds::default(),
        }
    }
}

impl MonitorConfig {
    /// Validate configuration values, including the nested thresholds.
    pub fn validate(&self) -> Result<()> {
        self.thresholds.validate()?;

        if self.sweep_interval.is_zero() {
            return InvalidConfigSnafu {
                reason: "sweep_interval must be non-zero",
            }
            .fail();
        }

        if self.fetch_timeout.is_zero() || self.fetch_timeout >= self.sweep_interval {
            return InvalidConfigSnafu {
                reason: "fetch_timeout must be non-zero and shorter than sweep_interval",
            }
            .fail();
        }

        if self.delivery_timeout.is_zero() || self.delivery_timeout >= self.sweep_interval {
            return InvalidConfigSnafu {
                reason: "delivery_timeout must be non-zero and shorter than sweep_interval",
            }
            .fail();
        }

        Ok(())
    }
}
