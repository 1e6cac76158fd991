//! Error types for the fleet monitor.

use snafu::Snafu;

/// Result type for monitor operations.
pub type Result<T, E = MonitorError> = std::result::Result<T, E>;

/// Errors that can occur in the fleet monitor.
///
/// No variant is ever allowed to stop the scheduler: fetch failures abort a
/// single sweep, rule failures are isolated to the failing rule, and delivery
/// failures are logged and swallowed by the dispatcher.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum MonitorError {
    /// HTTP client construction failed.
    #[snafu(display("Failed to build HTTP client: {source}"))]
    HttpClient {
        /// Source error.
        source: reqwest::Error,
    },

    /// Snapshot fetch failed at the transport level.
    #[snafu(display("Snapshot fetch failed: {source}"))]
    SnapshotFetch {
        /// Source error.
        source: reqwest::Error,
    },

    /// Snapshot endpoint returned a non-success status.
    #[snafu(display("Snapshot endpoint returned HTTP {status}"))]
    SnapshotStatus {
        /// HTTP status code returned.
        status: u16,
    },

    /// Snapshot body could not be decoded.
    #[snafu(display("Snapshot decode failed: {source}"))]
    SnapshotDecode {
        /// Source error.
        source: reqwest::Error,
    },

    /// Snapshot unavailable for a non-HTTP reason.
    ///
    /// Used by fetchers that are not backed by an HTTP transport.
    #[snafu(display("Snapshot unavailable: {reason}"))]
    SnapshotUnavailable {
        /// Failure reason.
        reason: String,
    },

    /// Monitor thresholds or configuration out of range.
    #[snafu(display("Invalid monitor configuration: {reason}"))]
    InvalidConfig {
        /// Reason the configuration is invalid.
        reason: String,
    },

    /// A single rule failed to evaluate.
    #[snafu(display("Rule {rule} evaluation failed: {source}"))]
    RuleEvaluation {
        /// Name of the failing rule.
        rule: &'static str,
        /// Source error.
        source: serde_json::Error,
    },

    /// Event delivery to a consumer failed.
    #[snafu(display("Delivery to {target} failed: {reason}"))]
    Delivery {
        /// Consumer the delivery was addressed to.
        target: String,
        /// Failure reason.
        reason: String,
    },
}

impl MonitorError {
    /// Whether the error is expected to clear on its own by the next sweep.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::SnapshotFetch { .. }
            | Self::SnapshotStatus { .. }
            | Self::SnapshotUnavailable { .. }
            | Self::Delivery { .. } => true,
            Self::HttpClient { .. }
            | Self::SnapshotDecode { .. }
            | Self::InvalidConfig { .. }
            | Self::RuleEvaluation { .. } => false,
        }
    }
}
