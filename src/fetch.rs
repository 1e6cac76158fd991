//! Snapshot fetching from the fleet-management service.

use std::time::Duration;

use async_trait::async_trait;
use snafu::ResultExt;

use crate::error::{HttpClientSnafu, Result, SnapshotDecodeSnafu, SnapshotFetchSnafu, SnapshotStatusSnafu};
use crate::types::FleetStatusSnapshot;

/// Source of fleet status snapshots.
///
/// One read per sweep; the operation must be idempotent and side-effect-free
/// from the monitor's perspective.
#[async_trait]
pub trait StatusFetcher: Send + Sync {
    /// Fetch one consistent snapshot of current fleet state.
    async fn fetch_snapshot(&self) -> Result<FleetStatusSnapshot>;
}

/// Fetcher backed by the fleet-management HTTP status endpoint.
pub struct HttpStatusFetcher {
    client: reqwest::Client,
    status_url: String,
}

impl HttpStatusFetcher {
    /// Create a fetcher for `status_url` with a bounded request timeout.
    pub fn new(status_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context(HttpClientSnafu)?;

        Ok(Self {
            client,
            status_url: status_url.into(),
        })
    }
}

#[async_trait]
impl StatusFetcher for HttpStatusFetcher {
    async fn fetch_snapshot(&self) -> Result<FleetStatusSnapshot> {
        let response = self
            .client
            .get(&self.status_url)
            .send()
            .await
            .context(SnapshotFetchSnafu)?;

        let status = response.status();
        if !status.is_success() {
            return SnapshotStatusSnafu {
                status: status.as_u16(),
            }
            .fail();
        }

        response
            .json::<FleetStatusSnapshot>()
            .await
            .context(SnapshotDecodeSnafu)
    }
}
