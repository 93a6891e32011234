use crate::errors::GasResult;
use crate::gas_client::GasClient;
use crate::models::GasData;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// Result of the latest successful refresh.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub updated_at: DateTime<Utc>,
    pub accounts: GasData,
}

/// Outcome bookkeeping across refreshes.
///
/// `last_error` describes a failure newer than `last_success`; a successful
/// refresh clears it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RefreshStatus {
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub account_count: usize,
}

/// Periodically runs the aggregate fetch and keeps the latest good snapshot.
///
/// A failed refresh never clears the previous snapshot.
pub struct Coordinator {
    client: GasClient,
    interval: Duration,
    snapshot: RwLock<Option<Arc<Snapshot>>>,
    status: RwLock<RefreshStatus>,
}

impl Coordinator {
    pub fn new(client: GasClient, interval: Duration) -> Self {
        Self {
            client,
            interval,
            snapshot: RwLock::new(None),
            status: RwLock::new(RefreshStatus::default()),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub async fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.snapshot.read().await.clone()
    }

    pub async fn status(&self) -> RefreshStatus {
        self.status.read().await.clone()
    }

    /// Fetches all accounts now and publishes the result.
    pub async fn refresh(&self) -> GasResult<Arc<Snapshot>> {
        match self.client.async_get_data().await {
            Ok(accounts) => {
                let snapshot = Arc::new(Snapshot {
                    updated_at: Utc::now(),
                    accounts,
                });
                *self.snapshot.write().await = Some(snapshot.clone());

                let mut status = self.status.write().await;
                status.last_success = Some(snapshot.updated_at);
                status.account_count = snapshot.accounts.len();
                status.last_error = None;
                status.last_error_at = None;
                tracing::info!(
                    "✓ Gas data refreshed: {} accounts",
                    snapshot.accounts.len()
                );
                Ok(snapshot)
            }
            Err(e) => {
                tracing::error!("Gas data refresh failed: {}", e);
                let mut status = self.status.write().await;
                status.last_error = Some(e.to_string());
                status.last_error_at = Some(Utc::now());
                Err(e)
            }
        }
    }

    /// Refreshes on every tick of the configured interval, starting now.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            // Failure is already recorded in the status; keep polling.
            let _ = self.refresh().await;
        }
    }

    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(self.clone().run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Credentials;

    fn coordinator(base_url: &str) -> Coordinator {
        let credentials = Credentials {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            encrypted_username: "user".to_string(),
            encrypted_password: "pass".to_string(),
        };
        let client = GasClient::new(base_url, credentials).unwrap();
        Coordinator::new(client, Duration::from_secs(600))
    }

    #[tokio::test]
    async fn test_failed_refresh_records_error() {
        // Nothing listens on port 9; the token exchange fails at transport level.
        let coordinator = coordinator("http://127.0.0.1:9");
        assert!(coordinator.snapshot().await.is_none());

        let result = coordinator.refresh().await;
        assert!(result.is_err());
        assert!(coordinator.snapshot().await.is_none());

        let status = coordinator.status().await;
        assert!(status.last_error.is_some());
        assert!(status.last_error_at.is_some());
        assert!(status.last_success.is_none());
    }
}
