//! Sync supervision: per-account supersede semantics and a whole-sync
//! deadline.
//!
//! The client itself holds no in-flight guard, so two overlapping
//! syncs for the same account would race with the later resolution
//! winning. The supervisor assigns each run a generation number per
//! account: when a run finishes after a newer one started, its result
//! is discarded as [`MeliError::Superseded`], making "newest wins"
//! deterministic. Every run is also wrapped in an explicit deadline so
//! a hung request cannot hang the dashboard indefinitely.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{instrument, warn};

use crate::client::MercadoLivreClient;
use crate::errors::{MeliError, MeliResult, NetworkError};
use crate::sync::SyncReport;
use crate::types::SellerAccount;

/// Default whole-sync deadline in seconds.
pub const DEFAULT_SYNC_TIMEOUT_SECS: u64 = 120;

/// Serializes the outcome (not the execution) of per-account syncs.
pub struct SyncSupervisor {
    timeout: Duration,
    generations: Mutex<HashMap<String, u64>>,
}

impl SyncSupervisor {
    /// Create a supervisor with the given whole-sync deadline.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            generations: Mutex::new(HashMap::new()),
        }
    }

    fn begin(&self, account_id: &str) -> u64 {
        let mut generations = self.generations.lock().expect("generation lock poisoned");
        let generation = generations.entry(account_id.to_string()).or_insert(0);
        *generation += 1;
        *generation
    }

    fn is_current(&self, account_id: &str, generation: u64) -> bool {
        self.generations
            .lock()
            .expect("generation lock poisoned")
            .get(account_id)
            .copied()
            == Some(generation)
    }

    /// Run one supervised sync.
    ///
    /// Returns the sync outcome, [`MeliError::Superseded`] when a newer
    /// sync for the same account started while this one ran, or a
    /// timeout error when the deadline elapsed.
    #[instrument(skip(self, client, account), fields(account_id = %account.id))]
    pub async fn sync(
        &self,
        client: &MercadoLivreClient,
        account: &SellerAccount,
    ) -> MeliResult<SyncReport> {
        let generation = self.begin(&account.id);

        let outcome = match tokio::time::timeout(self.timeout, client.sync_account(account)).await
        {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(timeout = ?self.timeout, "sync deadline elapsed");
                Err(MeliError::Network(NetworkError::Timeout {
                    timeout: self.timeout,
                }))
            }
        };

        if !self.is_current(&account.id, generation) {
            return Err(MeliError::Superseded {
                account_id: account.id.clone(),
            });
        }
        outcome
    }
}

impl Default for SyncSupervisor {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_SYNC_TIMEOUT_SECS))
    }
}

impl std::fmt::Debug for SyncSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSupervisor")
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MeliConfig;
    use crate::transport::{HttpRequest, HttpResponse, HttpTransport, MockTransport};
    use async_trait::async_trait;
    use std::sync::Arc;

    const GOOD_TOKEN: &str = "APP_USR-1234567890-123456-abcdef1234567890";

    /// Transport that waits before answering, to simulate slow upstreams.
    struct SlowTransport {
        delay: Duration,
        inner: MockTransport,
    }

    #[async_trait]
    impl HttpTransport for SlowTransport {
        async fn send(&self, request: HttpRequest) -> MeliResult<HttpResponse> {
            tokio::time::sleep(self.delay).await;
            self.inner.send(request).await
        }
    }

    fn queue_full_sync(mock: &MockTransport) {
        mock.queue_json(
            200,
            &serde_json::json!({"id": 999, "nickname": "loja_x", "email": "x@example.com"}),
        );
        mock.queue_json(200, &serde_json::json!({"results": []}));
        mock.queue_json(200, &serde_json::json!({"period_sales": 3}));
    }

    fn account() -> SellerAccount {
        SellerAccount::new("loja_x", "x@example.com").with_access_token(GOOD_TOKEN)
    }

    #[tokio::test]
    async fn test_supervised_sync_passes_through() {
        let mock = MockTransport::new();
        queue_full_sync(&mock);
        let client = MercadoLivreClient::with_transport(
            MeliConfig::default(),
            Arc::new(mock),
            GOOD_TOKEN,
            None,
        );
        let supervisor = SyncSupervisor::default();

        let report = supervisor.sync(&client, &account()).await.unwrap();
        assert_eq!(report.account.user_id, Some(999));
    }

    #[tokio::test]
    async fn test_deadline_elapses_into_timeout_error() {
        let mock = MockTransport::new();
        queue_full_sync(&mock);
        let slow = SlowTransport {
            delay: Duration::from_millis(200),
            inner: mock,
        };
        let client = MercadoLivreClient::with_transport(
            MeliConfig::default(),
            Arc::new(slow),
            GOOD_TOKEN,
            None,
        );
        let supervisor = SyncSupervisor::new(Duration::from_millis(50));

        let err = supervisor.sync(&client, &account()).await.unwrap_err();
        assert!(matches!(
            err,
            MeliError::Network(NetworkError::Timeout { .. })
        ));
    }

    #[tokio::test]
    async fn test_newer_sync_supersedes_older() {
        let slow_mock = MockTransport::new();
        queue_full_sync(&slow_mock);
        let slow_client = MercadoLivreClient::with_transport(
            MeliConfig::default(),
            Arc::new(SlowTransport {
                delay: Duration::from_millis(120),
                inner: slow_mock,
            }),
            GOOD_TOKEN,
            None,
        );

        let fast_mock = MockTransport::new();
        queue_full_sync(&fast_mock);
        let fast_client = MercadoLivreClient::with_transport(
            MeliConfig::default(),
            Arc::new(fast_mock),
            GOOD_TOKEN,
            None,
        );

        let supervisor = SyncSupervisor::new(Duration::from_secs(5));
        let account = account();

        let (older, newer) = tokio::join!(supervisor.sync(&slow_client, &account), async {
            // Let the slow sync register its generation first.
            tokio::time::sleep(Duration::from_millis(20)).await;
            supervisor.sync(&fast_client, &account).await
        });

        assert!(newer.is_ok());
        assert!(matches!(
            older.unwrap_err(),
            MeliError::Superseded { .. }
        ));
    }
}
