use crate::domain_port::*;
use crate::logger::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Periodically drops expired verifier records.
pub struct Sweeper {
    verifier_store: Arc<dyn VerifierStore>,
    period: Duration,
    cancellation_token: CancellationToken,
}

impl Sweeper {
    pub fn new(
        verifier_store: Arc<dyn VerifierStore>,
        period: Duration,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            verifier_store,
            period,
            cancellation_token,
        }
    }

    pub async fn tick_once(&self) -> Result<u64, VerifierStoreError> {
        let purged = self.verifier_store.purge_expired().await?;
        if purged > 0 {
            debug!(purged, "purged expired verifiers");
        }
        Ok(purged)
    }

    pub async fn run(&self) {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.cancellation_token.cancelled() => {
                    info!("Sweeper shutting down...");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.tick_once().await {
                        warn!("Sweeper error: {}", e);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain_model::*;
    use crate::infra_memory::MemoryVerifierStore;
    use chrono::Utc;

    fn record(subject: &str) -> VerifierRecord {
        VerifierRecord {
            subject: SubjectId::from(subject),
            session_id: SessionId::new(),
            verifier: RefreshVerifier("v".to_string()),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn tick_purges_expired_records() {
        let store = Arc::new(MemoryVerifierStore::new());
        store.store_verifier(&record("1"), 0).await.unwrap();
        store.store_verifier(&record("2"), 60).await.unwrap();
        let sweeper = Sweeper::new(
            store.clone(),
            Duration::from_secs(60),
            CancellationToken::new(),
        );

        assert_eq!(sweeper.tick_once().await.unwrap(), 1);
        assert_eq!(sweeper.tick_once().await.unwrap(), 0);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn run_stops_on_cancel() {
        let cancel = CancellationToken::new();
        let sweeper = Sweeper::new(
            Arc::new(MemoryVerifierStore::new()),
            Duration::from_millis(10),
            cancel.clone(),
        );
        let handle = tokio::spawn(async move { sweeper.run().await });

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
