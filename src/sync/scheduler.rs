// file: src/sync/scheduler.rs
use super::reconciler::Reconciler;
use log::info;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Runs `sync_all` right away and then every `interval` until `shutdown` is
/// cancelled. A run in progress is allowed to finish.
pub async fn run(reconciler: Arc<Reconciler>, interval: Duration, shutdown: CancellationToken) -> usize {
    info!("Starting sync loop, interval {:?}", interval);
    let mut ticks = 0;

    loop {
        if shutdown.is_cancelled() {
            info!("Shutdown signal received, stopping sync loop");
            break;
        }

        reconciler.sync_all().await;
        ticks += 1;

        tokio::select! {
            _ = sleep(interval) => {}
            _ = shutdown.cancelled() => {
                info!("Shutdown signal received during sleep, stopping sync loop");
                break;
            }
        }
    }

    info!("Sync loop stopped after {} ticks", ticks);
    ticks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{MockSinkAdapter, MockSourceAdapter};
    use crate::database::{test_pool, Database};

    async fn idle_reconciler() -> Arc<Reconciler> {
        let db = Database::from_pool(test_pool().await).await.unwrap();
        Arc::new(Reconciler::new(
            db,
            Arc::new(MockSourceAdapter::new()),
            Arc::new(MockSinkAdapter::new()),
            2,
        ))
    }

    #[tokio::test]
    async fn test_cancelled_before_start_runs_nothing() {
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let ticks = run(idle_reconciler().await, Duration::from_secs(60), shutdown).await;
        assert_eq!(ticks, 0);
    }

    #[tokio::test]
    async fn test_stops_during_sleep() {
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(run(idle_reconciler().await, Duration::from_secs(3600), shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.cancel();

        let ticks = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ticks, 1);
    }
}
