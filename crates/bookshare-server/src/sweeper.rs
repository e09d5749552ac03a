use std::time::Duration;

use bookshare_api::state::AppState;
use bookshare_db::Database;
use bookshare_db::models::SweepReport;
use chrono::TimeDelta;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Background task that deactivates stale listings.
///
/// Runs on an interval until stopped. Each pass runs on the blocking pool and
/// only ever flips listings from active to inactive.
pub struct ExpirySweeper {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl ExpirySweeper {
    pub fn start(state: AppState, retention: TimeDelta, interval: Duration) -> Self {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_sweep_loop(state, retention, interval, cancel.clone()));
        info!(
            "Expiry sweeper started (retention {} days, every {:?})",
            retention.num_days(),
            interval
        );
        Self { cancel, handle }
    }

    /// Stop the loop and wait for an in-flight pass to finish.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            warn!("Expiry sweeper ended abnormally: {}", e);
        }
        info!("Expiry sweeper stopped");
    }
}

async fn run_sweep_loop(
    state: AppState,
    retention: TimeDelta,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match sweep_once(state.clone(), retention).await {
            Ok(report) => {
                if report.failed > 0 {
                    warn!("Expiry: {} of {} listings could not be deactivated", report.failed, report.examined);
                }
            }
            Err(e) => {
                warn!("Expiry sweep error: {}", e);
            }
        }
    }
}

async fn sweep_once(state: AppState, retention: TimeDelta) -> anyhow::Result<SweepReport> {
    let report = tokio::task::spawn_blocking(move || {
        let db: &Database = &state.db;
        db.expire_stale_listings(retention)
    })
    .await??;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bookshare_api::state::AppStateInner;

    use super::*;

    #[tokio::test]
    async fn sweeper_deactivates_until_stopped() {
        let db = Database::open_in_memory().unwrap();
        let owner = db.create_user("ccc", "ccc@gmail.com", "hash", None, None).unwrap();
        let book = db.create_book("Hamlet", "William Shakespeare").unwrap().unwrap();
        let listing = db.create_listing(book.id, owner, 50, 5, "").unwrap();
        let state: AppState = Arc::new(AppStateInner {
            db,
            jwt_secret: "test".into(),
        });

        let sweeper = ExpirySweeper::start(state.clone(), TimeDelta::zero(), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(100)).await;
        sweeper.stop().await;

        let after = state.db.get_listing(listing.id).unwrap();
        assert!(!after.is_active);
        assert_eq!(state.db.get_book(book.id).unwrap().instance_counter, 1);
    }

    #[tokio::test]
    async fn fresh_listings_survive_a_pass() {
        let db = Database::open_in_memory().unwrap();
        let owner = db.create_user("ccc", "ccc@gmail.com", "hash", None, None).unwrap();
        let book = db.create_book("Hamlet", "William Shakespeare").unwrap().unwrap();
        let listing = db.create_listing(book.id, owner, 50, 5, "").unwrap();
        let state: AppState = Arc::new(AppStateInner {
            db,
            jwt_secret: "test".into(),
        });

        let report = sweep_once(state.clone(), TimeDelta::days(30)).await.unwrap();
        assert_eq!(report.examined, 0);
        assert!(state.db.get_listing(listing.id).unwrap().is_active);
    }
}
