// src/sweep.rs
//
// Periodic renewal/expiry sweep: walks live subscriptions whose period
// has ended and applies the boundary transition to each, one row per
// transaction. SKIP LOCKED keeps a concurrent admin action or a second
// sweep instance from colliding on the same row.

use chrono::Utc;
use sqlx::PgPool;
use std::time::Duration;

use crate::db;
use crate::domain::state::{transition, SubscriptionEvent};
use crate::error::ApiError;
use crate::ledger;

pub fn spawn_renewal_sweep(pool: PgPool) {
    let interval = std::env::var("RENEWAL_SWEEP_INTERVAL_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(300);
    let batch_size = std::env::var("RENEWAL_SWEEP_BATCH_SIZE")
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(100);

    tokio::spawn(async move {
        loop {
            match run_sweep_once(&pool, batch_size).await {
                Ok(0) => {}
                Ok(n) => log::info!("sweep applied {n} boundary transitions"),
                Err(e) => log::error!("sweep error: {e}"),
            }
            tokio::time::sleep(Duration::from_secs(interval)).await;
        }
    });
}

pub async fn run_sweep_once(pool: &PgPool, batch_size: i64) -> Result<u64, ApiError> {
    let now = Utc::now();
    let ids = db::due_subscription_ids(pool, now, batch_size).await?;
    let mut applied = 0;

    for id in ids {
        // A corrupt or contended row must not stall the rest of the batch.
        match apply_boundary(pool, id).await {
            Ok(true) => applied += 1,
            Ok(false) => {}
            Err(e) => log::error!("sweep skip subscription_id={id}: {e}"),
        }
    }

    Ok(applied)
}

async fn apply_boundary(pool: &PgPool, id: i32) -> Result<bool, ApiError> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    // Re-check under lock: the row may have been renewed or acted on
    // since it was listed.
    let Some(mut sub) = db::lock_due_subscription(&mut *tx, id, now).await? else {
        return Ok(false);
    };

    let t = transition(sub.state()?, SubscriptionEvent::PeriodBoundary)?;
    ledger::apply_transition(&mut *tx, &mut sub, t, now).await?;
    tx.commit().await?;

    log::info!("period boundary subscription_id={} -> {}", id, sub.status);
    Ok(true)
}
