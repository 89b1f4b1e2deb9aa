//! Scheduler (§4.15): launches each worker on its cadence as an
//! independent asynchronous task. A failure in one worker is caught at
//! its own top level and logged; it never cancels its peers, and the
//! next tick retries independently.
//!
//! There is no real `waitUntil` host contract to hang tasks off here, so
//! each tick's tasks are spawned via `tokio::spawn` and their
//! `JoinHandle`s are awaited together — "awaited by the host runtime" is
//! modeled as the scheduler loop awaiting its own ticks.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info, instrument};

use crate::context::AppContext;
use crate::{classification_queue, feedback_sync, graph_sync, reconciliation, relational_sync, reputation_snapshot};

/// Cadence of the 15-minute tasks (Graph Sync, Relational Sync).
const FAST_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Cadence of the hourly tasks (Reconciliation, Feedback Sync, classification enqueue).
const HOURLY_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Cadence of the daily reputation snapshot.
const DAILY_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Agents enqueued for classification per hourly tick (§4.15 "cap 50").
pub const CLASSIFICATION_ENQUEUE_CAP: i64 = 50;

/// Drives three independent tickers for the cadences in §4.15, each
/// spawning its tasks and awaiting them before the next tick of that
/// cadence. Runs until the process is shut down; callers typically
/// `tokio::spawn` this and hold the returned handle for graceful
/// shutdown via `handle.abort()`.
pub async fn run(ctx: AppContext) {
    let fast = tokio::spawn(run_fast_loop(ctx.clone()));
    let hourly = tokio::spawn(run_hourly_loop(ctx.clone()));
    let daily = tokio::spawn(run_daily_loop(ctx));

    let _ = tokio::join!(fast, hourly, daily);
}

async fn run_fast_loop(ctx: AppContext) {
    let mut interval = tokio::time::interval(FAST_INTERVAL);
    loop {
        interval.tick().await;
        run_fast_tick(&ctx).await;
    }
}

async fn run_hourly_loop(ctx: AppContext) {
    let mut interval = tokio::time::interval(HOURLY_INTERVAL);
    loop {
        interval.tick().await;
        run_hourly_tick(&ctx).await;
    }
}

async fn run_daily_loop(ctx: AppContext) {
    let mut interval = tokio::time::interval(DAILY_INTERVAL);
    loop {
        interval.tick().await;
        run_daily_tick(&ctx).await;
    }
}

/// One 15-minute tick: Graph Sync and Relational Sync, concurrently.
#[instrument(skip(ctx))]
async fn run_fast_tick(ctx: &AppContext) {
    let graph: JoinHandle<()> = {
        let ctx = ctx.clone();
        tokio::spawn(async move { log_errors("graph_sync", graph_sync::run(&ctx)).await })
    };
    let relational: JoinHandle<()> = {
        let ctx = ctx.clone();
        tokio::spawn(async move { log_errors("relational_sync", relational_sync::run(&ctx)).await })
    };
    let _ = tokio::join!(graph, relational);
}

/// One hourly tick: Reconciliation, Feedback Sync, and a bounded
/// classification enqueue sweep.
#[instrument(skip(ctx))]
async fn run_hourly_tick(ctx: &AppContext) {
    let reconcile: JoinHandle<()> = {
        let ctx = ctx.clone();
        tokio::spawn(async move { log_errors("reconciliation", reconciliation::run(&ctx)).await })
    };
    let feedback: JoinHandle<()> = {
        let ctx = ctx.clone();
        tokio::spawn(async move { log_errors("feedback_sync", feedback_sync::run(&ctx)).await })
    };
    let enqueue: JoinHandle<()> = tokio::spawn(enqueue_classification_jobs(ctx.clone()));
    let _ = tokio::join!(reconcile, feedback, enqueue);

    if let Err(e) = classification_queue::run(ctx).await {
        error!(worker = "classification_queue", error = %e, "classification queue run failed");
    }
}

/// One 24-hour tick: the reputation snapshot.
#[instrument(skip(ctx))]
async fn run_daily_tick(ctx: &AppContext) {
    if let Err(e) = reputation_snapshot::run(ctx).await {
        error!(worker = "reputation_snapshot", error = %e, "reputation snapshot run failed");
    }
}

/// Enqueue unclassified agents, capped at [`CLASSIFICATION_ENQUEUE_CAP`]
/// per tick (§4.9, §4.15).
async fn enqueue_classification_jobs(ctx: AppContext) {
    let meta_repo = gateway_db::SyncMetadataRepository::new(&ctx.pool);
    let job_repo = gateway_db::JobRepository::new(&ctx.pool);

    let all_ids = match meta_repo.all_agent_ids().await {
        Ok(ids) => ids,
        Err(e) => {
            error!(worker = "classification_enqueue", error = %e, "failed to load agent ids");
            return;
        }
    };

    let unclassified = match job_repo.agent_ids_without_job(&all_ids, CLASSIFICATION_ENQUEUE_CAP).await {
        Ok(ids) => ids,
        Err(e) => {
            error!(worker = "classification_enqueue", error = %e, "failed to compute unclassified agents");
            return;
        }
    };

    let mut enqueued = 0u64;
    for agent_id in unclassified {
        if let Err(e) = job_repo.enqueue(&agent_id, false).await {
            error!(worker = "classification_enqueue", agent_id = %agent_id, error = %e, "failed to enqueue job");
            continue;
        }
        enqueued += 1;
    }
    if enqueued > 0 {
        info!(worker = "classification_enqueue", enqueued, "enqueued unclassified agents");
    }
}

/// Run a worker's future to completion, logging (never propagating) any
/// failure — the per-worker failure-isolation policy of §4.15.
async fn log_errors<T, E: std::fmt::Display>(name: &'static str, fut: impl std::future::Future<Output = Result<T, E>>) {
    if let Err(e) = fut.await {
        error!(worker = name, error = %e, "worker run failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cadences_match_the_documented_table() {
        assert_eq!(FAST_INTERVAL, Duration::from_secs(900));
        assert_eq!(HOURLY_INTERVAL, Duration::from_secs(3600));
        assert_eq!(DAILY_INTERVAL, Duration::from_secs(86_400));
        assert_eq!(CLASSIFICATION_ENQUEUE_CAP, 50);
    }
}
