// src/ingest/scheduler.rs
use crate::dedup::DedupEngine;
use crate::ingest::{types::SourceProvider, Outcome, Pipeline, SeenUrls, SEEN_URL_RETENTION};
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Poll all providers every `interval`; each announcement is processed in its own task.
pub fn spawn_poller(
    pipeline: Arc<Pipeline>,
    providers: Arc<Vec<Box<dyn SourceProvider>>>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;

            let outcomes = crate::ingest::run_once(&pipeline, &providers).await;
            let accepted = outcomes.iter().filter(|o| o.is_accepted()).count();
            let duplicates = outcomes
                .iter()
                .filter(|o| matches!(o, Outcome::Duplicate(_)))
                .count();

            counter!("ingest_runs_total").increment(1);
            tracing::info!(
                target: "ingest",
                seen = outcomes.len(),
                accepted,
                duplicates,
                skipped = outcomes.len() - accepted - duplicates,
                "poll tick"
            );
        }
    })
}

/// Evict expired window entries (and stale seen URLs) every `interval`.
pub fn spawn_evictor(engine: Arc<DedupEngine>, seen: Arc<SeenUrls>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let now = chrono::Utc::now();
            let evicted = engine.evict(now);
            let pruned = seen.prune_older_than(now, SEEN_URL_RETENTION);
            if evicted + pruned > 0 {
                tracing::debug!(target: "dedup", evicted, pruned, "eviction tick");
            }
        }
    })
}
