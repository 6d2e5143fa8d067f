use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder and expose the configured retention horizon.
    pub fn init(retention_secs: u64) -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;

        // Descriptions sent before the recorder existed went nowhere.
        describe_all();
        gauge!("window_retention_secs").set(retention_secs as f64);

        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(describe_all);
}

fn describe_all() {
    describe_counter!(
        "goal_classified_total",
        "Announcements classified, by verdict (novel, duplicate, not_event)."
    );
    describe_counter!(
        "goal_dedup_tier_total",
        "Duplicate verdicts by matching tier (url, scorer, teams, text)."
    );
    describe_counter!(
        "goal_insert_contention_total",
        "Inserts rejected because the key was already present."
    );
    describe_counter!("window_evicted_total", "Window entries removed by eviction.");
    describe_gauge!("window_size", "Entries currently held by the window store.");
    describe_gauge!("window_retention_secs", "Window retention horizon in seconds.");
    describe_counter!(
        "ingest_skipped_total",
        "Announcements skipped by the ingest pipeline, by reason."
    );
    describe_counter!("ingest_events_total", "Announcements parsed from providers.");
    describe_counter!("ingest_runs_total", "Completed poll ticks.");
    describe_counter!("ingest_provider_errors_total", "Provider fetch/parse errors.");
    describe_histogram!("ingest_parse_ms", "Provider parse time in milliseconds.");
    describe_gauge!(
        "ingest_pipeline_last_run_ts",
        "Unix ts when the poller last ran."
    );
    describe_counter!("notify_sent_total", "Notifications delivered.");
    describe_counter!("notify_failed_total", "Notifications that failed after retries.");
}
