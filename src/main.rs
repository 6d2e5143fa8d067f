//! Goal-clip watcher: binary entrypoint
//! Loads settings, restores state, starts the feed poller and the window
//! evictor, and serves the small HTTP surface.

use std::sync::Arc;
use std::time::Duration;

use goal_dedup::api::{self, AppState};
use goal_dedup::config::{Filters, Settings};
use goal_dedup::dedup::DedupEngine;
use goal_dedup::goal::{PlayerTable, TeamTable};
use goal_dedup::ingest::providers::reddit::RedditFeedProvider;
use goal_dedup::ingest::scheduler::{spawn_evictor, spawn_poller};
use goal_dedup::ingest::types::SourceProvider;
use goal_dedup::ingest::Pipeline;
use goal_dedup::metrics::Metrics;
use goal_dedup::notify::{discord::DiscordNotifier, NoopNotifier, Notifier};
use goal_dedup::persist::StateFiles;
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const EVICT_INTERVAL: Duration = Duration::from_secs(15);

/// Enable compact tracing logs in development only.
/// Activation requires BOTH:
///   - dev environment (debug build OR SHUTTLE_ENV in {local, development, dev})
///   - GOALBOT_DEV_LOG=1
fn enable_dev_tracing() {
    let dev_flag = std::env::var("GOALBOT_DEV_LOG")
        .ok()
        .is_some_and(|v| v == "1");

    let is_dev_env = cfg!(debug_assertions)
        || matches!(
            std::env::var("SHUTTLE_ENV")
                .unwrap_or_default()
                .to_ascii_lowercase()
                .as_str(),
            "local" | "development" | "dev"
        );

    if !(dev_flag && is_dev_env) {
        return;
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("goal_dedup=info,warn"));

    // Shuttle may already have a global subscriber installed.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    enable_dev_tracing();

    let settings = Settings::from_env();

    // Recorder before anything that records or describes metrics.
    let metrics = Metrics::init(settings.dedup.retention.as_secs())
        .map_err(|e| tracing::warn!("metrics disabled: {e:#}"))
        .ok();

    let teams = Arc::new(TeamTable::load_default()?);
    let players = Arc::new(PlayerTable::load_default()?);
    let filters = Filters::load_default()?;

    let engine = Arc::new(
        DedupEngine::new(Arc::clone(&teams), settings.dedup).with_players(Arc::clone(&players)),
    );
    let state_files = Arc::new(StateFiles::new(&settings.state_dir));
    state_files.load_window(&engine, chrono::Utc::now()).await;
    let seen = Arc::new(state_files.load_urls().await);

    let notifier: Arc<dyn Notifier> = match &settings.discord {
        Some(d) => Arc::new(DiscordNotifier::new(d)),
        None => {
            tracing::warn!("DISCORD_WEBHOOK_URL not set; goal alerts will only be logged");
            Arc::new(NoopNotifier)
        }
    };

    let pipeline = Arc::new(
        Pipeline::new(Arc::clone(&engine), filters, notifier)
            .with_state(state_files, Arc::clone(&seen))
            .with_post_age(settings.post_age),
    );

    let reddit: Box<dyn SourceProvider> =
        Box::new(RedditFeedProvider::from_url(settings.feed_url.clone())?);
    let providers = Arc::new(vec![reddit]);

    spawn_poller(Arc::clone(&pipeline), Arc::clone(&providers), settings.poll_interval);
    spawn_evictor(Arc::clone(&engine), seen, EVICT_INTERVAL);

    tracing::info!(
        feed = %settings.feed_url,
        poll_secs = settings.poll_interval.as_secs(),
        teams = teams.teams().len(),
        player_aliases = players.len(),
        "goal watcher started"
    );

    let mut router = api::router(AppState::new(engine).with_poll(pipeline, providers));
    if let Some(m) = &metrics {
        router = router.merge(m.router());
    }

    Ok(router.into())
}
