use std::sync::Arc;

use chrono::{DateTime, Utc};
use shuttle_axum::axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use tower_http::cors::CorsLayer;

use crate::dedup::DedupEngine;
use crate::goal::{Minute, PlayerKey, ScoreState, TeamKey};
use crate::ingest::{run_once, types::SourceProvider, Outcome, Pipeline};

/// What `/check` needs to run one poll on demand.
#[derive(Clone)]
pub struct ManualPoll {
    pub pipeline: Arc<Pipeline>,
    pub providers: Arc<Vec<Box<dyn SourceProvider>>>,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<DedupEngine>,
    pub poll: Option<ManualPoll>,
}

impl AppState {
    pub fn new(engine: Arc<DedupEngine>) -> Self {
        Self { engine, poll: None }
    }

    pub fn with_poll(mut self, pipeline: Arc<Pipeline>, providers: Arc<Vec<Box<dyn SourceProvider>>>) -> Self {
        self.poll = Some(ManualPoll { pipeline, providers });
        self
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/check", get(check))
        .route("/debug/window", get(debug_window))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy" }))
}

#[derive(serde::Serialize)]
struct CheckOut {
    checked: usize,
    accepted: usize,
    duplicates: usize,
    skipped: usize,
}

/// Run one poll now instead of waiting for the next tick.
async fn check(State(state): State<AppState>) -> Result<Json<CheckOut>, (StatusCode, Json<serde_json::Value>)> {
    let Some(poll) = state.poll else {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "error": "no feed configured" })),
        ));
    };

    let outcomes = run_once(&poll.pipeline, &poll.providers).await;
    let accepted = outcomes.iter().filter(|o| o.is_accepted()).count();
    let duplicates = outcomes
        .iter()
        .filter(|o| matches!(o, Outcome::Duplicate(_)))
        .count();
    tracing::info!(target: "ingest", checked = outcomes.len(), accepted, duplicates, "manual check");

    Ok(Json(CheckOut {
        checked: outcomes.len(),
        accepted,
        duplicates,
        skipped: outcomes.len() - accepted - duplicates,
    }))
}

#[derive(serde::Serialize)]
struct WindowEntryOut {
    raw_text: String,
    source_url: String,
    inserted_at: DateTime<Utc>,
    age_secs: i64,
    score: ScoreState,
    minute: Minute,
    scorer: Option<PlayerKey>,
    team_a: Option<TeamKey>,
    team_b: Option<TeamKey>,
}

#[derive(serde::Serialize)]
struct WindowOut {
    horizon_secs: u64,
    size: usize,
    entries: Vec<WindowEntryOut>,
}

async fn debug_window(State(state): State<AppState>) -> Json<WindowOut> {
    let now = Utc::now();
    let store = state.engine.store();
    let mut snap = store.snapshot(now);
    snap.sort_by(|a, b| b.1.cmp(&a.1));

    let entries = snap
        .into_iter()
        .map(|(ev, inserted_at)| WindowEntryOut {
            raw_text: ev.raw_text.clone(),
            source_url: ev.source_url.clone(),
            inserted_at,
            age_secs: (now - inserted_at).num_seconds().max(0),
            score: ev.score,
            minute: ev.minute,
            scorer: ev.scorer.clone(),
            team_a: ev.team_a.clone(),
            team_b: ev.team_b.clone(),
        })
        .collect();

    Json(WindowOut {
        horizon_secs: store.horizon().as_secs(),
        size: store.len(),
        entries,
    })
}
