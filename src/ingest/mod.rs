// src/ingest/mod.rs
pub mod providers;
pub mod scheduler;
pub mod types;

use crate::config::Filters;
use crate::dedup::{Classification, DedupEngine};
use crate::ingest::types::{RawAnnouncement, SourceProvider};
use crate::notify::{GoalAlert, Notifier};
use crate::persist::StateFiles;
use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

/// Normalize a title: decode entities, strip tags and invisible marks,
/// ASCII quotes, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[a-z][^>]*>").expect("tag regex"));
    out = re_tags.replace_all(&out, "").to_string();

    // 3) Drop direction marks and zero-width characters
    out.retain(|c| {
        !matches!(
            c,
            '\u{200B}'..='\u{200F}' | '\u{202A}'..='\u{202E}' | '\u{2066}'..='\u{2069}' | '\u{FEFF}'
        )
    });

    // 4) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 5) Collapse whitespace
    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").expect("ws regex"));
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // 6) Length cap: 300 chars (titles only)
    if out.chars().count() > 300 {
        out = out.chars().take(300).collect();
    }

    out
}

/// URLs already taken through classification, with the time they were seen.
#[derive(Debug, Default)]
pub struct SeenUrls {
    inner: Mutex<HashMap<String, DateTime<Utc>>>,
}

/// How long a processed URL is remembered.
pub const SEEN_URL_RETENTION: Duration = Duration::from_secs(24 * 3600);

impl SeenUrls {
    /// Record `url`; returns `false` if it was already known.
    pub fn mark(&self, url: &str, at: DateTime<Utc>) -> bool {
        let mut map = self.inner.lock();
        if map.contains_key(url) {
            return false;
        }
        map.insert(url.to_string(), at);
        true
    }

    pub fn contains(&self, url: &str) -> bool {
        self.inner.lock().contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn entries(&self) -> Vec<(String, DateTime<Utc>)> {
        self.inner
            .lock()
            .iter()
            .map(|(u, t)| (u.clone(), *t))
            .collect()
    }

    pub fn prune_older_than(&self, now: DateTime<Utc>, max_age: Duration) -> usize {
        let mut map = self.inner.lock();
        let before = map.len();
        map.retain(|_, at| (now - *at).to_std().map_or(true, |age| age <= max_age));
        before - map.len()
    }
}

/// Why an announcement never reached classification (or had no goal in it).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Empty,
    TooOld,
    SeenUrl,
    Excluded,
    NoGoalIndicator,
    NotClipUrl,
    NoTrackedTeam,
    NotAnEvent,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Empty => "empty",
            SkipReason::TooOld => "too_old",
            SkipReason::SeenUrl => "seen_url",
            SkipReason::Excluded => "excluded",
            SkipReason::NoGoalIndicator => "no_goal_indicator",
            SkipReason::NotClipUrl => "not_clip_url",
            SkipReason::NoTrackedTeam => "no_tracked_team",
            SkipReason::NotAnEvent => "not_an_event",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Outcome {
    Skipped(SkipReason),
    Duplicate(Classification),
    Accepted(Classification),
}

impl Outcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Outcome::Accepted(_))
    }
}

/// Filters → classification → persistence → notification, per announcement.
pub struct Pipeline {
    engine: Arc<DedupEngine>,
    filters: Filters,
    seen: Arc<SeenUrls>,
    notifier: Arc<dyn Notifier>,
    state: Option<Arc<StateFiles>>,
    post_age: Duration,
}

impl Pipeline {
    pub fn new(engine: Arc<DedupEngine>, filters: Filters, notifier: Arc<dyn Notifier>) -> Self {
        crate::metrics::ensure_described();
        Self {
            engine,
            filters,
            seen: Arc::new(SeenUrls::default()),
            notifier,
            state: None,
            post_age: Duration::from_secs(5 * 60),
        }
    }

    /// Persist window and seen URLs under `state` after each accepted event.
    pub fn with_state(mut self, state: Arc<StateFiles>, seen: Arc<SeenUrls>) -> Self {
        self.state = Some(state);
        self.seen = seen;
        self
    }

    pub fn with_post_age(mut self, post_age: Duration) -> Self {
        self.post_age = post_age;
        self
    }

    pub fn engine(&self) -> &Arc<DedupEngine> {
        &self.engine
    }

    pub fn seen(&self) -> &Arc<SeenUrls> {
        &self.seen
    }

    pub async fn process_announcement(&self, ann: RawAnnouncement) -> Outcome {
        let now = ann.observed_at;
        let text = normalize_text(&ann.text);

        if let Some(reason) = self.precheck(&text, &ann, now) {
            tracing::debug!(target: "ingest", reason = reason.as_str(), %text, "skipped");
            counter!("ingest_skipped_total", "reason" => reason.as_str()).increment(1);
            return Outcome::Skipped(reason);
        }

        self.seen.mark(&ann.source_url, now);
        let c = self.engine.classify(&text, &ann.source_url, now);

        let outcome = match c.event.clone() {
            None => {
                counter!("ingest_skipped_total", "reason" => SkipReason::NotAnEvent.as_str()).increment(1);
                Outcome::Skipped(SkipReason::NotAnEvent)
            }
            Some(_) if c.is_duplicate => Outcome::Duplicate(c),
            Some(event) => {
                self.persist_window().await;
                if event.team_pair().is_some() {
                    let alert =
                        GoalAlert::from_event(&event, self.engine.teams(), ann.permalink.as_deref());
                    self.send(&alert).await;
                } else {
                    tracing::info!(target: "ingest", text = %event.raw_text, "accepted without both teams; not notifying");
                }
                Outcome::Accepted(c)
            }
        };

        self.persist_urls().await;
        outcome
    }

    fn precheck(&self, text: &str, ann: &RawAnnouncement, now: DateTime<Utc>) -> Option<SkipReason> {
        if text.is_empty() {
            return Some(SkipReason::Empty);
        }
        if let Some(published) = ann.published_at {
            let too_old = (now - published)
                .to_std()
                .is_ok_and(|age| age > self.post_age);
            if too_old {
                return Some(SkipReason::TooOld);
            }
        }
        if self.seen.contains(&ann.source_url) {
            return Some(SkipReason::SeenUrl);
        }
        if self.filters.is_excluded(text) {
            return Some(SkipReason::Excluded);
        }
        if !self.filters.has_goal_indicator(text) {
            return Some(SkipReason::NoGoalIndicator);
        }
        if !self.filters.is_clip_url(&ann.source_url) {
            return Some(SkipReason::NotClipUrl);
        }
        if !self.engine.teams().mentions_tracked(text) {
            return Some(SkipReason::NoTrackedTeam);
        }
        None
    }

    async fn send(&self, alert: &GoalAlert) {
        match self.notifier.send(alert).await {
            Ok(()) => {
                counter!("notify_sent_total").increment(1);
                tracing::info!(target: "notify", notifier = self.notifier.name(), title = %alert.title, "goal alert sent");
            }
            Err(e) => {
                counter!("notify_failed_total").increment(1);
                tracing::warn!(target: "notify", notifier = self.notifier.name(), error = ?e, "goal alert failed");
            }
        }
    }

    async fn persist_window(&self) {
        if let Some(state) = &self.state {
            if let Err(e) = state.save_window(self.engine.store()).await {
                tracing::warn!(target: "persist", "save window: {e:#}");
            }
        }
    }

    async fn persist_urls(&self) {
        if let Some(state) = &self.state {
            if let Err(e) = state.save_urls(&self.seen).await {
                tracing::warn!(target: "persist", "save urls: {e:#}");
            }
        }
    }
}

/// Fetch from every provider, then process each announcement in its own task.
pub async fn run_once(pipeline: &Arc<Pipeline>, providers: &[Box<dyn SourceProvider>]) -> Vec<Outcome> {
    crate::metrics::ensure_described();

    let mut raw = Vec::new();
    for p in providers {
        match p.fetch_latest().await {
            Ok(mut v) => raw.append(&mut v),
            Err(e) => {
                tracing::warn!(target: "ingest", error = ?e, provider = p.name(), "provider error");
                counter!("ingest_provider_errors_total").increment(1);
            }
        }
    }

    let mut tasks = JoinSet::new();
    for ann in raw {
        let p = Arc::clone(pipeline);
        tasks.spawn(async move { p.process_announcement(ann).await });
    }

    let mut outcomes = Vec::with_capacity(tasks.len());
    while let Some(res) = tasks.join_next().await {
        match res {
            Ok(o) => outcomes.push(o),
            Err(e) => tracing::warn!(target: "ingest", error = ?e, "announcement task failed"),
        }
    }

    gauge!("ingest_pipeline_last_run_ts").set(Utc::now().timestamp() as f64);
    outcomes
}
