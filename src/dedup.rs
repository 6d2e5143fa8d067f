//! # Dedup Decision Engine
//! Decides whether an announcement repeats a goal already seen recently.
//!
//! Each retained prior is compared in tier order:
//! - **url** (age ≤ 30 s): identical source URL
//! - **scorer** (age ≤ 60 s): same score, same base minute, same scorer key
//! - **teams** (age ≤ 120 s): same score, base minute within ±1, same unordered
//!   team pair, and no conflicting scorer keys
//!
//! Any hit is a duplicate. Otherwise the event is inserted into the
//! [`WindowStore`]; a rejected insert triggers exactly one re-scan.
//!
//! `classify` is synchronous and never awaits, so a caller that gets cancelled
//! cannot leave a half-done insert behind.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use serde::Serialize;
use tracing::{debug, info};

use crate::goal::{extract, GoalEvent, PlayerTable, TeamTable};
use crate::window::WindowStore;

/// Tunable windows. Defaults: 30 s / 60 s / 120 s, 300 s retention, ±1 minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupConfig {
    pub same_url_window: Duration,
    pub scorer_window: Duration,
    pub teams_window: Duration,
    pub retention: Duration,
    pub minute_tolerance: u32,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            same_url_window: Duration::from_secs(30),
            scorer_window: Duration::from_secs(60),
            teams_window: Duration::from_secs(120),
            retention: Duration::from_secs(300),
            minute_tolerance: 1,
        }
    }
}

/// Which rule matched a duplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    SameUrl,
    ScorerMinute,
    TeamsMinute,
    /// Identical text already held by the store (insert was rejected).
    SameText,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::SameUrl => "url",
            Tier::ScorerMinute => "scorer",
            Tier::TeamsMinute => "teams",
            Tier::SameText => "text",
        }
    }
}

/// Verdict for one announcement.
#[derive(Debug, Clone, Serialize)]
pub struct Classification {
    pub is_duplicate: bool,
    /// `None` when the text is not a goal announcement.
    pub event: Option<Arc<GoalEvent>>,
    /// The retained event that triggered a duplicate verdict (diagnostics).
    pub matched_prior: Option<Arc<GoalEvent>>,
    pub tier: Option<Tier>,
}

impl Classification {
    fn not_an_event() -> Self {
        Self {
            is_duplicate: false,
            event: None,
            matched_prior: None,
            tier: None,
        }
    }

    fn novel(event: Arc<GoalEvent>) -> Self {
        Self {
            is_duplicate: false,
            event: Some(event),
            matched_prior: None,
            tier: None,
        }
    }

    fn duplicate(event: Arc<GoalEvent>, prior: Option<Arc<GoalEvent>>, tier: Tier) -> Self {
        Self {
            is_duplicate: true,
            event: Some(event),
            matched_prior: prior,
            tier: Some(tier),
        }
    }

    /// Accepted as a new goal and now held by the store.
    pub fn is_novel(&self) -> bool {
        !self.is_duplicate && self.event.is_some()
    }
}

/// Shared engine: immutable alias tables plus the window store.
#[derive(Debug, Clone)]
pub struct DedupEngine {
    teams: Arc<TeamTable>,
    players: Arc<PlayerTable>,
    store: Arc<WindowStore>,
    cfg: DedupConfig,
}

impl DedupEngine {
    /// Engine with a fresh store whose horizon is `cfg.retention`.
    pub fn new(teams: Arc<TeamTable>, cfg: DedupConfig) -> Self {
        let store = Arc::new(WindowStore::with_horizon(cfg.retention));
        Self::with_store(teams, store, cfg)
    }

    pub fn with_store(teams: Arc<TeamTable>, store: Arc<WindowStore>, cfg: DedupConfig) -> Self {
        crate::metrics::ensure_described();
        Self {
            teams,
            players: PlayerTable::shared_builtin(),
            store,
            cfg,
        }
    }

    /// Swap the built-in scorer alias table for a loaded one.
    pub fn with_players(mut self, players: Arc<PlayerTable>) -> Self {
        self.players = players;
        self
    }

    pub fn store(&self) -> &Arc<WindowStore> {
        &self.store
    }

    pub fn teams(&self) -> &Arc<TeamTable> {
        &self.teams
    }

    pub fn players(&self) -> &Arc<PlayerTable> {
        &self.players
    }

    pub fn config(&self) -> &DedupConfig {
        &self.cfg
    }

    /// Extract and canonicalize; `None` for anything that is not a goal.
    pub fn build_event(&self, text: &str, source_url: &str, now: DateTime<Utc>) -> Option<GoalEvent> {
        let cand = extract(text).candidate()?;
        let scorer = cand.scorer_text.and_then(|s| self.players.canonicalize(s));
        let (team_a, team_b) = match cand.team_texts {
            Some((left, right)) => (
                self.teams.canonicalize_team(left),
                self.teams.canonicalize_team(right),
            ),
            None => (None, None),
        };

        Some(GoalEvent {
            score: cand.score,
            scoring_side: cand.scoring_side,
            minute: cand.minute,
            scorer,
            team_a,
            team_b,
            source_url: source_url.to_string(),
            observed_at: now,
            raw_text: text.to_string(),
        })
    }

    /// Classify one announcement, inserting it into the store when novel.
    pub fn classify(&self, text: &str, source_url: &str, now: DateTime<Utc>) -> Classification {
        let Some(event) = self.build_event(text, source_url, now) else {
            debug!(target: "dedup", text, "not a goal event");
            counter!("goal_classified_total", "verdict" => "not_event").increment(1);
            return Classification::not_an_event();
        };
        let event = Arc::new(event);

        if let Some((prior, tier)) = self.find_match(&event, now) {
            return self.report_duplicate(event, Some(prior), tier);
        }

        if self.store.try_insert_if_absent(text, Arc::clone(&event), now) {
            gauge!("window_size").set(self.store.len() as f64);
            counter!("goal_classified_total", "verdict" => "novel").increment(1);
            info!(
                target: "dedup",
                id = %anon_hash(text),
                score = %format!("{}-{}", event.score.scoring_count, event.score.other_count),
                minute = %event.minute,
                scorer = ?event.scorer.as_ref().map(|p| p.as_str()),
                "novel goal event"
            );
            return Classification::novel(event);
        }

        // Someone else owns this exact text; look again with a fresh snapshot.
        counter!("goal_insert_contention_total").increment(1);
        if let Some((prior, tier)) = self.find_match(&event, now) {
            return self.report_duplicate(event, Some(prior), tier);
        }
        let prior = self.store.get(text).map(|(p, _)| p);
        self.report_duplicate(event, prior, Tier::SameText)
    }

    /// First tier that declares `candidate` a repeat of `prior`, if any.
    /// `age` is how long `prior` has been in the store.
    pub fn match_tier(&self, candidate: &GoalEvent, prior: &GoalEvent, age: Duration) -> Option<Tier> {
        let cfg = &self.cfg;

        if age <= cfg.same_url_window
            && !candidate.source_url.is_empty()
            && candidate.source_url == prior.source_url
        {
            return Some(Tier::SameUrl);
        }

        if candidate.score != prior.score {
            return None;
        }

        if age <= cfg.scorer_window
            && candidate.minute.base == prior.minute.base
            && candidate.scorer.is_some()
            && candidate.scorer == prior.scorer
        {
            return Some(Tier::ScorerMinute);
        }

        let scorer_conflict = matches!(
            (&candidate.scorer, &prior.scorer),
            (Some(a), Some(b)) if a != b
        );
        let same_teams = matches!(
            (candidate.unordered_teams(), prior.unordered_teams()),
            (Some(a), Some(b)) if a == b
        );
        if age <= cfg.teams_window
            && candidate.minute.base_distance(&prior.minute) <= cfg.minute_tolerance
            && same_teams
            && !scorer_conflict
        {
            return Some(Tier::TeamsMinute);
        }

        None
    }

    /// Drop entries past the retention horizon.
    pub fn evict(&self, now: DateTime<Utc>) -> usize {
        let removed = self.store.evict_older_than(now, self.cfg.retention);
        if removed > 0 {
            counter!("window_evicted_total").increment(removed as u64);
            debug!(target: "dedup", removed, "evicted expired goal events");
        }
        gauge!("window_size").set(self.store.len() as f64);
        removed
    }

    /// Most recent matching prior first.
    fn find_match(&self, event: &GoalEvent, now: DateTime<Utc>) -> Option<(Arc<GoalEvent>, Tier)> {
        let mut snap = self.store.snapshot(now);
        snap.sort_by(|a, b| b.1.cmp(&a.1));
        snap.into_iter().find_map(|(prior, inserted_at)| {
            let age = (now - inserted_at).to_std().unwrap_or(Duration::ZERO);
            self.match_tier(event, &prior, age).map(|tier| (prior, tier))
        })
    }

    fn report_duplicate(
        &self,
        event: Arc<GoalEvent>,
        prior: Option<Arc<GoalEvent>>,
        tier: Tier,
    ) -> Classification {
        counter!("goal_classified_total", "verdict" => "duplicate").increment(1);
        counter!("goal_dedup_tier_total", "tier" => tier.as_str()).increment(1);
        info!(
            target: "dedup",
            id = %anon_hash(&event.raw_text),
            prior = ?prior.as_ref().map(|p| anon_hash(&p.raw_text)),
            tier = tier.as_str(),
            "duplicate goal event"
        );
        Classification::duplicate(event, prior, tier)
    }
}

/// Short SHA-256 fingerprint for logs; raw titles stay at `debug`.
pub(crate) fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const JESUS_81: &str = "Arsenal [3] - 1 Crystal Palace - Gabriel Jesus 81'";

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 2, 15, 0, 0).unwrap()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        t0() + chrono::Duration::seconds(secs)
    }

    fn engine() -> DedupEngine {
        let teams = Arc::new(TeamTable::builtin().unwrap());
        DedupEngine::new(teams, DedupConfig::default())
    }

    #[test]
    fn abbreviated_scorer_is_a_scorer_tier_duplicate() {
        let e = engine();
        assert!(e.classify(JESUS_81, "https://streamin.one/v/a", t0()).is_novel());

        let c = e.classify(
            "Arsenal [3] - 1 Crystal Palace - G. Jesus 81'",
            "https://streamff.live/v/b",
            at(30),
        );
        assert!(c.is_duplicate);
        assert_eq!(c.tier, Some(Tier::ScorerMinute));
        assert_eq!(c.matched_prior.map(|p| p.raw_text.clone()), Some(JESUS_81.to_string()));
        assert_eq!(e.store().len(), 1);
    }

    #[test]
    fn minute_tolerance_boundary() {
        let e = engine();
        e.classify(JESUS_81, "https://a.test/1", t0());

        let far = e.classify(
            "Arsenal [3] - 1 Crystal Palace - Gabriel Jesus 83'",
            "https://a.test/2",
            at(90),
        );
        assert!(!far.is_duplicate);

        let e = engine();
        e.classify(JESUS_81, "https://a.test/1", t0());
        let near = e.classify(
            "Arsenal [3] - 1 Crystal Palace - Gabriel Jesus 82'",
            "https://a.test/3",
            at(90),
        );
        assert!(near.is_duplicate);
        assert_eq!(near.tier, Some(Tier::TeamsMinute));
    }

    #[test]
    fn different_scorer_same_minute_is_novel() {
        let e = engine();
        e.classify(JESUS_81, "https://a.test/1", t0());
        let c = e.classify(
            "Arsenal [3] - 1 Crystal Palace - Saka 81'",
            "https://a.test/2",
            at(30),
        );
        assert!(!c.is_duplicate);
        assert_eq!(e.store().len(), 2);
    }

    #[test]
    fn non_event_leaves_store_untouched() {
        let e = engine();
        let c = e.classify("Match Thread: Arsenal vs Chelsea", "https://a.test/1", t0());
        assert!(!c.is_duplicate);
        assert!(c.event.is_none());
        assert!(c.matched_prior.is_none());
        assert!(e.store().is_empty());
    }

    #[test]
    fn same_url_only_within_thirty_seconds() {
        let e = engine();
        e.classify(JESUS_81, "https://a.test/same", t0());
        let other = "Chelsea [1] - 0 Everton - Palmer 12'";

        let c = e.classify(other, "https://a.test/same", at(30));
        assert_eq!(c.tier, Some(Tier::SameUrl));

        let c = e.classify(other, "https://a.test/same", at(31));
        assert!(!c.is_duplicate);
    }

    #[test]
    fn team_aliases_and_order_collapse() {
        let e = engine();
        e.classify(
            "Man Utd 0 - [1] Spurs - Son 44'",
            "https://a.test/1",
            t0(),
        );
        let c = e.classify(
            "Tottenham Hotspur [1] - 0 Manchester United - Heung-min Son 45'",
            "https://a.test/2",
            at(100),
        );
        assert!(c.is_duplicate, "{c:?}");
        assert_eq!(c.tier, Some(Tier::TeamsMinute));
    }

    #[test]
    fn teams_tier_needs_both_pairs_known() {
        let e = engine();
        e.classify("[1] - 0 Chelsea - Palmer 12'", "https://a.test/1", t0());
        let c = e.classify("Fulham [1] - 0 Chelsea 12'", "https://a.test/2", at(90));
        assert!(!c.is_duplicate);
    }

    #[test]
    fn teams_tier_expires_after_two_minutes() {
        let e = engine();
        e.classify(JESUS_81, "https://a.test/1", t0());
        let c = e.classify(
            "Arsenal [3] - 1 Crystal Palace 81'",
            "https://a.test/2",
            at(121),
        );
        assert!(!c.is_duplicate);
    }

    #[test]
    fn identical_text_reports_the_stored_event() {
        let e = engine();
        // past every tier window but still retained
        e.classify(JESUS_81, "https://a.test/1", t0());
        let c = e.classify(JESUS_81, "https://a.test/2", at(200));
        assert!(c.is_duplicate);
        assert_eq!(c.tier, Some(Tier::SameText));
        assert!(c.matched_prior.is_some());
    }

    #[test]
    fn evict_respects_retention() {
        let e = engine();
        e.classify(JESUS_81, "https://a.test/1", t0());
        assert_eq!(e.evict(at(299)), 0);
        assert_eq!(e.evict(at(301)), 1);
        assert!(e.store().is_empty());
    }

    #[test]
    fn anon_hash_is_short_and_stable() {
        assert_eq!(anon_hash("abc").len(), 12);
        assert_eq!(anon_hash("abc"), anon_hash("abc"));
        assert_ne!(anon_hash("abc"), anon_hash("abd"));
    }
}
