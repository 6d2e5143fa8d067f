// src/goal/mod.rs
//! Goal events: the structured record behind a free-text announcement.
//!
//! `extract` turns a title into a `GoalEvent` (or `NotAnEvent`), `teams` and
//! `player` collapse textual variants of team and scorer names into stable keys.

pub mod extract;
pub mod player;
pub mod teams;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

pub use extract::{extract, Extraction};
pub use player::{canonicalize_player, PlayerTable};
pub use teams::{TeamInfo, TeamTable};

/// Canonical team identity (normalized official name, e.g. `"crystal palace"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TeamKey(pub String);

/// Canonical scorer identity (alias table or surname-derived, e.g. `"van dijk"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PlayerKey(pub String);

impl TeamKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PlayerKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TeamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for PlayerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which side of the title (left/right of the score) carried the bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

/// Score after the goal. Equality ignores the side: `[1] - 0` and `0 - [1]`
/// describe the same state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ScoreState {
    pub scoring_count: u32,
    pub other_count: u32,
}

/// Match minute, `90+2'` → `{ base: 90, injury_offset: Some(2) }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Minute {
    pub base: u32,
    pub injury_offset: Option<u32>,
}

impl Minute {
    pub fn base_distance(&self, other: &Minute) -> u32 {
        self.base.abs_diff(other.base)
    }
}

impl fmt::Display for Minute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.injury_offset {
            Some(extra) => write!(f, "{}+{}'", self.base, extra),
            None => write!(f, "{}'", self.base),
        }
    }
}

/// One scoring occurrence. Built only from text that carries both a score and
/// a minute marker; scorer and teams stay `None` when they could not be
/// resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalEvent {
    pub score: ScoreState,
    pub scoring_side: Side,
    pub minute: Minute,
    pub scorer: Option<PlayerKey>,
    pub team_a: Option<TeamKey>,
    pub team_b: Option<TeamKey>,
    pub source_url: String,
    pub observed_at: DateTime<Utc>,
    pub raw_text: String,
}

impl GoalEvent {
    /// Both team keys, when both are known.
    pub fn team_pair(&self) -> Option<(&TeamKey, &TeamKey)> {
        match (&self.team_a, &self.team_b) {
            (Some(a), Some(b)) => Some((a, b)),
            _ => None,
        }
    }

    /// The team pair as an order-independent value.
    pub fn unordered_teams(&self) -> Option<(&TeamKey, &TeamKey)> {
        self.team_pair()
            .map(|(a, b)| if a <= b { (a, b) } else { (b, a) })
    }

    pub fn scoring_team(&self) -> Option<&TeamKey> {
        match self.scoring_side {
            Side::Left => self.team_a.as_ref(),
            Side::Right => self.team_b.as_ref(),
        }
    }
}
