pub mod discord;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::goal::{GoalEvent, TeamTable};

/// Everything a notifier needs to announce one accepted goal.
#[derive(Debug, Clone, PartialEq)]
pub struct GoalAlert {
    pub title: String,            // normalized announcement text
    pub clip_url: String,
    pub permalink: Option<String>,
    pub color: u32,               // scoring team colour, grey when unknown
    pub logo: Option<String>,     // scoring team badge
    pub timestamp: DateTime<Utc>,
}

impl GoalAlert {
    pub const DEFAULT_COLOR: u32 = 0x808080;

    pub fn from_event(event: &GoalEvent, teams: &TeamTable, permalink: Option<&str>) -> Self {
        let team = event.scoring_team().and_then(|k| teams.get(k));
        Self {
            title: event.raw_text.clone(),
            clip_url: event.source_url.clone(),
            permalink: permalink.map(str::to_string),
            color: team.map_or(Self::DEFAULT_COLOR, |t| t.color),
            logo: team.and_then(|t| t.logo.clone()),
            timestamp: event.observed_at,
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, alert: &GoalAlert) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Used when no webhook is configured; logs and drops.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send(&self, alert: &GoalAlert) -> Result<()> {
        tracing::debug!(target: "notify", title = %alert.title, "no notifier configured");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::{DedupConfig, DedupEngine};
    use chrono::TimeZone;
    use std::sync::Arc;

    #[test]
    fn alert_uses_scoring_team_metadata() {
        let teams = Arc::new(TeamTable::builtin().unwrap());
        let engine = DedupEngine::new(Arc::clone(&teams), DedupConfig::default());
        let now = Utc.with_ymd_and_hms(2024, 3, 2, 15, 0, 0).unwrap();

        let ev = engine
            .build_event("Chelsea 1 - [2] Liverpool - Salah 70'", "https://streamff.co/v/1", now)
            .unwrap();
        let alert = GoalAlert::from_event(&ev, &teams, Some("https://reddit.com/r/soccer/1"));
        assert_eq!(alert.color, 0xC8102E);
        assert!(alert.logo.as_deref().is_some_and(|l| l.ends_with("t14.png")));
        assert_eq!(alert.clip_url, "https://streamff.co/v/1");

        let ev = engine
            .build_event("[1] - 0 Chelsea - Palmer 3'", "https://streamff.co/v/2", now)
            .unwrap();
        let alert = GoalAlert::from_event(&ev, &teams, None);
        assert_eq!(alert.color, GoalAlert::DEFAULT_COLOR);
        assert_eq!(alert.logo, None);
    }
}
