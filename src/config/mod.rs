// src/config/mod.rs
//! Runtime settings (env / `.env`) and ingest filter tables.

use anyhow::{anyhow, Context, Result};
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::dedup::DedupConfig;

pub const DEFAULT_FEED_URL: &str = "https://www.reddit.com/r/soccer/new/.rss";
pub const DEFAULT_FILTERS_CONFIG_PATH: &str = "config/filters.toml";
pub const ENV_FILTERS_CONFIG_PATH: &str = "FILTERS_CONFIG_PATH";

const BUILTIN_FILTERS_TOML: &str = include_str!("../../config/filters.toml");

/// Discord webhook target. Absent when `DISCORD_WEBHOOK_URL` is unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscordSettings {
    pub webhook_url: String,
    pub username: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub discord: Option<DiscordSettings>,
    pub feed_url: String,
    pub poll_interval: Duration,
    /// Announcements older than this are ignored.
    pub post_age: Duration,
    pub state_dir: PathBuf,
    pub dedup: DedupConfig,
}

impl Settings {
    /// Read settings from the process environment. Invalid numbers fall back
    /// to defaults with a warning.
    pub fn from_env() -> Self {
        let discord = non_empty_var("DISCORD_WEBHOOK_URL").map(|webhook_url| DiscordSettings {
            webhook_url,
            username: non_empty_var("DISCORD_USERNAME").unwrap_or_else(|| "Ally".to_string()),
            avatar_url: non_empty_var("DISCORD_AVATAR_URL"),
        });

        let defaults = DedupConfig::default();
        let dedup = DedupConfig {
            same_url_window: Duration::from_secs(env_u64(
                "DEDUP_TIER1_SECS",
                defaults.same_url_window.as_secs(),
            )),
            scorer_window: Duration::from_secs(env_u64(
                "DEDUP_TIER2_SECS",
                defaults.scorer_window.as_secs(),
            )),
            teams_window: Duration::from_secs(env_u64(
                "DEDUP_TIER3_SECS",
                defaults.teams_window.as_secs(),
            )),
            retention: Duration::from_secs(env_u64(
                "DEDUP_RETENTION_SECS",
                defaults.retention.as_secs(),
            )),
            minute_tolerance: env_u64("DEDUP_MINUTE_TOLERANCE", defaults.minute_tolerance as u64)
                as u32,
        };

        Self {
            discord,
            feed_url: non_empty_var("FEED_URL").unwrap_or_else(|| DEFAULT_FEED_URL.to_string()),
            poll_interval: Duration::from_secs(env_u64("POLL_INTERVAL_SECS", 30).max(1)),
            post_age: Duration::from_secs(env_u64("POST_AGE_MINUTES", 5) * 60),
            state_dir: non_empty_var("STATE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("state")),
            dedup,
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_u64(name: &str, default: u64) -> u64 {
    match non_empty_var(name) {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(var = name, value = %raw, default, "invalid number; using default");
            default
        }),
    }
}

#[derive(Debug, Deserialize)]
struct FiltersFile {
    #[serde(default)]
    clip_domains: Vec<String>,
    #[serde(default)]
    excluded_terms: Vec<String>,
    #[serde(default)]
    goal_keywords: Vec<String>,
}

/// Compiled title/URL filters used by the ingest pipeline.
#[derive(Debug, Clone)]
pub struct Filters {
    clip_domains: Vec<String>,
    excluded: Vec<Regex>,
    goal_keywords: Vec<Regex>,
}

impl Filters {
    /// Load using env var + fallbacks:
    /// 1) $FILTERS_CONFIG_PATH
    /// 2) config/filters.toml
    /// 3) built-in filters
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = env::var(ENV_FILTERS_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("FILTERS_CONFIG_PATH points to non-existent path"));
            }
            return Self::load_from(&pb);
        }
        let local = PathBuf::from(DEFAULT_FILTERS_CONFIG_PATH);
        if local.exists() {
            return Self::load_from(&local);
        }
        Self::builtin()
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading filters from {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("parsing filters {}", path.display()))
    }

    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_FILTERS_TOML).context("parsing built-in filters")
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let file: FiltersFile = toml::from_str(s)?;

        let excluded = file
            .excluded_terms
            .iter()
            .map(|p| Regex::new(p).with_context(|| format!("excluded term {p:?}")))
            .collect::<Result<Vec<_>>>()?;
        let goal_keywords = file
            .goal_keywords
            .iter()
            .map(|p| {
                RegexBuilder::new(p)
                    .case_insensitive(true)
                    .build()
                    .with_context(|| format!("goal keyword {p:?}"))
            })
            .collect::<Result<Vec<_>>>()?;
        let clip_domains = file
            .clip_domains
            .into_iter()
            .map(|d| d.trim().to_ascii_lowercase())
            .filter(|d| !d.is_empty())
            .collect();

        Ok(Self {
            clip_domains,
            excluded,
            goal_keywords,
        })
    }

    pub fn is_excluded(&self, title: &str) -> bool {
        self.excluded.iter().any(|re| re.is_match(title))
    }

    pub fn has_goal_indicator(&self, title: &str) -> bool {
        self.goal_keywords.iter().any(|re| re.is_match(title))
    }

    /// True when the URL's host contains one of the clip domain base names.
    /// An empty domain list accepts everything.
    pub fn is_clip_url(&self, url: &str) -> bool {
        if self.clip_domains.is_empty() {
            return true;
        }
        let Ok(parsed) = reqwest::Url::parse(url) else {
            return false;
        };
        let Some(host) = parsed.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();
        let host = host.strip_prefix("www.").unwrap_or(&host);
        host.split('.')
            .any(|label| self.clip_domains.iter().any(|d| label.contains(d.as_str())))
    }
}
