// src/goal/teams.rs
//! Team canonicalization over a curated alias table.
//!
//! - Table comes from TOML (`config/teams.toml`, or `$TEAMS_CONFIG_PATH`), with
//!   the same file compiled in as the built-in fallback.
//! - Phrases are normalized (lowercase, no diacritics, `&` → `and`, punctuation
//!   → space) and looked up as token n-grams, so only whole words can match.
//! - Longest alias wins; ties go to the leftmost occurrence.
//! - Unknown names resolve to `None`; we never invent a key.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::player::fold_diacritics;
use super::TeamKey;

pub const DEFAULT_TEAMS_CONFIG_PATH: &str = "config/teams.toml";
pub const ENV_TEAMS_CONFIG_PATH: &str = "TEAMS_CONFIG_PATH";

const BUILTIN_TEAMS_TOML: &str = include_str!("../../config/teams.toml");
const DEFAULT_COLOR: u32 = 0x808080;

#[derive(Debug, Deserialize)]
struct TeamsFile {
    #[serde(default)]
    teams: Vec<TeamCfg>,
}

#[derive(Debug, Deserialize)]
struct TeamCfg {
    name: String,
    #[serde(default)]
    aliases: Vec<String>,
    #[serde(default)]
    color: Option<u32>,
    #[serde(default)]
    logo: Option<String>,
    #[serde(default = "default_tracked")]
    tracked: bool,
}

fn default_tracked() -> bool {
    true
}

/// One known team plus display metadata used by notifications.
#[derive(Debug, Clone)]
pub struct TeamInfo {
    pub key: TeamKey,
    pub name: String,
    pub aliases: Vec<String>,
    pub color: u32,
    pub logo: Option<String>,
    /// Untracked entries exist only to keep look-alike names apart.
    pub tracked: bool,
}

/// Immutable alias table; build once at startup and share.
#[derive(Debug, Clone)]
pub struct TeamTable {
    teams: Vec<TeamInfo>,
    by_phrase: HashMap<String, usize>,
    max_words: usize,
}

impl TeamTable {
    /// Load using env var + fallbacks:
    /// 1) $TEAMS_CONFIG_PATH
    /// 2) config/teams.toml
    /// 3) built-in table
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_TEAMS_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("TEAMS_CONFIG_PATH points to non-existent path"));
            }
            return Self::load_from(&pb);
        }
        let local = PathBuf::from(DEFAULT_TEAMS_CONFIG_PATH);
        if local.exists() {
            return Self::load_from(&local);
        }
        Self::builtin()
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading team table from {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("parsing team table {}", path.display()))
    }

    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_TEAMS_TOML).context("parsing built-in team table")
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let file: TeamsFile = toml::from_str(s)?;
        let mut teams = Vec::with_capacity(file.teams.len());
        let mut by_phrase: HashMap<String, usize> = HashMap::new();
        let mut max_words = 0usize;

        for cfg in file.teams {
            let key = normalize_phrase(&cfg.name);
            if key.is_empty() {
                return Err(anyhow!("team entry with empty name"));
            }
            let idx = teams.len();

            for phrase in std::iter::once(&cfg.name).chain(cfg.aliases.iter()) {
                let norm = normalize_phrase(phrase);
                if norm.is_empty() {
                    continue;
                }
                match by_phrase.get(&norm) {
                    Some(&owner) if owner != idx => {
                        tracing::warn!(
                            target: "teams",
                            alias = %norm,
                            kept = %teams_key(&teams, owner),
                            ignored = %key,
                            "alias claimed by two teams; keeping the first"
                        );
                    }
                    Some(_) => {}
                    None => {
                        max_words = max_words.max(norm.split(' ').count());
                        by_phrase.insert(norm, idx);
                    }
                }
            }

            teams.push(TeamInfo {
                key: TeamKey(key),
                name: cfg.name,
                aliases: cfg.aliases,
                color: cfg.color.unwrap_or(DEFAULT_COLOR),
                logo: cfg.logo,
                tracked: cfg.tracked,
            });
        }

        Ok(Self {
            teams,
            by_phrase,
            max_words,
        })
    }

    pub fn teams(&self) -> &[TeamInfo] {
        &self.teams
    }

    pub fn get(&self, key: &TeamKey) -> Option<&TeamInfo> {
        self.by_phrase
            .get(key.as_str())
            .map(|&i| &self.teams[i])
            .filter(|t| &t.key == key)
    }

    /// Map a raw team substring to its canonical key.
    pub fn canonicalize_team(&self, raw: &str) -> Option<TeamKey> {
        let norm = normalize_phrase(raw);
        let tokens: Vec<&str> = norm.split_whitespace().collect();
        self.longest_match(&tokens)
            .map(|(idx, _, _)| self.teams[idx].key.clone())
    }

    /// All distinct teams mentioned anywhere in `text`, left to right.
    pub fn mentions(&self, text: &str) -> Vec<&TeamInfo> {
        let norm = normalize_phrase(text);
        let tokens: Vec<&str> = norm.split_whitespace().collect();

        let mut out: Vec<&TeamInfo> = Vec::new();
        let mut pos = 0usize;
        while pos < tokens.len() {
            match self.match_at(&tokens, pos) {
                Some((idx, len)) => {
                    let team = &self.teams[idx];
                    if !out.iter().any(|t| t.key == team.key) {
                        out.push(team);
                    }
                    pos += len;
                }
                None => pos += 1,
            }
        }
        out
    }

    /// True if any tracked team appears in `text`.
    pub fn mentions_tracked(&self, text: &str) -> bool {
        self.mentions(text).iter().any(|t| t.tracked)
    }

    /// Longest n-gram hit over the whole token list as `(team, start, len)`.
    fn longest_match(&self, tokens: &[&str]) -> Option<(usize, usize, usize)> {
        let upper = self.max_words.min(tokens.len());
        for len in (1..=upper).rev() {
            for start in 0..=(tokens.len() - len) {
                let phrase = tokens[start..start + len].join(" ");
                if let Some(&idx) = self.by_phrase.get(&phrase) {
                    return Some((idx, start, len));
                }
            }
        }
        None
    }

    /// Longest alias starting exactly at `pos`.
    fn match_at(&self, tokens: &[&str], pos: usize) -> Option<(usize, usize)> {
        let upper = self.max_words.min(tokens.len() - pos);
        (1..=upper).rev().find_map(|len| {
            let phrase = tokens[pos..pos + len].join(" ");
            self.by_phrase.get(&phrase).map(|&idx| (idx, len))
        })
    }
}

fn teams_key(teams: &[TeamInfo], idx: usize) -> &str {
    teams.get(idx).map(|t| t.key.as_str()).unwrap_or("?")
}

/// Lowercase, fold diacritics, `&` → `and`, punctuation (except apostrophes) →
/// space, collapse whitespace.
pub fn normalize_phrase(s: &str) -> String {
    let folded = fold_diacritics(s).replace(['’', '‘'], "'");
    let mut out = String::with_capacity(folded.len());
    for ch in folded.chars() {
        match ch {
            '&' => out.push_str(" and "),
            '\'' => out.push(ch),
            c if c.is_alphanumeric() => out.push(c),
            _ => out.push(' '),
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> TeamTable {
        TeamTable::builtin().expect("built-in table parses")
    }

    fn canon(t: &TeamTable, s: &str) -> Option<String> {
        t.canonicalize_team(s).map(|k| k.0)
    }

    #[test]
    fn builtin_table_has_premier_league_clubs() {
        let t = table();
        assert!(t.teams().len() >= 20);
        assert!(t.teams().iter().filter(|x| x.tracked).count() >= 20);
    }

    #[test]
    fn aliases_collapse_to_one_key() {
        let t = table();
        for (a, b) in [
            ("The Gunners", "Arsenal"),
            ("Man City", "Manchester City"),
            ("MUFC", "Manchester United"),
            ("Man Utd", "Man United"),
            ("Spurs", "Tottenham Hotspur"),
            ("WWFC", "Wolves"),
            ("Brighton and Hove", "Brighton & Hove Albion"),
            ("Palace", "Crystal Palace"),
            ("Nott'm Forest", "Nottingham Forest"),
        ] {
            assert!(canon(&t, a).is_some(), "{a} should resolve");
            assert_eq!(canon(&t, a), canon(&t, b), "{a} vs {b}");
        }
    }

    #[test]
    fn canonical_keys_are_fixed_points() {
        let t = table();
        for team in t.teams() {
            let once = t.canonicalize_team(&team.name).expect("name resolves");
            assert_eq!(once, team.key);
            assert_eq!(t.canonicalize_team(once.as_str()), Some(once.clone()));
        }
    }

    #[test]
    fn whole_words_only() {
        let t = table();
        assert_eq!(canon(&t, "Villarreal"), Some("villarreal".into()));
        assert_eq!(canon(&t, "Arsenalistas"), None);
        assert_eq!(canon(&t, "Hull City"), None);
    }

    #[test]
    fn longest_alias_wins() {
        let t = table();
        assert_eq!(canon(&t, "Newcastle Jets"), Some("newcastle jets".into()));
        assert_eq!(canon(&t, "Newcastle"), Some("newcastle united".into()));
        assert_eq!(canon(&t, "Forest Green Rovers"), Some("forest green rovers".into()));
        assert_eq!(canon(&t, "Sheffield United"), Some("sheffield united".into()));
    }

    #[test]
    fn noise_around_the_name_is_tolerated() {
        let t = table();
        assert_eq!(canon(&t, "GOAL: Arsenal"), Some("arsenal".into()));
        assert_eq!(canon(&t, "Crystal Palace (H)"), Some("crystal palace".into()));
    }

    #[test]
    fn mentions_scans_the_whole_title() {
        let t = table();
        let found: Vec<&str> = t
            .mentions("Arsenal [3] - 1 Crystal Palace - Gabriel Jesus 81'")
            .iter()
            .map(|x| x.key.as_str())
            .collect();
        assert_eq!(found, vec!["arsenal", "crystal palace"]);
        assert!(t.mentions_tracked("Wolves [1] - 0 Newcastle Jets - Neto 12'"));
        assert!(!t.mentions_tracked("Newcastle Jets [1] - 0 Sydney FC - Jones 12'"));
    }

    #[test]
    fn colliding_aliases_keep_the_first_owner() {
        let t = TeamTable::from_toml_str(
            r#"
[[teams]]
name = "Alpha"
aliases = ["Shared"]

[[teams]]
name = "Beta"
aliases = ["Shared"]
"#,
        )
        .unwrap();
        assert_eq!(canon(&t, "shared"), Some("alpha".into()));
        assert_eq!(t.get(&TeamKey("beta".into())).map(|x| x.color), Some(0x808080));
    }

    #[test]
    fn normalize_phrase_rules() {
        assert_eq!(normalize_phrase("  Brighton & Hove  "), "brighton and hove");
        assert_eq!(normalize_phrase("Atlético Madrid!"), "atletico madrid");
        assert_eq!(normalize_phrase("Nott’m Forest"), "nott'm forest");
    }
}
