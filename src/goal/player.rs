// src/goal/player.rs
//! Scorer name → stable key.
//!
//! A curated alias table (`config/players.toml`, or `$PLAYERS_CONFIG_PATH`)
//! is consulted first; anything it does not know falls through to the surname
//! rule:
//! `"G. Jesus"`, `"Gabriel Jesus"` → `jesus`; `"Virgil van Dijk"` → `van dijk`;
//! `"E. Smith-Rowe"` → `smith-rowe`; `"João Félix"` → `felix`.

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

use super::teams::normalize_phrase;
use super::PlayerKey;

pub const DEFAULT_PLAYERS_CONFIG_PATH: &str = "config/players.toml";
pub const ENV_PLAYERS_CONFIG_PATH: &str = "PLAYERS_CONFIG_PATH";

const BUILTIN_PLAYERS_TOML: &str = include_str!("../../config/players.toml");

/// Words that glue a multi-word surname together.
const SURNAME_CONNECTORS: &[&str] = &["van", "de", "den", "der", "dos", "el", "al"];

static BUILTIN: Lazy<Arc<PlayerTable>> = Lazy::new(|| {
    Arc::new(PlayerTable::builtin().unwrap_or_else(|e| {
        tracing::warn!(target: "players", error = ?e, "built-in player table unusable; surname rule only");
        PlayerTable::default()
    }))
});

#[derive(Debug, Deserialize)]
struct PlayersFile {
    #[serde(default)]
    players: Vec<PlayerCfg>,
}

#[derive(Debug, Deserialize)]
struct PlayerCfg {
    name: String,
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    aliases: Vec<String>,
}

/// Immutable scorer alias table; build once at startup and share.
#[derive(Debug, Clone, Default)]
pub struct PlayerTable {
    by_phrase: HashMap<String, PlayerKey>,
}

impl PlayerTable {
    /// Load using env var + fallbacks:
    /// 1) $PLAYERS_CONFIG_PATH
    /// 2) config/players.toml
    /// 3) built-in table
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_PLAYERS_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("PLAYERS_CONFIG_PATH points to non-existent path"));
            }
            return Self::load_from(&pb);
        }
        let local = PathBuf::from(DEFAULT_PLAYERS_CONFIG_PATH);
        if local.exists() {
            return Self::load_from(&local);
        }
        Self::builtin()
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading player table from {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("parsing player table {}", path.display()))
    }

    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_PLAYERS_TOML).context("parsing built-in player table")
    }

    /// Process-wide copy of the built-in table.
    pub fn shared_builtin() -> Arc<Self> {
        Arc::clone(&BUILTIN)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let file: PlayersFile = toml::from_str(s)?;
        let mut by_phrase: HashMap<String, PlayerKey> = HashMap::new();

        for cfg in file.players {
            let key = match cfg.key.as_deref().map(str::trim) {
                Some(k) if !k.is_empty() => PlayerKey(fold_diacritics(k)),
                _ => surname_key(&cfg.name)
                    .ok_or_else(|| anyhow!("player entry with empty name"))?,
            };

            for phrase in std::iter::once(&cfg.name).chain(cfg.aliases.iter()) {
                let norm = normalize_phrase(&strip_parenthesized(phrase));
                if norm.is_empty() {
                    continue;
                }
                match by_phrase.get(&norm) {
                    Some(owner) if owner != &key => {
                        tracing::warn!(
                            target: "players",
                            alias = %norm,
                            kept = %owner,
                            ignored = %key,
                            "alias claimed by two players; keeping the first"
                        );
                    }
                    Some(_) => {}
                    None => {
                        by_phrase.insert(norm, key.clone());
                    }
                }
            }
        }

        Ok(Self { by_phrase })
    }

    pub fn len(&self) -> usize {
        self.by_phrase.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_phrase.is_empty()
    }

    /// Alias hit (whole phrase, then with initials dropped), else the surname rule.
    pub fn canonicalize(&self, raw: &str) -> Option<PlayerKey> {
        if raw.trim().is_empty() {
            return None;
        }
        self.lookup(raw).or_else(|| surname_key(raw))
    }

    fn lookup(&self, raw: &str) -> Option<PlayerKey> {
        let norm = normalize_phrase(&strip_parenthesized(raw));
        if let Some(k) = self.by_phrase.get(&norm) {
            return Some(k.clone());
        }
        // "H. Son" normalizes to "h son"
        let without_initials = norm
            .split(' ')
            .filter(|w| w.chars().count() > 1)
            .collect::<Vec<_>>()
            .join(" ");
        self.by_phrase.get(&without_initials).cloned()
    }
}

/// Lowercase and drop combining marks after canonical decomposition.
pub(crate) fn fold_diacritics(s: &str) -> String {
    s.nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

/// Canonicalize a raw scorer substring against the built-in alias table.
/// `None` only for blank input.
pub fn canonicalize_player(raw: &str) -> Option<PlayerKey> {
    BUILTIN.canonicalize(raw)
}

/// Surname-derived key with no alias lookup.
pub fn surname_key(raw: &str) -> Option<PlayerKey> {
    let folded = fold_diacritics(raw.trim());
    if folded.trim().is_empty() {
        return None;
    }

    let without_notes = strip_parenthesized(&folded);
    let words: Vec<&str> = without_notes
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| matches!(c, ',' | ';' | ':' | '!' | '?' | '"')))
        .filter(|w| !w.is_empty() && !is_initial(w))
        .collect();

    let key = match words.as_slice() {
        [] => folded.trim().to_string(),
        [only] => (*only).to_string(),
        [init @ .., last] => match init.iter().position(|w| SURNAME_CONNECTORS.contains(w)) {
            Some(i) => words[i..].join(" "),
            None => (*last).to_string(),
        },
    };

    Some(PlayerKey(key))
}

/// `g.` style abbreviations (one letter followed by a period).
fn is_initial(word: &str) -> bool {
    let mut chars = word.chars();
    matches!(
        (chars.next(), chars.next(), chars.next()),
        (Some(c), Some('.'), None) if c.is_alphabetic()
    )
}

/// Drop `(pen)`, `(og)` and similar notes.
fn strip_parenthesized(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut depth = 0usize;
    for ch in s.chars() {
        match ch {
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(ch),
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> String {
        canonicalize_player(s).map(|k| k.0).unwrap_or_default()
    }

    #[test]
    fn abbreviated_and_full_names_agree() {
        for (input, expected) in [
            ("Gabriel Jesus", "jesus"),
            ("G. Jesus", "jesus"),
            ("Eddie Nketiah", "nketiah"),
            ("E. Nketiah", "nketiah"),
            ("Mo Salah", "salah"),
            ("Saka", "saka"),
        ] {
            assert_eq!(key(input), expected, "input: {input}");
        }
    }

    #[test]
    fn diacritics_are_stripped() {
        assert_eq!(key("João Félix"), "felix");
        assert_eq!(key("J. Félix"), "felix");
        assert_eq!(key("Martin Ødegaard"), "ødegaard");
        assert_eq!(key("Odegaard"), "ødegaard");
    }

    #[test]
    fn connector_surnames_keep_the_tail() {
        assert_eq!(key("Virgil van Dijk"), "van dijk");
        assert_eq!(key("V. van Dijk"), "van dijk");
        assert_eq!(key("K. De Bruyne"), "de bruyne");
        assert_eq!(key("Kevin De Bruyne"), "de bruyne");
    }

    #[test]
    fn hyphenated_surnames_stay_whole() {
        assert_eq!(key("Smith-Rowe"), "smith-rowe");
        assert_eq!(key("E. Smith-Rowe"), "smith-rowe");
        assert_eq!(surname_key("Son Heung-min").map(|k| k.0).as_deref(), Some("heung-min"));
    }

    #[test]
    fn aliases_win_over_the_surname_rule() {
        assert_eq!(key("Son Heung-min"), "son");
        assert_eq!(key("Heung-min Son"), "son");
        assert_eq!(key("H. Son"), "son");
        assert_eq!(key("DCL"), "calvert-lewin");
        assert_eq!(key("Calvert-Lewin"), "calvert-lewin");
        assert_eq!(key("D. Calvert-Lewin (pen)"), "calvert-lewin");
        assert_eq!(key("KDB"), "de bruyne");
        assert_eq!(key("Emile Smith Rowe"), "smith-rowe");
    }

    #[test]
    fn custom_table_overrides() {
        let t = PlayerTable::from_toml_str(
            r#"
            [[players]]
            name = "Bukayo Saka"
            aliases = ["Starboy"]
            "#,
        )
        .unwrap();
        assert_eq!(t.canonicalize("Starboy").map(|k| k.0).as_deref(), Some("saka"));
        // unknown names still use the surname rule
        assert_eq!(t.canonicalize("Gabriel Jesus").map(|k| k.0).as_deref(), Some("jesus"));
        assert_eq!(t.canonicalize("  "), None);
    }

    #[test]
    fn alias_collision_keeps_first() {
        let t = PlayerTable::from_toml_str(
            r#"
            [[players]]
            name = "Bruno Fernandes"
            aliases = ["Bruno"]

            [[players]]
            name = "Bruno Guimarães"
            aliases = ["Bruno"]
            "#,
        )
        .unwrap();
        assert_eq!(t.canonicalize("Bruno").map(|k| k.0).as_deref(), Some("fernandes"));
        assert_eq!(t.canonicalize("Bruno Guimaraes").map(|k| k.0).as_deref(), Some("guimaraes"));
    }

    #[test]
    fn builtin_table_parses() {
        assert!(!PlayerTable::builtin().unwrap().is_empty());
    }

    #[test]
    fn notes_are_dropped() {
        assert_eq!(key("Mo Salah (pen)"), "salah");
    }

    #[test]
    fn degenerate_inputs() {
        assert_eq!(canonicalize_player("   "), None);
        // only an initial left: fall back to the whole lowered input
        assert_eq!(key("G."), "g.");
    }
}
