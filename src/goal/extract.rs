// src/goal/extract.rs
//! Title → candidate goal record.
//!
//! Recognized score forms (whitespace around the dash is optional):
//! - `Arsenal [3] - 1 Crystal Palace` → left side scored
//! - `Arsenal 1 - [3] Crystal Palace` → right side scored
//! - `Arsenal [3-1] Crystal Palace`   → fully bracketed, read as left side scored
//!
//! Minute markers: `81'`, `90+2'` (straight, curly or prime apostrophe).
//! Anything without both a score and a minute is `NotAnEvent`.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::{Minute, ScoreState, Side};

static SCORE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"\[\s*(?P<fs>\d{1,3})\s*[-–—]\s*(?P<fo>\d{1,3})\s*\]",
        r"|\[\s*(?P<ls>\d{1,3})\s*\]\s*[-–—]\s*(?P<lo>\d{1,3})",
        r"|(?P<ro>\d{1,3})\s*[-–—]\s*\[\s*(?P<rs>\d{1,3})\s*\]",
    ))
    .expect("score regex")
});

static MINUTE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?P<base>\d{1,3})(?:\s?\+\s?(?P<extra>\d{1,2}))?\s?['’′]").expect("minute regex")
});

/// Structured view of a title before canonicalization. Substrings borrow from
/// the input text.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate<'a> {
    pub score: ScoreState,
    pub scoring_side: Side,
    pub minute: Minute,
    /// Raw scorer substring, `None` when the title has no separator before the minute.
    pub scorer_text: Option<&'a str>,
    /// `(left, right)` team substrings, `None` unless both are non-empty.
    pub team_texts: Option<(&'a str, &'a str)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Extraction<'a> {
    Event(Candidate<'a>),
    NotAnEvent,
}

impl<'a> Extraction<'a> {
    pub fn is_event(&self) -> bool {
        matches!(self, Extraction::Event(_))
    }

    pub fn candidate(self) -> Option<Candidate<'a>> {
        match self {
            Extraction::Event(c) => Some(c),
            Extraction::NotAnEvent => None,
        }
    }
}

/// Parse `text` into a candidate goal record. Pure; never fails.
pub fn extract(text: &str) -> Extraction<'_> {
    let Some(caps) = SCORE_RE.captures(text) else {
        return Extraction::NotAnEvent;
    };
    let Some(whole) = caps.get(0) else {
        return Extraction::NotAnEvent;
    };
    let Some((score, scoring_side)) = score_from(&caps) else {
        return Extraction::NotAnEvent;
    };
    let (score_start, score_end) = (whole.start(), whole.end());

    // Prefer the first marker after the score; fall back to any marker.
    let minute_caps = MINUTE_RE
        .captures_at(text, score_end)
        .or_else(|| MINUTE_RE.captures(text));
    let Some(mcaps) = minute_caps else {
        return Extraction::NotAnEvent;
    };
    let Some(minute) = minute_from(&mcaps) else {
        return Extraction::NotAnEvent;
    };
    let Some(mmatch) = mcaps.get(0) else {
        return Extraction::NotAnEvent;
    };

    let minute_follows_score = mmatch.start() >= score_end;

    let left_start = if minute_follows_score {
        0
    } else {
        mmatch.end().min(score_start)
    };
    let left = clean_segment(&text[left_start..score_start]);

    let region_end = if minute_follows_score {
        mmatch.start()
    } else {
        text.len()
    };
    let region = &text[score_end..region_end];

    let (right, scorer_text) = match last_separator(region) {
        Some((at, len)) if minute_follows_score => {
            let scorer = clean_segment(&region[at + len..]);
            (
                clean_segment(&region[..at]),
                (!scorer.is_empty()).then_some(scorer),
            )
        }
        Some((at, _)) => (clean_segment(&region[..at]), None),
        None => (clean_segment(region), None),
    };

    let team_texts = (!left.is_empty() && !right.is_empty()).then_some((left, right));

    Extraction::Event(Candidate {
        score,
        scoring_side,
        minute,
        scorer_text,
        team_texts,
    })
}

fn score_from(caps: &Captures<'_>) -> Option<(ScoreState, Side)> {
    let num = |name: &str| caps.name(name).and_then(|m| m.as_str().parse::<u32>().ok());

    let (scoring, other, side) = if let (Some(s), Some(o)) = (num("fs"), num("fo")) {
        (s, o, Side::Left)
    } else if let (Some(s), Some(o)) = (num("ls"), num("lo")) {
        (s, o, Side::Left)
    } else if let (Some(s), Some(o)) = (num("rs"), num("ro")) {
        (s, o, Side::Right)
    } else {
        return None;
    };

    Some((
        ScoreState {
            scoring_count: scoring,
            other_count: other,
        },
        side,
    ))
}

fn minute_from(caps: &Captures<'_>) -> Option<Minute> {
    let base = caps.name("base")?.as_str().parse().ok()?;
    let injury_offset = caps.name("extra").and_then(|m| m.as_str().parse().ok());
    Some(Minute {
        base,
        injury_offset,
    })
}

/// Byte offset and length of the last dash that separates segments, i.e. one
/// not sitting between two alphanumerics (`Smith-Rowe` keeps its hyphen).
fn last_separator(region: &str) -> Option<(usize, usize)> {
    let chars: Vec<(usize, char)> = region.char_indices().collect();
    for (i, &(at, ch)) in chars.iter().enumerate().rev() {
        if !matches!(ch, '-' | '–' | '—') {
            continue;
        }
        let prev_alnum = i > 0 && chars[i - 1].1.is_alphanumeric();
        let next_alnum = chars.get(i + 1).is_some_and(|&(_, c)| c.is_alphanumeric());
        if !(prev_alnum && next_alnum) {
            return Some((at, ch.len_utf8()));
        }
    }
    None
}

fn clean_segment(s: &str) -> &str {
    s.trim_matches(|c: char| c.is_whitespace() || matches!(c, '-' | '–' | '—' | ':' | '|' | ','))
}
