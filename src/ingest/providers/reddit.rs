use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use once_cell::sync::Lazy;
use quick_xml::de::from_str;
use regex::Regex;
use serde::Deserialize;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::ingest::types::{RawAnnouncement, SourceProvider};

const USER_AGENT: &str = concat!("goal-dedup/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct Feed {
    #[serde(rename = "entry", default)]
    entries: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    title: Option<String>,
    link: Option<Link>,
    content: Option<Content>,
    published: Option<String>,
    updated: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Link {
    #[serde(rename = "@href")]
    href: String,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(rename = "$text", default)]
    html: String,
}

/// `<a href="...">[link]</a>` inside the entry body points at the clip itself.
static CLIP_LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<a\s+href="(?P<href>[^"]+)"[^>]*>\s*\[link\]\s*</a>"#).expect("clip link regex")
});

fn parse_rfc3339(ts: &str) -> Option<DateTime<Utc>> {
    OffsetDateTime::parse(ts.trim(), &Rfc3339)
        .ok()
        .and_then(|dt| DateTime::from_timestamp(dt.unix_timestamp(), dt.nanosecond()))
}

fn clip_link(content_html: &str) -> Option<String> {
    CLIP_LINK_RE
        .captures(content_html)
        .and_then(|c| c.name("href"))
        .map(|m| html_escape::decode_html_entities(m.as_str()).to_string())
}

/// Reddit subreddit Atom feed (`/r/soccer/new/.rss`).
pub struct RedditFeedProvider {
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

impl RedditFeedProvider {
    pub fn from_fixture_str(s: &str) -> Self {
        Self {
            mode: Mode::Fixture(s.to_string()),
        }
    }

    pub fn from_url(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .context("building feed http client")?;
        Ok(Self {
            mode: Mode::Http {
                url: url.into(),
                client,
            },
        })
    }

    fn parse_entries_from_str(s: &str, observed_at: DateTime<Utc>) -> Result<Vec<RawAnnouncement>> {
        let t0 = std::time::Instant::now();
        let feed: Feed = from_str(s).context("parsing reddit atom xml")?;

        let mut out = Vec::with_capacity(feed.entries.len());
        for entry in feed.entries {
            let text = crate::ingest::normalize_text(entry.title.as_deref().unwrap_or_default());
            if text.is_empty() {
                continue;
            }
            let permalink = entry.link.map(|l| l.href);
            let clip = entry.content.as_ref().and_then(|c| clip_link(&c.html));
            let Some(source_url) = clip.or_else(|| permalink.clone()) else {
                tracing::debug!(target: "ingest", %text, "entry without any link");
                continue;
            };
            let published_at = entry
                .published
                .as_deref()
                .or(entry.updated.as_deref())
                .and_then(parse_rfc3339);

            out.push(RawAnnouncement {
                text,
                source_url,
                observed_at,
                published_at,
                permalink,
            });
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("ingest_parse_ms").record(ms);
        counter!("ingest_events_total").increment(out.len() as u64);
        Ok(out)
    }
}

#[async_trait]
impl SourceProvider for RedditFeedProvider {
    async fn fetch_latest(&self) -> Result<Vec<RawAnnouncement>> {
        let now = Utc::now();
        match &self.mode {
            Mode::Fixture(s) => Self::parse_entries_from_str(s, now),
            Mode::Http { url, client } => {
                let resp = client
                    .get(url.as_str())
                    .send()
                    .await
                    .context("reddit http get()")?
                    .error_for_status()
                    .context("reddit http status")?;
                let body = resp.text().await.context("reddit http .text()")?;
                Self::parse_entries_from_str(&body, now)
            }
        }
    }

    fn name(&self) -> &'static str {
        "Reddit"
    }
}
