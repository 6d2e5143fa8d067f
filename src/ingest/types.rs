// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};

/// One announcement as delivered by a provider. Not retained past processing.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct RawAnnouncement {
    pub text: String,          // post title
    pub source_url: String,    // clip link
    pub observed_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub permalink: Option<String>, // discussion page, used in notifications
}

impl RawAnnouncement {
    pub fn new(text: impl Into<String>, source_url: impl Into<String>, observed_at: DateTime<Utc>) -> Self {
        Self {
            text: text.into(),
            source_url: source_url.into(),
            observed_at,
            published_at: None,
            permalink: None,
        }
    }
}

#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<RawAnnouncement>>;
    fn name(&self) -> &'static str;
}
