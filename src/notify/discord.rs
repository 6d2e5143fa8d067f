use super::{GoalAlert, Notifier};
use crate::config::DiscordSettings;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;

#[derive(Clone)]
pub struct DiscordNotifier {
    webhook: String,
    username: String,
    avatar_url: Option<String>,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl DiscordNotifier {
    pub fn new(settings: &DiscordSettings) -> Self {
        Self {
            webhook: settings.webhook_url.clone(),
            username: settings.username.clone(),
            avatar_url: settings.avatar_url.clone(),
            client: Client::new(),
            timeout: Duration::from_secs(5),
            max_retries: 3,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    fn payload(&self, alert: &GoalAlert) -> DiscordWebhookPayload {
        let fields = alert
            .permalink
            .iter()
            .map(|p| DiscordField {
                name: "Discussion".to_string(),
                value: p.clone(),
                inline: false,
            })
            .collect();

        DiscordWebhookPayload {
            username: self.username.clone(),
            avatar_url: self.avatar_url.clone(),
            embeds: vec![DiscordEmbed {
                title: format!("**{}**", alert.title),
                description: alert.clip_url.clone(),
                color: alert.color,
                timestamp: alert.timestamp.to_rfc3339(),
                thumbnail: alert.logo.clone().map(|url| DiscordThumbnail { url }),
                fields,
            }],
        }
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn send(&self, alert: &GoalAlert) -> Result<()> {
        let payload = self.payload(alert);

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&self.webhook)
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await;

            match res {
                Ok(rsp) if rsp.status() == StatusCode::TOO_MANY_REQUESTS => {
                    let retry_after = rsp
                        .headers()
                        .get("retry-after")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("unknown")
                        .to_string();
                    return Err(anyhow!("Discord rate limited (retry after {retry_after}s)"));
                }
                Ok(rsp) => {
                    if let Err(e) = rsp.error_for_status_ref() {
                        if attempt < self.max_retries {
                            tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
                            continue;
                        }
                        return Err(anyhow!("Discord webhook HTTP error: {e}"));
                    }
                    return Ok(());
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
                        continue;
                    }
                    return Err(anyhow!("Discord webhook request failed: {e}"));
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "discord"
    }
}

#[derive(Serialize)]
struct DiscordThumbnail {
    url: String,
}

#[derive(Serialize)]
struct DiscordField {
    name: String,
    value: String,
    inline: bool,
}

#[derive(Serialize)]
struct DiscordEmbed {
    title: String,
    description: String,
    color: u32,
    timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    thumbnail: Option<DiscordThumbnail>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fields: Vec<DiscordField>,
}

#[derive(Serialize)]
struct DiscordWebhookPayload {
    username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    avatar_url: Option<String>,
    embeds: Vec<DiscordEmbed>,
}
