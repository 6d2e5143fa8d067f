//! On-disk state: the window store (`posted_scores.json`) and the set of
//! already processed URLs (`posted_urls.json`).
//!
//! Load is forgiving: a missing file means empty state, a broken entry is
//! dropped with a warning and startup continues.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;

use crate::dedup::DedupEngine;
use crate::ingest::SeenUrls;
use crate::window::WindowStore;

pub const SCORES_FILE: &str = "posted_scores.json";
pub const URLS_FILE: &str = "posted_urls.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedEntry {
    inserted_at: String,
    source_url: String,
}

/// Owns the state directory; writes are serialized so a slow write can never
/// overwrite a newer one.
#[derive(Debug)]
pub struct StateFiles {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl StateFiles {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn scores_path(&self) -> PathBuf {
        self.dir.join(SCORES_FILE)
    }

    pub fn urls_path(&self) -> PathBuf {
        self.dir.join(URLS_FILE)
    }

    /// Restore persisted window entries into the engine's store. Entries are
    /// rebuilt from their key text, so anything that no longer extracts as a
    /// goal is dropped. Returns how many entries were restored.
    pub async fn load_window(&self, engine: &DedupEngine, now: DateTime<Utc>) -> usize {
        let path = self.scores_path();
        let Some(raw) = read_json_object(&path).await else {
            return 0;
        };

        let horizon = engine.config().retention;
        let mut entries = Vec::with_capacity(raw.len());
        for (key, value) in raw {
            let entry: PersistedEntry = match serde_json::from_value(value) {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!(target: "persist", error = %e, "dropping malformed window entry");
                    continue;
                }
            };
            let inserted_at = match DateTime::parse_from_rfc3339(&entry.inserted_at) {
                Ok(ts) => ts.with_timezone(&Utc),
                Err(e) => {
                    tracing::warn!(
                        target: "persist",
                        error = %e,
                        value = %entry.inserted_at,
                        "dropping window entry with bad timestamp"
                    );
                    continue;
                }
            };
            if (now - inserted_at).to_std().is_ok_and(|age| age > horizon) {
                continue;
            }
            let Some(event) = engine.build_event(&key, &entry.source_url, inserted_at) else {
                tracing::warn!(target: "persist", text = %key, "dropping window entry that is not a goal");
                continue;
            };
            entries.push((key, Arc::new(event), inserted_at));
        }

        let restored = engine.store().restore(entries);
        tracing::info!(target: "persist", restored, "window state loaded");
        restored
    }

    pub async fn save_window(&self, store: &WindowStore) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let map: BTreeMap<String, PersistedEntry> = store
            .persisted()
            .into_iter()
            .map(|(key, source_url, inserted_at)| {
                (
                    key,
                    PersistedEntry {
                        inserted_at: inserted_at.to_rfc3339(),
                        source_url,
                    },
                )
            })
            .collect();
        write_json(&self.dir, &self.scores_path(), &map).await
    }

    pub async fn load_urls(&self) -> SeenUrls {
        let seen = SeenUrls::default();
        let Some(raw) = read_json_object(&self.urls_path()).await else {
            return seen;
        };
        for (url, value) in raw {
            let parsed = value
                .as_str()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|ts| ts.with_timezone(&Utc));
            match parsed {
                Some(ts) => {
                    seen.mark(&url, ts);
                }
                None => tracing::warn!(target: "persist", %url, "dropping seen url with bad timestamp"),
            }
        }
        tracing::info!(target: "persist", urls = seen.len(), "seen urls loaded");
        seen
    }

    pub async fn save_urls(&self, seen: &SeenUrls) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let map: BTreeMap<String, String> = seen
            .entries()
            .into_iter()
            .map(|(url, ts)| (url, ts.to_rfc3339()))
            .collect();
        write_json(&self.dir, &self.urls_path(), &map).await
    }
}

async fn read_json_object(path: &Path) -> Option<serde_json::Map<String, serde_json::Value>> {
    let s = match fs::read_to_string(path).await {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!(target: "persist", path = %path.display(), "read state: {e:#}");
            return None;
        }
    };
    match serde_json::from_str::<serde_json::Value>(&s) {
        Ok(serde_json::Value::Object(map)) => Some(map),
        Ok(_) => {
            tracing::warn!(target: "persist", path = %path.display(), "state file is not a JSON object");
            None
        }
        Err(e) => {
            tracing::warn!(target: "persist", path = %path.display(), "parse state: {e:#}");
            None
        }
    }
}

async fn write_json<T: Serialize>(dir: &Path, path: &Path, value: &T) -> Result<()> {
    fs::create_dir_all(dir)
        .await
        .with_context(|| format!("creating state dir {}", dir.display()))?;
    let bytes = serde_json::to_vec_pretty(value).context("serializing state")?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes)
        .await
        .with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .await
        .with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}
