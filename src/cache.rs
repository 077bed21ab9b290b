use crate::repo::Repo;
use anyhow::{Context, Result};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// How long a saved repository list counts as fresh, in seconds.
pub const CACHE_TTL_SECS: i64 = 5 * 60;

/// Distinguishes temp files of saves racing within this process
static SAVE_SEQ: AtomicUsize = AtomicUsize::new(0);

/// On-disk cache file contents, one file per account.
#[derive(Debug, Serialize, Deserialize)]
pub struct CachedData {
    pub username: String,
    pub cached_at: DateTime<Utc>,
    pub repos: Vec<Repo>,
}

#[derive(Debug)]
pub struct CacheHit {
    pub repos: Vec<Repo>,
    pub fresh: bool,
}

/// Read-through repository cache rooted at a directory.
#[derive(Debug, Clone)]
pub struct Cache {
    dir: PathBuf,
}

impl Cache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn default_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gh-repo-review")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_path(&self, username: &str) -> PathBuf {
        self.dir.join(format!("{}-repos.json", username))
    }

    /// Load the cached repos for `username`.
    ///
    /// A missing or unparsable file is a miss (`Ok(None)`), not an error.
    pub async fn load(&self, username: &str) -> Result<Option<CacheHit>> {
        let path = self.file_path(username);
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("reading cache {}", path.display()))
            }
        };

        let cached: CachedData = match serde_json::from_slice(&data) {
            Ok(cached) => cached,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "corrupt cache, ignoring");
                return Ok(None);
            }
        };

        let fresh = is_fresh(cached.cached_at, Utc::now());
        tracing::debug!(username, count = cached.repos.len(), fresh, "cache hit");
        Ok(Some(CacheHit {
            repos: cached.repos,
            fresh,
        }))
    }

    /// Write the repos for `username`. The file is replaced with a rename so
    /// readers and concurrent saves never see a partial write.
    pub async fn save(&self, username: &str, repos: &[Repo]) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("creating cache dir {}", self.dir.display()))?;

        let cached = CachedData {
            username: username.to_string(),
            cached_at: Utc::now(),
            repos: repos.to_vec(),
        };
        let data = serde_json::to_vec(&cached).context("serializing cache")?;

        let path = self.file_path(username);
        let seq = SAVE_SEQ.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!("json.{}.{}.tmp", std::process::id(), seq));
        tokio::fs::write(&tmp, data)
            .await
            .with_context(|| format!("writing cache {}", tmp.display()))?;

        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e).with_context(|| format!("replacing cache {}", path.display()));
        }
        Ok(())
    }
}

pub fn is_fresh(cached_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now - cached_at < TimeDelta::seconds(CACHE_TTL_SECS)
}
