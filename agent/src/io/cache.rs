//! Response caching for model calls.
//!
//! Replies are keyed by [`ChatRequest::fingerprint`]. The file store keeps one
//! JSON file per key under the cache directory (`{dir}/{key}.json`) so replays
//! of a scenario are deterministic across processes.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::io::model::{ChatRequest, ModelClient};

/// Generic get/set store for model replies.
pub trait ResponseCache {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn put(&self, key: &str, response: &str) -> Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    key: String,
    response: String,
}

/// File-backed cache.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl ResponseCache for FileCache {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.entry_path(key);
        if !path.exists() {
            return Ok(None);
        }
        debug!(path = %path.display(), "loading cached response");
        let content =
            fs::read_to_string(&path).with_context(|| format!("read cache {}", path.display()))?;
        let entry: CacheEntry = serde_json::from_str(&content)
            .with_context(|| format!("parse cache {}", path.display()))?;
        Ok(Some(entry.response))
    }

    fn put(&self, key: &str, response: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("create cache dir {}", self.dir.display()))?;
        let path = self.entry_path(key);
        let entry = CacheEntry {
            key: key.to_string(),
            response: response.to_string(),
        };
        let content = serde_json::to_string_pretty(&entry)?;
        fs::write(&path, content).with_context(|| format!("write cache {}", path.display()))?;
        debug!(path = %path.display(), "saved response to cache");
        Ok(())
    }
}

/// In-process cache.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResponseCache for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("memory cache lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, response: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("memory cache lock poisoned"))?;
        entries.insert(key.to_string(), response.to_string());
        Ok(())
    }
}

/// Model client that consults `cache` before calling `inner`.
///
/// Only successful replies are stored. Cache failures are logged and treated
/// as misses; they never fail the call.
pub struct CachedModel<M, C> {
    inner: M,
    cache: C,
}

impl<M: ModelClient, C: ResponseCache> CachedModel<M, C> {
    pub fn new(inner: M, cache: C) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }
}

impl<M: ModelClient, C: ResponseCache> ModelClient for CachedModel<M, C> {
    fn complete(&self, request: &ChatRequest) -> Result<String> {
        let key = request.fingerprint();
        match self.cache.get(&key) {
            Ok(Some(hit)) => {
                debug!(%key, "model cache hit");
                return Ok(hit);
            }
            Ok(None) => debug!(%key, "model cache miss"),
            Err(err) => warn!(%key, err = %format!("{err:#}"), "model cache read failed"),
        }

        let reply = self.inner.complete(request)?;
        if let Err(err) = self.cache.put(&key, &reply) {
            warn!(%key, err = %format!("{err:#}"), "model cache write failed");
        }
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedModel;

    fn request(user: &str) -> ChatRequest {
        ChatRequest {
            model: "m".to_string(),
            system: "s".to_string(),
            user: user.to_string(),
            temperature: 0.0,
            top_p: 0.1,
            max_tokens: 10,
        }
    }

    #[test]
    fn file_cache_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cache = FileCache::new(temp.path().join("llm"));
        assert_eq!(cache.get("abc").expect("get"), None);
        cache.put("abc", "{\"reasoning\":\"r\"}").expect("put");
        assert_eq!(
            cache.get("abc").expect("get").as_deref(),
            Some("{\"reasoning\":\"r\"}")
        );
        assert!(cache.entry_path("abc").ends_with("llm/abc.json"));
    }

    #[test]
    fn second_identical_request_is_served_from_cache() {
        let model = ScriptedModel::new(["first", "second"]);
        let cached = CachedModel::new(&model, MemoryCache::new());

        assert_eq!(cached.complete(&request("obs")).expect("complete"), "first");
        assert_eq!(cached.complete(&request("obs")).expect("complete"), "first");
        assert_eq!(model.calls(), 1);
        assert_eq!(
            cached.complete(&request("other")).expect("complete"),
            "second"
        );
        assert_eq!(cached.cache().len(), 2);
    }

    #[test]
    fn failures_are_not_cached() {
        let model = ScriptedModel::from_results(vec![
            Err("rate limited".to_string()),
            Ok("ok".to_string()),
        ]);
        let cached = CachedModel::new(&model, MemoryCache::new());

        assert!(cached.complete(&request("obs")).is_err());
        assert!(cached.cache().is_empty());
        assert_eq!(cached.complete(&request("obs")).expect("complete"), "ok");
    }

    #[test]
    fn unreadable_cache_entry_is_a_miss() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cache = FileCache::new(temp.path());
        let req = request("obs");
        fs::write(cache.entry_path(&req.fingerprint()), "not json").expect("write");

        let model = ScriptedModel::new(["fresh"]);
        let cached = CachedModel::new(&model, cache);
        assert_eq!(cached.complete(&req).expect("complete"), "fresh");
        assert_eq!(model.calls(), 1);
    }
}
