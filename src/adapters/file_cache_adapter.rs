//! On-disk JSON cache: one file per (symbol, timeframe, day).
//!
//! Files live at `<dir>/<symbol>_<timeframe>_<YYYY-MM-DD>.json`. Writes go to
//! a temporary file in the same directory which is then renamed over the
//! target, so readers only ever see complete files. Eviction goes by file
//! modification time.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, warn};

use crate::domain::candle::Candle;
use crate::domain::error::TraderError;
use crate::ports::cache_port::{CacheKey, CachePort};

pub struct FileCacheAdapter {
    dir: PathBuf,
}

impl FileCacheAdapter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.stem()))
    }

    fn cache_err(action: &str, path: &Path, e: impl std::fmt::Display) -> TraderError {
        TraderError::Cache {
            reason: format!("failed to {action} {}: {e}", path.display()),
        }
    }
}

impl CachePort for FileCacheAdapter {
    fn load(&self, key: &CacheKey) -> Result<Option<Vec<Candle>>, TraderError> {
        let path = self.path_for(key);
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Self::cache_err("read", &path, e)),
        };

        match serde_json::from_str::<Vec<Candle>>(&content) {
            Ok(candles) => Ok(Some(candles)),
            Err(e) => {
                // A corrupt entry is treated as missing and rewritten on the next save.
                warn!(path = %path.display(), error = %e, "ignoring unreadable cache file");
                Ok(None)
            }
        }
    }

    fn save(&self, key: &CacheKey, candles: &[Candle]) -> Result<(), TraderError> {
        fs::create_dir_all(&self.dir).map_err(|e| Self::cache_err("create", &self.dir, e))?;

        let path = self.path_for(key);
        let body =
            serde_json::to_string_pretty(candles).map_err(|e| Self::cache_err("encode", &path, e))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)
            .map_err(|e| Self::cache_err("create temp file in", &self.dir, e))?;
        tmp.write_all(body.as_bytes())
            .and_then(|_| tmp.flush())
            .map_err(|e| Self::cache_err("write", &path, e))?;
        tmp.persist(&path)
            .map_err(|e| Self::cache_err("rename into", &path, e.error))?;

        debug!(path = %path.display(), candles = candles.len(), "wrote cache file");
        Ok(())
    }

    fn evict_older_than(&self, cutoff: SystemTime) -> Result<usize, TraderError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(Self::cache_err("list", &self.dir, e)),
        };

        let mut removed = 0;
        for entry in entries {
            let entry = entry.map_err(|e| Self::cache_err("list", &self.dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .map_err(|e| Self::cache_err("stat", &path, e))?;
            if modified < cutoff {
                fs::remove_file(&path).map_err(|e| Self::cache_err("remove", &path, e))?;
                debug!(path = %path.display(), "evicted cache file");
                removed += 1;
            }
        }
        Ok(removed)
    }
}
