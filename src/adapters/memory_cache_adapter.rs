//! In-process cache store.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::SystemTime;

use crate::domain::candle::Candle;
use crate::domain::error::TraderError;
use crate::ports::cache_port::{CacheKey, CachePort};

#[derive(Debug, Default)]
pub struct MemoryCacheAdapter {
    entries: Mutex<HashMap<CacheKey, (Vec<Candle>, SystemTime)>>,
}

impl MemoryCacheAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn poisoned() -> TraderError {
        TraderError::Cache {
            reason: "memory cache lock poisoned".into(),
        }
    }
}

impl CachePort for MemoryCacheAdapter {
    fn load(&self, key: &CacheKey) -> Result<Option<Vec<Candle>>, TraderError> {
        let entries = self.entries.lock().map_err(|_| Self::poisoned())?;
        Ok(entries.get(key).map(|(candles, _)| candles.clone()))
    }

    fn save(&self, key: &CacheKey, candles: &[Candle]) -> Result<(), TraderError> {
        let mut entries = self.entries.lock().map_err(|_| Self::poisoned())?;
        entries.insert(key.clone(), (candles.to_vec(), SystemTime::now()));
        Ok(())
    }

    fn evict_older_than(&self, cutoff: SystemTime) -> Result<usize, TraderError> {
        let mut entries = self.entries.lock().map_err(|_| Self::poisoned())?;
        let before = entries.len();
        entries.retain(|_, (_, stored)| *stored >= cutoff);
        Ok(before - entries.len())
    }
}
