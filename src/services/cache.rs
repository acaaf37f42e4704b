// src/services/cache.rs
use crate::errors::OutfitError;
use crate::models::AnalysisResponse;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

/// Analysis results keyed by image content hash. Best-effort: callers log
/// and ignore failures.
#[async_trait]
pub trait AnalysisCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<AnalysisResponse>, OutfitError>;
    async fn set(&self, key: &str, value: &AnalysisResponse) -> Result<(), OutfitError>;
}

pub fn content_hash(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

pub struct MemoryAnalysisCache {
    ttl: chrono::Duration,
    entries: RwLock<HashMap<String, (DateTime<Utc>, AnalysisResponse)>>,
}

impl MemoryAnalysisCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(365)),
            entries: RwLock::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    fn lock_error() -> OutfitError {
        OutfitError::Cache("analysis cache lock poisoned".to_string())
    }
}

#[async_trait]
impl AnalysisCache for MemoryAnalysisCache {
    async fn get(&self, key: &str) -> Result<Option<AnalysisResponse>, OutfitError> {
        let now = Utc::now();
        {
            let entries = self.entries.read().map_err(|_| Self::lock_error())?;
            match entries.get(key) {
                None => return Ok(None),
                Some((stored_at, value)) if now - *stored_at < self.ttl => {
                    return Ok(Some(value.clone()));
                }
                Some(_) => {}
            }
        }

        // Expired: evict.
        let mut entries = self.entries.write().map_err(|_| Self::lock_error())?;
        if entries
            .get(key)
            .is_some_and(|(stored_at, _)| now - *stored_at >= self.ttl)
        {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &AnalysisResponse) -> Result<(), OutfitError> {
        let now = Utc::now();
        let mut entries = self.entries.write().map_err(|_| Self::lock_error())?;
        // Expired entries of keys never read again are dropped here.
        entries.retain(|_, (stored_at, _)| now - *stored_at < self.ttl);
        entries.insert(key.to_string(), (now, value.clone()));
        Ok(())
    }
}
