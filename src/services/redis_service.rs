// src/services/redis_service.rs
use crate::errors::OutfitError;
use crate::models::AnalysisResponse;
use crate::services::cache::AnalysisCache;
use async_trait::async_trait;
use redis::{AsyncCommands, Client};
use std::time::Duration;

pub struct RedisAnalysisCache {
    client: Client,
    ttl_secs: usize,
}

impl RedisAnalysisCache {
    pub async fn new(redis_url: &str, ttl: Duration) -> Result<Self, OutfitError> {
        let client = Client::open(redis_url).map_err(|e| OutfitError::Cache(e.to_string()))?;

        // Test connection
        let mut conn = client
            .get_async_connection()
            .await
            .map_err(|e| OutfitError::Cache(e.to_string()))?;

        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| OutfitError::Cache(e.to_string()))?;

        Ok(Self {
            client,
            ttl_secs: ttl.as_secs().max(1) as usize,
        })
    }

    fn key(hash: &str) -> String {
        format!("analysis:{}", hash)
    }
}

#[async_trait]
impl AnalysisCache for RedisAnalysisCache {
    async fn get(&self, key: &str) -> Result<Option<AnalysisResponse>, OutfitError> {
        let mut conn = self
            .client
            .get_async_connection()
            .await
            .map_err(|e| OutfitError::Cache(e.to_string()))?;

        let value: Option<String> = conn
            .get(Self::key(key))
            .await
            .map_err(|e| OutfitError::Cache(e.to_string()))?;

        value
            .map(|v| serde_json::from_str(&v).map_err(|e| OutfitError::Cache(e.to_string())))
            .transpose()
    }

    async fn set(&self, key: &str, value: &AnalysisResponse) -> Result<(), OutfitError> {
        let mut conn = self
            .client
            .get_async_connection()
            .await
            .map_err(|e| OutfitError::Cache(e.to_string()))?;

        let value = serde_json::to_string(value).map_err(|e| OutfitError::Cache(e.to_string()))?;

        conn.set_ex::<_, _, ()>(Self::key(key), value, self.ttl_secs)
            .await
            .map_err(|e| OutfitError::Cache(e.to_string()))?;

        Ok(())
    }
}
