// src/config.rs
use crate::services::image_search::SiteGroup;
use crate::services::ranking::ScoringConfig;
use crate::services::retry::{Backoff, RetryPolicy};
use log::{info, warn};
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    Memory,
    Redis,
    Disabled,
}

impl FromStr for CacheBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(CacheBackend::Memory),
            "redis" => Ok(CacheBackend::Redis),
            "off" | "none" | "disabled" => Ok(CacheBackend::Disabled),
            other => Err(format!("unknown cache backend: {other}")),
        }
    }
}

/// Tunable ranking tables, loadable from a JSON file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RankingConfig {
    pub scoring: ScoringConfig,
    pub site_groups: Vec<SiteGroup>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub gemini_api_key: Option<String>,
    pub gemini_vision_model: String,
    pub gemini_text_model: String,
    pub google_search_api_key: Option<String>,
    pub google_search_engine_id: Option<String>,
    pub hugging_face_api_key: Option<String>,
    pub hugging_face_model: String,
    pub redis_url: Option<String>,
    pub cache_backend: CacheBackend,
    pub cache_ttl: Duration,
    pub max_upload_bytes: usize,
    pub max_image_dimension: u32,
    pub jpeg_quality: u8,
    pub retry: RetryPolicy,
    pub target_results: usize,
    pub scoring: ScoringConfig,
    pub site_groups: Vec<SiteGroup>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            gemini_api_key: None,
            gemini_vision_model: "gemini-1.5-flash".to_string(),
            gemini_text_model: "gemini-1.5-flash".to_string(),
            google_search_api_key: None,
            google_search_engine_id: None,
            hugging_face_api_key: None,
            hugging_face_model: "runwayml/stable-diffusion-v1-5".to_string(),
            redis_url: None,
            cache_backend: CacheBackend::Memory,
            cache_ttl: Duration::from_secs(24 * 60 * 60),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            max_image_dimension: 1200,
            jpeg_quality: 80,
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(1000),
                backoff: Backoff::Linear,
                call_timeout: Duration::from_secs(30),
            },
            target_results: 4,
            scoring: ScoringConfig::default(),
            site_groups: SiteGroup::defaults(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let redis_url = optional_env("REDIS_URL");
        let cache_backend = match optional_env("ANALYSIS_CACHE") {
            Some(value) => value.parse().map_err(anyhow::Error::msg)?,
            None if redis_url.is_some() => CacheBackend::Redis,
            None => defaults.cache_backend,
        };

        let retry = RetryPolicy {
            max_attempts: env_or("RETRY_ATTEMPTS", defaults.retry.max_attempts)?,
            base_delay: Duration::from_millis(env_or("RETRY_BASE_DELAY_MS", 1000u64)?),
            backoff: Backoff::Linear,
            call_timeout: Duration::from_secs(env_or("EXTERNAL_CALL_TIMEOUT_SECS", 30u64)?),
        };

        let ranking = match optional_env("RANKING_CONFIG_PATH") {
            Some(path) => {
                info!("Loading ranking tables from {}", path);
                let raw = std::fs::read_to_string(&path)?;
                serde_json::from_str::<RankingConfig>(&raw)?
            }
            None => RankingConfig::default(),
        };
        let site_groups = if ranking.site_groups.is_empty() {
            SiteGroup::defaults()
        } else {
            ranking.site_groups
        };

        let config = Self {
            bind_addr: optional_env("BIND_ADDR").unwrap_or(defaults.bind_addr),
            gemini_api_key: optional_env("GEMINI_API_KEY"),
            gemini_vision_model: optional_env("GEMINI_VISION_MODEL")
                .unwrap_or(defaults.gemini_vision_model),
            gemini_text_model: optional_env("GEMINI_TEXT_MODEL")
                .unwrap_or(defaults.gemini_text_model),
            google_search_api_key: optional_env("GOOGLE_SEARCH_API_KEY"),
            google_search_engine_id: optional_env("GOOGLE_SEARCH_ENGINE_ID"),
            hugging_face_api_key: optional_env("HUGGING_FACE_API_KEY"),
            hugging_face_model: optional_env("HUGGING_FACE_MODEL")
                .unwrap_or(defaults.hugging_face_model),
            redis_url,
            cache_backend,
            cache_ttl: Duration::from_secs(env_or("CACHE_TTL_SECS", 24 * 60 * 60u64)?),
            max_upload_bytes: env_or("MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
            max_image_dimension: env_or("MAX_IMAGE_DIMENSION", defaults.max_image_dimension)?,
            jpeg_quality: env_or("JPEG_QUALITY", defaults.jpeg_quality)?,
            retry,
            target_results: env_or("TARGET_RESULTS", defaults.target_results)?,
            scoring: ranking.scoring,
            site_groups,
        };

        if config.gemini_api_key.is_none() {
            warn!("GEMINI_API_KEY is not set; analysis requests will fail");
        }
        if config.google_search_api_key.is_none() || config.google_search_engine_id.is_none() {
            warn!("Google image search is not configured; recommendations will be empty");
        }

        Ok(config)
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid value for {key}: {e}")),
        None => Ok(default),
    }
}
