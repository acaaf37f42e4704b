// src/services/providers.rs
// Capability seams for the hosted models the pipeline depends on.
use crate::errors::OutfitError;
use async_trait::async_trait;
use serde::Deserialize;

#[async_trait]
pub trait VisionModel: Send + Sync {
    async fn generate(
        &self,
        image: &[u8],
        mime_type: &str,
        prompt: &str,
    ) -> Result<String, OutfitError>;
}

#[async_trait]
pub trait TextModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, OutfitError>;
}

/// One untyped hit as returned by an image search backend.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawSearchHit {
    pub title: Option<String>,
    pub link: Option<String>,
    pub display_link: Option<String>,
    pub snippet: Option<String>,
    pub image: Option<RawImageInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawImageInfo {
    pub context_link: Option<String>,
    pub thumbnail_link: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub thumbnail_width: Option<u32>,
    pub thumbnail_height: Option<u32>,
}

#[async_trait]
pub trait ImageSearchProvider: Send + Sync {
    /// Short tag stored on every result produced by this provider.
    fn name(&self) -> &str;

    async fn search(&self, query: &str, site_filter: &str)
    -> Result<Vec<RawSearchHit>, OutfitError>;
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Returns encoded image bytes.
    async fn generate(&self, prompt: &str) -> Result<Vec<u8>, OutfitError>;
}
