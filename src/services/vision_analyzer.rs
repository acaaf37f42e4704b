// src/services/vision_analyzer.rs
use crate::errors::OutfitError;
use crate::models::{AnalysisResult, UploadedImage};
use crate::services::json_extract::extract_json;
use crate::services::providers::VisionModel;
use log::{debug, error};
use std::sync::Arc;

const ANALYSIS_PROMPT: &str = r#"
You are a professional fashion stylist. Analyze the outfit in this photo and
respond with ONLY a JSON object, no markdown and no commentary, shaped like:

{
  "scores": { "overall": 8, "style": 7, "practicality": 9, "creativity": 6, "colorMatch": 8 },
  "styleAnalysis": {
    "mainStyle": "primary style, e.g. minimalist, streetwear, smart casual",
    "subStyle": "secondary style element",
    "seasonality": "best-suited season",
    "colorScheme": "dominant colors and how they combine",
    "keyElements": ["key garments or accessories"]
  },
  "advantages": ["3-5 strengths of the outfit"],
  "recommendations": ["3-5 concrete improvement suggestions"],
  "occasions": ["2-3 suitable occasions"],
  "matchingTags": ["search keywords covering style, items and colors"]
}

Every score must be a number between 1 and 10 (not a string).
"#;

const DESCRIPTION_PROMPT: &str = r#"
You are a professional fashion analyst. Describe the outfit in this photo in
one detailed paragraph covering: apparent gender and age group, each garment
(type, material, color, cut), shoes, accessories, the overall style, suitable
occasions, season, and the color palette. Focus on traits that help find
similar outfits. Plain prose only.
"#;

/// Structured scoring of an outfit photo.
pub struct VisionAnalyzer {
    model: Arc<dyn VisionModel>,
}

impl VisionAnalyzer {
    pub fn new(model: Arc<dyn VisionModel>) -> Self {
        Self { model }
    }

    /// Single attempt; retries belong to the caller.
    pub async fn analyze(&self, image: &UploadedImage) -> Result<AnalysisResult, OutfitError> {
        let text = self
            .model
            .generate(&image.data, &image.mime_type, ANALYSIS_PROMPT)
            .await?;
        debug!("Vision model returned: {}", text);
        parse_analysis(&text)
    }
}

/// Recovers an `AnalysisResult` from model text, coercing numeric-string scores.
pub fn parse_analysis(text: &str) -> Result<AnalysisResult, OutfitError> {
    let json = extract_json(text).ok_or_else(|| {
        error!("No JSON object in analysis output: {}", text);
        OutfitError::Parse("analysis output contained no JSON object".to_string())
    })?;

    serde_json::from_str::<AnalysisResult>(&json).map_err(|e| {
        error!("Analysis JSON did not match the expected shape: {} ({})", json, e);
        OutfitError::Parse(format!("analysis output had an unexpected shape: {}", e))
    })
}

/// Free-text description of an outfit photo, consumed by query synthesis.
pub struct StyleDescriber {
    model: Arc<dyn VisionModel>,
}

impl StyleDescriber {
    pub fn new(model: Arc<dyn VisionModel>) -> Self {
        Self { model }
    }

    pub async fn describe(&self, image: &UploadedImage) -> Result<String, OutfitError> {
        let text = self
            .model
            .generate(&image.data, &image.mime_type, DESCRIPTION_PROMPT)
            .await?;

        let description = text.trim();
        if description.is_empty() {
            return Err(OutfitError::ExternalService(
                "vision model returned an empty description".to_string(),
            ));
        }
        Ok(description.to_string())
    }
}
