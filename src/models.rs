// src/models.rs
use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize};

/// An image received from the client. Lives for a single request.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub filename: Option<String>,
    pub mime_type: String,
    pub data: Bytes,
}

impl UploadedImage {
    pub fn new(mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            filename: None,
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scores {
    #[serde(deserialize_with = "lenient_score")]
    pub overall: f64,
    #[serde(deserialize_with = "lenient_score")]
    pub style: f64,
    #[serde(deserialize_with = "lenient_score")]
    pub practicality: f64,
    #[serde(
        default,
        deserialize_with = "lenient_optional_score",
        skip_serializing_if = "Option::is_none"
    )]
    pub creativity: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient_optional_score",
        skip_serializing_if = "Option::is_none"
    )]
    pub color_match: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StyleAnalysis {
    pub main_style: String,
    pub sub_style: String,
    pub seasonality: String,
    pub color_scheme: String,
    pub key_elements: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub scores: Scores,
    pub advantages: Vec<String>,
    pub recommendations: Vec<String>,
    pub occasions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_analysis: Option<StyleAnalysis>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matching_tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResponse {
    pub analysis: AnalysisResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendRequest {
    #[serde(default)]
    pub current_outfit: String,
    pub analysis: AnalysisResult,
    #[serde(default)]
    pub kids: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_height: Option<u32>,
}

/// One image hit after ingestion. `link` is the identity key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSearchResult {
    pub title: String,
    pub link: String,
    pub display_link: String,
    pub snippet: String,
    pub image: ImageMeta,
    pub source: String,
    pub site_group: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredResult {
    #[serde(flatten)]
    pub result: ImageSearchResult,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub queries: Vec<String>,
    pub results: Vec<ScoredResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutfitReport {
    pub analysis: AnalysisResult,
    pub style_description: String,
    pub queries: Vec<String>,
    pub results: Vec<ScoredResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageGenRequest {
    #[serde(default)]
    pub prompt: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HoroscopeRequest {
    #[serde(default)]
    pub zodiac_sign: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub weather: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub blood_type: String,
}

/// Scores arrive from model output either as numbers or numeric strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawScore {
    Number(f64),
    Text(String),
}

impl RawScore {
    fn into_number<E: serde::de::Error>(self) -> Result<f64, E> {
        match self {
            RawScore::Number(n) => Ok(n),
            RawScore::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| E::custom(format!("score {s:?} is not numeric"))),
        }
    }
}

fn lenient_score<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    RawScore::deserialize(deserializer)?.into_number()
}

fn lenient_optional_score<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<RawScore>::deserialize(deserializer)?
        .map(RawScore::into_number)
        .transpose()
}
