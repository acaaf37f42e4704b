// src/services/llm_service.rs
use crate::errors::OutfitError;
use crate::services::providers::{TextModel, VisionModel};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use log::{debug, error};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use std::time::Duration;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Gemini `generateContent` client, used for both vision and text prompts.
pub struct LLMService {
    api_key: Option<String>,
    vision_model: String,
    text_model: String,
    client: Client,
}

impl LLMService {
    pub fn new(
        api_key: Option<String>,
        vision_model: String,
        text_model: String,
        timeout: Duration,
    ) -> Result<Self, OutfitError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OutfitError::Configuration(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            api_key,
            vision_model,
            text_model,
            client,
        })
    }

    async fn generate_content(&self, model: &str, parts: Value) -> Result<String, OutfitError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| OutfitError::Configuration("Gemini API key not configured".to_string()))?;

        let response = self
            .client
            .post(format!("{}/{}:generateContent", GEMINI_API_BASE, model))
            .query(&[("key", api_key)])
            .json(&json!({
                "contents": [{ "parts": parts }],
                "generationConfig": {
                    "temperature": 0.2,
                    "topP": 0.8,
                    "maxOutputTokens": 2048,
                    "candidateCount": 1
                },
                "safetySettings": [
                    { "category": "HARM_CATEGORY_HARASSMENT", "threshold": "BLOCK_ONLY_HIGH" },
                    { "category": "HARM_CATEGORY_HATE_SPEECH", "threshold": "BLOCK_ONLY_HIGH" },
                    { "category": "HARM_CATEGORY_SEXUALLY_EXPLICIT", "threshold": "BLOCK_ONLY_HIGH" },
                    { "category": "HARM_CATEGORY_DANGEROUS_CONTENT", "threshold": "BLOCK_ONLY_HIGH" }
                ]
            }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OutfitError::Timeout(format!("Gemini request timed out: {}", e))
                } else {
                    OutfitError::ExternalService(format!("Gemini request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Gemini error response ({}): {}", status, error_text);
            return Err(classify_error(status, &error_text));
        }

        let result: Value = response
            .json()
            .await
            .map_err(|e| OutfitError::Parse(format!("Failed to parse Gemini response: {}", e)))?;
        debug!("Gemini raw response: {}", result);

        extract_candidate_text(&result)
    }
}

#[async_trait]
impl VisionModel for LLMService {
    async fn generate(
        &self,
        image: &[u8],
        mime_type: &str,
        prompt: &str,
    ) -> Result<String, OutfitError> {
        let base64_image = general_purpose::STANDARD.encode(image);
        let parts = json!([
            { "text": prompt },
            { "inline_data": { "mime_type": mime_type, "data": base64_image } }
        ]);
        self.generate_content(&self.vision_model, parts).await
    }
}

#[async_trait]
impl TextModel for LLMService {
    async fn generate(&self, prompt: &str) -> Result<String, OutfitError> {
        self.generate_content(&self.text_model, json!([{ "text": prompt }]))
            .await
    }
}

fn classify_error(status: StatusCode, body: &str) -> OutfitError {
    let parsed: Value = serde_json::from_str(body).unwrap_or(Value::Null);
    let message = parsed["error"]["message"]
        .as_str()
        .unwrap_or("Gemini request failed")
        .to_string();

    if parsed["error"]["status"] == "PERMISSION_DENIED"
        || status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
    {
        return OutfitError::Configuration("Gemini API key is invalid or expired".to_string());
    }
    if message.contains("SAFETY") {
        return OutfitError::ContentRejected(
            "the image does not satisfy the content policy, try another one".to_string(),
        );
    }
    let lowered = body.to_lowercase();
    if status == StatusCode::SERVICE_UNAVAILABLE
        || lowered.contains("loading")
        || lowered.contains("overloaded")
    {
        return OutfitError::ModelLoading(format!("Gemini returned {}", status));
    }
    OutfitError::ExternalService(format!("Gemini returned {}: {}", status, message))
}

fn extract_candidate_text(result: &Value) -> Result<String, OutfitError> {
    let blocked = result["promptFeedback"]["blockReason"].is_string()
        || result["promptFeedback"]["safetyRatings"]
            .as_array()
            .is_some_and(|ratings| ratings.iter().any(|r| r["probability"] == "HIGH"));
    if blocked || result["candidates"][0]["finishReason"] == "SAFETY" {
        return Err(OutfitError::ContentRejected(
            "the image does not satisfy the content policy, try another one".to_string(),
        ));
    }

    result["candidates"][0]["content"]["parts"][0]["text"]
        .as_str()
        .map(|text| text.to_string())
        .ok_or_else(|| OutfitError::ExternalService("No candidate text in Gemini response".to_string()))
}
