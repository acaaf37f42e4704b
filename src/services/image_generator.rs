// src/services/image_generator.rs
use crate::errors::OutfitError;
use crate::services::providers::ImageGenerator;
use crate::services::retry::{RetryPolicy, retry_operation};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use log::{error, info};
use reqwest::Client;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

const HUGGING_FACE_API_BASE: &str = "https://api-inference.huggingface.co/models";

const NEGATIVE_PROMPT: &str = "low quality, blurry, distorted, deformed, disfigured, bad anatomy, \
watermark, signature, poorly drawn, amateur";

/// Hugging Face inference API text-to-image backend.
pub struct HuggingFaceImageGenerator {
    api_key: Option<String>,
    model: String,
    client: Client,
}

impl HuggingFaceImageGenerator {
    pub fn new(
        api_key: Option<String>,
        model: String,
        timeout: Duration,
    ) -> Result<Self, OutfitError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OutfitError::Configuration(format!("HTTP client setup failed: {}", e)))?;
        Ok(Self {
            api_key,
            model,
            client,
        })
    }
}

#[async_trait]
impl ImageGenerator for HuggingFaceImageGenerator {
    async fn generate(&self, prompt: &str) -> Result<Vec<u8>, OutfitError> {
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            OutfitError::Configuration("Hugging Face API key not configured".to_string())
        })?;

        let response = self
            .client
            .post(format!("{}/{}", HUGGING_FACE_API_BASE, self.model))
            .bearer_auth(api_key)
            .json(&json!({
                "inputs": prompt,
                "parameters": {
                    "num_inference_steps": 50,
                    "guidance_scale": 7.5,
                    "negative_prompt": NEGATIVE_PROMPT
                },
                "wait_for_model": true
            }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OutfitError::Timeout(format!("Image generation timed out: {}", e))
                } else {
                    OutfitError::ExternalService(format!("Image generation request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Image generation error ({}): {}", status, error_text);
            if is_loading_message(&error_text) {
                return Err(OutfitError::ModelLoading(self.model.clone()));
            }
            if status.as_u16() == 401 || status.as_u16() == 403 {
                return Err(OutfitError::Configuration(
                    "Hugging Face API key was rejected".to_string(),
                ));
            }
            let message = serde_json::from_str::<Value>(&error_text)
                .ok()
                .and_then(|v| v["error"].as_str().map(str::to_string))
                .unwrap_or_else(|| format!("status {}", status));
            return Err(OutfitError::ExternalService(format!(
                "Image generation error: {}",
                message
            )));
        }

        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("application/json"));
        if is_json {
            let body = response.text().await.unwrap_or_default();
            error!("Expected image bytes, got JSON: {}", body);
            if is_loading_message(&body) {
                return Err(OutfitError::ModelLoading(self.model.clone()));
            }
            return Err(OutfitError::Parse(
                "image generation returned JSON instead of an image".to_string(),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| OutfitError::ExternalService(format!("Failed to read image: {}", e)))?;
        Ok(bytes.to_vec())
    }
}

fn is_loading_message(text: &str) -> bool {
    let lowered = text.to_lowercase();
    lowered.contains("loading") || lowered.contains("starting")
}

/// Text-to-image endpoint logic: prompt templating, retries, data-URL output.
pub struct ImageGenService {
    generator: Arc<dyn ImageGenerator>,
    retry: RetryPolicy,
}

impl ImageGenService {
    pub fn new(generator: Arc<dyn ImageGenerator>, retry: RetryPolicy) -> Self {
        Self { generator, retry }
    }

    pub async fn generate(&self, prompt: &str) -> Result<String, OutfitError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(OutfitError::Validation("a prompt is required".to_string()));
        }

        let full_prompt = format!(
            "ultra realistic fashion photography, full body shot of a model wearing: {}. \
Professional studio lighting, high resolution, detailed fabric texture, fashion magazine style, \
clean background, 8k uhd, highly detailed",
            prompt
        );
        info!("Generating image for prompt: {}", prompt);

        let generator = &self.generator;
        let full_prompt = full_prompt.as_str();
        let image = retry_operation(
            "image generation",
            &self.retry,
            move || generator.generate(full_prompt),
            OutfitError::is_retryable,
        )
        .await?;

        info!("Generated image of {} bytes", image.len());
        Ok(format!(
            "data:image/jpeg;base64,{}",
            general_purpose::STANDARD.encode(image)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::retry::Backoff;
    use crate::services::testing::FakeImageGenerator;

    fn retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::ZERO,
            backoff: Backoff::Fixed,
            call_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn loading_model_is_retried_until_ready() {
        let generator = Arc::new(FakeImageGenerator::new(vec![
            Err(OutfitError::ModelLoading("sd".into())),
            Ok(vec![1, 2, 3]),
        ]));
        let service = ImageGenService::new(generator.clone(), retry());

        let url = service.generate("red dress").await.unwrap();
        assert_eq!(url, "data:image/jpeg;base64,AQID");
        assert_eq!(generator.calls(), 2);
    }

    #[tokio::test]
    async fn empty_prompt_is_rejected_without_calls() {
        let generator = Arc::new(FakeImageGenerator::new(vec![]));
        let service = ImageGenService::new(generator.clone(), retry());

        assert!(matches!(
            service.generate("   ").await,
            Err(OutfitError::Validation(_))
        ));
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn missing_key_is_not_retried() {
        let generator = Arc::new(FakeImageGenerator::new(vec![Err(
            OutfitError::Configuration("no key".into()),
        )]));
        let service = ImageGenService::new(generator.clone(), retry());

        assert!(matches!(
            service.generate("coat").await,
            Err(OutfitError::Configuration(_))
        ));
        assert_eq!(generator.calls(), 1);
    }

    #[test]
    fn loading_messages_are_detected() {
        assert!(is_loading_message(r#"{"error":"Model is currently loading"}"#));
        assert!(is_loading_message("Service starting"));
        assert!(!is_loading_message("Bad request"));
    }
}
