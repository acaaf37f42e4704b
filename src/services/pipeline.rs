// src/services/pipeline.rs
use crate::errors::OutfitError;
use crate::models::{
    AnalysisResponse, AnalysisResult, OutfitReport, RecommendationResponse, UploadedImage,
};
use crate::services::cache::{AnalysisCache, content_hash};
use crate::services::image_processor::ImageProcessor;
use crate::services::image_search::SearchClient;
use crate::services::query_synthesizer::QuerySynthesizer;
use crate::services::ranking::Ranker;
use crate::services::retry::{RetryPolicy, retry_operation};
use crate::services::vision_analyzer::{StyleDescriber, VisionAnalyzer};
use futures_util::future::join_all;
use log::{error, info, warn};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Idle,
    Validating,
    Analyzing,
    Describing,
    SynthesizingQueries,
    Searching,
    Scoring,
    Done,
    Failed,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Logs stage transitions for one request.
struct StageTracker {
    request_id: Uuid,
    stage: PipelineStage,
}

impl StageTracker {
    fn new() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            stage: PipelineStage::Idle,
        }
    }

    fn advance(&mut self, next: PipelineStage) {
        info!("[{}] {} -> {}", self.request_id, self.stage, next);
        self.stage = next;
    }

    fn fail(&mut self, err: OutfitError) -> OutfitError {
        error!(
            "[{}] {} -> Failed({}): {}",
            self.request_id,
            self.stage,
            err.kind(),
            err
        );
        self.stage = PipelineStage::Failed;
        err
    }
}

pub struct PipelineDeps {
    pub processor: ImageProcessor,
    pub analyzer: VisionAnalyzer,
    pub describer: StyleDescriber,
    pub synthesizer: QuerySynthesizer,
    pub search: SearchClient,
    pub ranker: Arc<Ranker>,
    pub cache: Option<Arc<dyn AnalysisCache>>,
    pub retry: RetryPolicy,
    pub target_results: usize,
}

/// Upload -> analysis -> description -> queries -> search -> ranked results.
pub struct OutfitPipeline {
    deps: PipelineDeps,
}

impl OutfitPipeline {
    pub fn new(deps: PipelineDeps) -> Self {
        Self { deps }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.deps.processor.max_bytes()
    }

    pub async fn analyze(&self, upload: UploadedImage) -> Result<AnalysisResponse, OutfitError> {
        let mut tracker = StageTracker::new();
        let response = self.analyze_stages(&mut tracker, upload).await?;
        tracker.advance(PipelineStage::Done);
        Ok(response)
    }

    pub async fn recommend(
        &self,
        current_outfit: &str,
        analysis: &AnalysisResult,
        kids: bool,
    ) -> Result<RecommendationResponse, OutfitError> {
        if current_outfit.trim().is_empty() {
            return Err(OutfitError::Validation(
                "currentOutfit and analysis are required".to_string(),
            ));
        }
        let mut tracker = StageTracker::new();
        let response = self
            .recommend_stages(&mut tracker, current_outfit, analysis, kids)
            .await;
        tracker.advance(PipelineStage::Done);
        Ok(response)
    }

    /// The whole state machine for one uploaded photo.
    pub async fn run(&self, upload: UploadedImage, kids: bool) -> Result<OutfitReport, OutfitError> {
        let mut tracker = StageTracker::new();
        let AnalysisResponse {
            analysis,
            style_description,
        } = self.analyze_stages(&mut tracker, upload).await?;
        let style_description = style_description.unwrap_or_default();

        let recommendation = self
            .recommend_stages(&mut tracker, &style_description, &analysis, kids)
            .await;
        tracker.advance(PipelineStage::Done);

        Ok(OutfitReport {
            analysis,
            style_description,
            queries: recommendation.queries,
            results: recommendation.results,
        })
    }

    async fn analyze_stages(
        &self,
        tracker: &mut StageTracker,
        upload: UploadedImage,
    ) -> Result<AnalysisResponse, OutfitError> {
        tracker.advance(PipelineStage::Validating);
        self.deps
            .processor
            .validate(&upload)
            .map_err(|e| tracker.fail(e))?;

        let cache_key = content_hash(&upload.data);
        if let Some(cached) = self.cached(&cache_key).await {
            info!("[{}] analysis cache hit for {}", tracker.request_id, cache_key);
            return Ok(cached);
        }

        let image = self
            .deps
            .processor
            .normalize(&upload)
            .map_err(|e| tracker.fail(e))?;
        info!(
            "[{}] normalized upload from {} to {} bytes",
            tracker.request_id,
            upload.size(),
            image.size()
        );

        tracker.advance(PipelineStage::Analyzing);
        let analyzer = &self.deps.analyzer;
        let image_ref = &image;
        let analysis = retry_operation(
            "vision analysis",
            &self.deps.retry,
            move || analyzer.analyze(image_ref),
            OutfitError::is_retryable,
        )
        .await
        .map_err(|e| tracker.fail(e))?;

        tracker.advance(PipelineStage::Describing);
        let describer = &self.deps.describer;
        let description = retry_operation(
            "style description",
            &self.deps.retry,
            move || describer.describe(image_ref),
            OutfitError::is_retryable,
        )
        .await
        .map_err(|e| tracker.fail(e))?;

        let response = AnalysisResponse {
            analysis,
            style_description: Some(description),
        };
        self.store(&cache_key, &response).await;
        Ok(response)
    }

    /// Never fails: query synthesis falls back and search degrades per group.
    async fn recommend_stages(
        &self,
        tracker: &mut StageTracker,
        current_outfit: &str,
        analysis: &AnalysisResult,
        kids: bool,
    ) -> RecommendationResponse {
        tracker.advance(PipelineStage::SynthesizingQueries);
        let queries = self.deps.synthesizer.synthesize(current_outfit, analysis).await;

        tracker.advance(PipelineStage::Searching);
        let searches = queries.iter().map(|q| self.deps.search.search(q, kids));
        let per_query = join_all(searches).await;
        for (query, results) in queries.iter().zip(&per_query) {
            info!(
                "[{}] query {:?} returned {} results",
                tracker.request_id,
                query,
                results.len()
            );
        }
        let found: Vec<_> = per_query.into_iter().flatten().collect();
        if found.is_empty() {
            warn!("[{}] search produced no results", tracker.request_id);
        }

        tracker.advance(PipelineStage::Scoring);
        let ranked = self.deps.ranker.rank(
            found,
            &self.deps.search.group_names(),
            self.deps.target_results,
        );
        let results = self.deps.ranker.annotate(ranked, analysis);

        RecommendationResponse { queries, results }
    }

    async fn cached(&self, key: &str) -> Option<AnalysisResponse> {
        let cache = self.deps.cache.as_ref()?;
        match cache.get(key).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!("Analysis cache lookup failed: {}", e);
                None
            }
        }
    }

    async fn store(&self, key: &str, response: &AnalysisResponse) {
        if let Some(cache) = &self.deps.cache {
            if let Err(e) = cache.set(key, response).await {
                warn!("Analysis cache write failed: {}", e);
            }
        }
    }
}
