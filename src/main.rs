// src/main.rs
use actix_web::{App, HttpServer, middleware, web};
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;

mod config;
mod errors;
mod handlers;
mod models;
mod services;

use crate::config::{AppConfig, CacheBackend};
use crate::services::{
    AnalysisCache, GoogleImageSearch, HoroscopeService, HuggingFaceImageGenerator, ImageGenService,
    ImageProcessor, LLMService, MemoryAnalysisCache, OutfitPipeline, PipelineDeps,
    QuerySynthesizer, RandomCommentSelector, Ranker, RedisAnalysisCache, SearchClient,
    StyleDescriber, VisionAnalyzer,
};

const IMAGE_GEN_RETRY_DELAY: Duration = Duration::from_secs(2);

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<OutfitPipeline>,
    image_gen: Arc<ImageGenService>,
    horoscope: Arc<HoroscopeService>,
}

async fn build_cache(config: &AppConfig) -> Option<Arc<dyn AnalysisCache>> {
    match config.cache_backend {
        CacheBackend::Disabled => {
            info!("Analysis cache disabled");
            None
        }
        CacheBackend::Memory => Some(Arc::new(MemoryAnalysisCache::new(config.cache_ttl))),
        CacheBackend::Redis => {
            let url = config
                .redis_url
                .as_deref()
                .unwrap_or("redis://127.0.0.1:6379");
            match RedisAnalysisCache::new(url, config.cache_ttl).await {
                Ok(cache) => {
                    info!("Analysis cache backed by Redis at {}", url);
                    Some(Arc::new(cache))
                }
                Err(e) => {
                    warn!("Redis unavailable ({}), falling back to in-memory cache", e);
                    Some(Arc::new(MemoryAnalysisCache::new(config.cache_ttl)))
                }
            }
        }
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    info!("Starting outfit advisor...");
    let config = AppConfig::from_env()?;
    let timeout = config.retry.call_timeout;

    // Initialize services
    let llm_service = Arc::new(LLMService::new(
        config.gemini_api_key.clone(),
        config.gemini_vision_model.clone(),
        config.gemini_text_model.clone(),
        timeout,
    )?);
    let search_provider = Arc::new(GoogleImageSearch::new(
        config.google_search_api_key.clone(),
        config.google_search_engine_id.clone(),
        timeout,
    )?);
    let image_generator = Arc::new(HuggingFaceImageGenerator::new(
        config.hugging_face_api_key.clone(),
        config.hugging_face_model.clone(),
        timeout,
    )?);

    let ranker = Arc::new(Ranker::new(
        config.scoring.clone(),
        Box::new(RandomCommentSelector),
    ));
    let pipeline = OutfitPipeline::new(PipelineDeps {
        processor: ImageProcessor::new(
            config.max_upload_bytes,
            config.max_image_dimension,
            config.jpeg_quality,
        ),
        analyzer: VisionAnalyzer::new(llm_service.clone()),
        describer: StyleDescriber::new(llm_service.clone()),
        synthesizer: QuerySynthesizer::new(llm_service.clone(), config.retry),
        search: SearchClient::new(
            search_provider,
            config.site_groups.clone(),
            ranker.clone(),
            config.retry,
        ),
        ranker,
        cache: build_cache(&config).await,
        retry: config.retry,
        target_results: config.target_results,
    });

    let app_state = AppState {
        pipeline: Arc::new(pipeline),
        image_gen: Arc::new(ImageGenService::new(
            image_generator,
            config.retry.with_fixed_delay(IMAGE_GEN_RETRY_DELAY),
        )),
        horoscope: Arc::new(HoroscopeService::new(llm_service, config.retry)),
    };

    info!("Starting HTTP server on {}", config.bind_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(middleware::Logger::default())
            .configure(handlers::configure_routes)
    })
    .bind(&config.bind_addr)?
    .run()
    .await?;

    Ok(())
}
