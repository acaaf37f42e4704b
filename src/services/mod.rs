// src/services/mod.rs
pub mod cache;
pub mod horoscope;
pub mod image_generator;
pub mod image_processor;
pub mod image_search;
pub mod json_extract;
pub mod llm_service;
pub mod pipeline;
pub mod providers;
pub mod query_synthesizer;
pub mod ranking;
pub mod redis_service;
pub mod retry;
pub mod vision_analyzer;

#[cfg(test)]
pub mod testing;

pub use cache::{AnalysisCache, MemoryAnalysisCache};
pub use horoscope::HoroscopeService;
pub use image_generator::{HuggingFaceImageGenerator, ImageGenService};
pub use image_processor::ImageProcessor;
pub use image_search::{GoogleImageSearch, SearchClient};
pub use llm_service::LLMService;
pub use pipeline::{OutfitPipeline, PipelineDeps};
pub use query_synthesizer::QuerySynthesizer;
pub use ranking::{RandomCommentSelector, Ranker};
pub use redis_service::RedisAnalysisCache;
pub use vision_analyzer::{StyleDescriber, VisionAnalyzer};
