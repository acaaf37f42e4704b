// src/services/query_synthesizer.rs
use crate::errors::OutfitError;
use crate::models::AnalysisResult;
use crate::services::providers::TextModel;
use crate::services::retry::{RetryPolicy, retry_operation};
use log::{info, warn};
use std::sync::Arc;

pub const QUERY_SUFFIX: &str = "outfit";
pub const QUERY_COUNT: usize = 3;
const DEFAULT_QUERY: &str = "casual outfit";

pub struct QuerySynthesizer {
    model: Arc<dyn TextModel>,
    retry: RetryPolicy,
}

impl QuerySynthesizer {
    pub fn new(model: Arc<dyn TextModel>, retry: RetryPolicy) -> Self {
        Self { model, retry }
    }

    /// Always returns at least one query ending in [`QUERY_SUFFIX`].
    pub async fn synthesize(&self, style_description: &str, analysis: &AnalysisResult) -> Vec<String> {
        let prompt = build_prompt(style_description, analysis);
        let model = &self.model;
        let prompt = prompt.as_str();

        let primary = retry_operation(
            "query synthesis",
            &self.retry,
            move || async move {
                let text = model.generate(prompt).await?;
                let queries = parse_queries(&text);
                if queries.is_empty() {
                    return Err(OutfitError::Parse(
                        "text model returned no usable queries".to_string(),
                    ));
                }
                Ok(queries)
            },
            OutfitError::is_retryable,
        )
        .await;

        match primary {
            Ok(queries) => {
                let queries = pad_queries(queries, analysis);
                info!("Synthesized search queries: {:?}", queries);
                queries
            }
            Err(e) => {
                warn!("Query synthesis failed, using analysis tags instead: {}", e);
                fallback_queries(analysis)
            }
        }
    }
}

fn build_prompt(style_description: &str, analysis: &AnalysisResult) -> String {
    let digest = match &analysis.style_analysis {
        Some(style) => format!(
            "- Main style: {}\n- Secondary style: {}\n- Colors: {}\n- Season: {}\n- Key items: {}",
            style.main_style,
            style.sub_style,
            style.color_scheme,
            style.seasonality,
            style.key_elements.join(", ")
        ),
        None => format!("- Tags: {}", analysis.matching_tags.join(", ")),
    };

    format!(
        "You are a professional stylist. Based on the outfit below, write {count} image-search \
keyword combinations for finding similar outfits.\n\n\
Each combination must contain, in order of importance:\n\
1. gender and age group\n\
2. the primary style\n\
3. at most 2 key items\n\
4. the dominant color\n\
5. season and occasion, if evident\n\n\
Outfit description:\n{description}\n\n\
Style analysis:\n{digest}\n- Occasions: {occasions}\n\n\
Separate keywords with spaces and end every combination with \"{suffix}\". \
Return exactly {count} lines, one combination per line, with no numbering or other text.",
        count = QUERY_COUNT,
        description = style_description,
        digest = digest,
        occasions = analysis.occasions.join(", "),
        suffix = QUERY_SUFFIX,
    )
}

/// Appends the suffix unless the query already ends with it (case-insensitive).
pub fn with_suffix(query: &str) -> String {
    let query = query.trim();
    if query.to_lowercase().ends_with(QUERY_SUFFIX) {
        query.to_string()
    } else {
        format!("{} {}", query, QUERY_SUFFIX)
    }
}

fn parse_queries(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(with_suffix)
        .take(QUERY_COUNT)
        .collect()
}

fn pad_queries(mut queries: Vec<String>, analysis: &AnalysisResult) -> Vec<String> {
    for candidate in fallback_queries(analysis) {
        if queries.len() >= QUERY_COUNT {
            break;
        }
        if !queries.contains(&candidate) {
            queries.push(candidate);
        }
    }
    while queries.len() < QUERY_COUNT {
        let last = queries.last().cloned().unwrap_or_else(|| DEFAULT_QUERY.to_string());
        queries.push(last);
    }
    queries.truncate(QUERY_COUNT);
    queries
}

/// Tag-derived queries, or the generic default when there are no tags.
pub fn fallback_queries(analysis: &AnalysisResult) -> Vec<String> {
    let queries: Vec<String> = analysis
        .matching_tags
        .iter()
        .map(|tag| tag.trim())
        .filter(|tag| !tag.is_empty())
        .take(QUERY_COUNT)
        .map(with_suffix)
        .collect();

    if queries.is_empty() {
        vec![DEFAULT_QUERY.to_string()]
    } else {
        queries
    }
}
