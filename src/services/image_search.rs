// src/services/image_search.rs
use crate::errors::OutfitError;
use crate::models::{ImageMeta, ImageSearchResult};
use crate::services::providers::{ImageSearchProvider, RawSearchHit};
use crate::services::ranking::Ranker;
use crate::services::retry::{RetryPolicy, retry_operation};
use async_trait::async_trait;
use futures_util::future::join_all;
use log::{debug, error, info, warn};
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

const GOOGLE_SEARCH_URL: &str = "https://www.googleapis.com/customsearch/v1";

/// A named partition of search sources, e.g. social platforms vs. retailers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteGroup {
    pub name: String,
    /// Domain restriction appended to the query, e.g. `site:pinterest.com`.
    pub filter: String,
}

impl SiteGroup {
    pub fn new(name: &str, filter: &str) -> Self {
        Self {
            name: name.to_string(),
            filter: filter.to_string(),
        }
    }

    pub fn defaults() -> Vec<SiteGroup> {
        vec![
            SiteGroup::new("weibo", "site:weibo.com"),
            SiteGroup::new("xiaohongshu", "site:xiaohongshu.com"),
            SiteGroup::new("pinterest", "site:pinterest.com"),
            SiteGroup::new(
                "fashion",
                "(site:vogue.com OR site:elle.com OR site:bazaar.com OR site:cosmopolitan.com)",
            ),
            SiteGroup::new("shopping", "(site:zara.com OR site:hm.com OR site:gap.com)"),
        ]
    }
}

/// Google Programmable Search in image mode.
pub struct GoogleImageSearch {
    api_key: Option<String>,
    engine_id: Option<String>,
    client: Client,
}

impl GoogleImageSearch {
    pub fn new(
        api_key: Option<String>,
        engine_id: Option<String>,
        timeout: Duration,
    ) -> Result<Self, OutfitError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OutfitError::Configuration(format!("HTTP client setup failed: {}", e)))?;
        Ok(Self {
            api_key,
            engine_id,
            client,
        })
    }
}

#[derive(Deserialize)]
struct GoogleSearchResponse {
    #[serde(default)]
    items: Vec<RawSearchHit>,
}

#[async_trait]
impl ImageSearchProvider for GoogleImageSearch {
    fn name(&self) -> &str {
        "google"
    }

    async fn search(
        &self,
        query: &str,
        site_filter: &str,
    ) -> Result<Vec<RawSearchHit>, OutfitError> {
        let (Some(api_key), Some(engine_id)) = (&self.api_key, &self.engine_id) else {
            return Err(OutfitError::Configuration(
                "Google Search API not configured".to_string(),
            ));
        };

        let q = format!("{} {}", query, site_filter);
        let response = self
            .client
            .get(GOOGLE_SEARCH_URL)
            .query(&[
                ("key", api_key.as_str()),
                ("cx", engine_id.as_str()),
                ("q", q.as_str()),
                ("searchType", "image"),
                ("num", "10"),
                ("imgSize", "xlarge"),
                ("imgType", "photo"),
                ("safe", "active"),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OutfitError::Timeout(format!("Google Search timed out: {}", e))
                } else {
                    OutfitError::ExternalService(format!("Google Search request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Google Search API error response ({}): {}", status, error_text);
            if status == StatusCode::FORBIDDEN || status == StatusCode::UNAUTHORIZED {
                return Err(OutfitError::Configuration(
                    "Invalid Google Search API key".to_string(),
                ));
            }
            return Err(OutfitError::ExternalService(format!(
                "Google Search API returned {}",
                status
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| OutfitError::Parse(format!("Invalid JSON from Google Search: {}", e)))?;
        if let Some(message) = body["error"]["message"].as_str() {
            return Err(OutfitError::ExternalService(format!(
                "Google Search API error: {}",
                message
            )));
        }

        let parsed: GoogleSearchResponse = serde_json::from_value(body)
            .map_err(|e| OutfitError::Parse(format!("Unexpected Google Search payload: {}", e)))?;
        Ok(parsed.items)
    }
}

/// Fans one query out to every site group concurrently.
pub struct SearchClient {
    provider: Arc<dyn ImageSearchProvider>,
    site_groups: Vec<SiteGroup>,
    ranker: Arc<Ranker>,
    retry: RetryPolicy,
}

impl SearchClient {
    pub fn new(
        provider: Arc<dyn ImageSearchProvider>,
        site_groups: Vec<SiteGroup>,
        ranker: Arc<Ranker>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            provider,
            site_groups,
            ranker,
            retry,
        }
    }

    pub fn group_names(&self) -> Vec<String> {
        self.site_groups.iter().map(|g| g.name.clone()).collect()
    }

    /// Results from all groups, in group declaration order. A group that
    /// keeps failing contributes nothing; it never fails the whole search.
    pub async fn search(&self, query: &str, kids: bool) -> Vec<ImageSearchResult> {
        let query = if kids {
            format!("{} kids fashion", query)
        } else {
            query.to_string()
        };

        let searches = self
            .site_groups
            .iter()
            .map(|group| self.search_group(&query, group));
        let per_group = join_all(searches).await;

        let failed = per_group.iter().filter(|r| r.is_err()).count();
        if failed == self.site_groups.len() && failed > 0 {
            warn!("Every site group failed for query {:?}", query);
        }

        per_group
            .into_iter()
            .filter_map(Result::ok)
            .flatten()
            .collect()
    }

    async fn search_group(
        &self,
        query: &str,
        group: &SiteGroup,
    ) -> Result<Vec<ImageSearchResult>, OutfitError> {
        let provider = &self.provider;
        let label = format!("image search [{}]", group.name);
        let filter = group.filter.as_str();

        let hits = retry_operation(
            &label,
            &self.retry,
            move || provider.search(query, filter),
            OutfitError::is_retryable,
        )
        .await
        .map_err(|e| {
            warn!("[{}] search failed, skipping group: {}", group.name, e);
            e
        })?;

        let results: Vec<ImageSearchResult> = hits
            .into_iter()
            .filter_map(|hit| self.ingest(hit, &group.name))
            .collect();

        if results.is_empty() {
            info!("[{}] no results for {:?}", group.name, query);
        } else {
            debug!("[{}] {} results for {:?}", group.name, results.len(), query);
        }
        Ok(results)
    }

    fn ingest(&self, hit: RawSearchHit, group: &str) -> Option<ImageSearchResult> {
        let link = normalize_image_url(hit.link.as_deref()?.trim());
        if link.is_empty() {
            return None;
        }
        let raw_image = hit.image.unwrap_or_default();
        let image = ImageMeta {
            context_link: raw_image.context_link,
            thumbnail_link: raw_image.thumbnail_link.map(|t| normalize_image_url(&t)),
            width: raw_image.width,
            height: raw_image.height,
            thumbnail_width: raw_image.thumbnail_width,
            thumbnail_height: raw_image.thumbnail_height,
        };
        if !self.ranker.passes_size_filter(&image) {
            debug!("[{}] dropping {} for its dimensions", group, link);
            return None;
        }

        let mut result = ImageSearchResult {
            title: hit.title.unwrap_or_default(),
            display_link: hit.display_link.unwrap_or_default(),
            snippet: hit.snippet.unwrap_or_default(),
            link,
            image,
            source: self.provider.name().to_string(),
            site_group: group.to_string(),
            score: 0.0,
        };
        result.score = self.ranker.score(&result);
        Some(result)
    }
}

/// Forces https and strips query parameters the image hosts do not need.
pub fn normalize_image_url(url: &str) -> String {
    let secured = match url.strip_prefix("http:") {
        Some(rest) => format!("https:{}", rest),
        None => url.to_string(),
    };

    let Ok(mut parsed) = Url::parse(&secured) else {
        return secured;
    };
    let Some(host) = parsed.host_str().map(str::to_string) else {
        return secured;
    };
    parsed.set_fragment(None);

    match host.as_str() {
        "assets.vogue.com" => {
            let segments: Vec<String> = parsed
                .path_segments()
                .map(|s| s.map(str::to_string).collect())
                .unwrap_or_default();
            if let [_, id, .., file] = segments.as_slice() {
                let path = format!("/photos/{}/master/pass/{}", id, file);
                parsed.set_path(&path);
            }
            parsed.set_query(None);
        }
        "hips.hearstapps.com" => {
            let kept: Vec<(String, String)> = parsed
                .query_pairs()
                .filter(|(k, _)| k == "crop" || k == "resize")
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            if kept.is_empty() {
                parsed.set_query(None);
            } else {
                parsed.query_pairs_mut().clear().extend_pairs(kept);
            }
        }
        _ => parsed.set_query(None),
    }
    parsed.to_string()
}
