// src/services/ranking.rs
use crate::models::{AnalysisResult, ImageMeta, ImageSearchResult, ScoredResult};
use log::{debug, info};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainBonus {
    pub domain: String,
    pub bonus: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordBonus {
    pub keyword: String,
    pub bonus: f64,
}

/// Applies when both sides are at least `min_side` pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionTier {
    pub min_side: u32,
    pub bonus: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SizeFilter {
    pub min_side: u32,
    pub max_side: u32,
    pub min_aspect_ratio: f64,
    pub max_aspect_ratio: f64,
}

impl SizeFilter {
    /// Results without known dimensions always pass.
    pub fn accepts(&self, image: &ImageMeta) -> bool {
        let (Some(width), Some(height)) = (image.width, image.height) else {
            return true;
        };
        if width == 0 || height == 0 {
            return false;
        }
        if width.min(height) < self.min_side || width.max(height) > self.max_side {
            return false;
        }
        let ratio = width as f64 / height as f64;
        ratio >= self.min_aspect_ratio && ratio <= self.max_aspect_ratio
    }
}

/// Scoring weights and comment templates. Templates may use `{style}`,
/// `{elements}` and `{occasion}` placeholders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScoringConfig {
    pub base_score: f64,
    pub min_score: f64,
    pub max_score: f64,
    /// Checked in order; only the first matching domain counts.
    pub domain_bonuses: Vec<DomainBonus>,
    pub keyword_bonuses: Vec<KeywordBonus>,
    /// Checked in order; only the first matching tier counts.
    pub dimension_tiers: Vec<DimensionTier>,
    pub size_filter: Option<SizeFilter>,
    pub comment_templates: Vec<String>,
    pub fallback_comment: String,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        let domains = [
            ("xiaohongshu.com", 3.0),
            ("weibo.com", 3.0),
            ("pinterest.com", 2.5),
            ("vogue.com", 2.0),
            ("elle.com", 2.0),
            ("bazaar.com", 2.0),
            ("cosmopolitan.com", 2.0),
            ("zara.com", 1.5),
            ("hm.com", 1.5),
            ("gap.com", 1.5),
        ];
        let keywords = [
            ("outfit", 2.0),
            ("look", 1.5),
            ("style", 1.5),
            ("fashion", 1.5),
            ("ootd", 2.0),
            ("streetstyle", 1.5),
            ("搭配", 2.0),
            ("穿搭", 2.0),
            ("风格", 1.5),
            ("时尚", 1.5),
        ];

        Self {
            base_score: 5.0,
            min_score: 1.0,
            max_score: 10.0,
            domain_bonuses: domains
                .iter()
                .map(|(domain, bonus)| DomainBonus {
                    domain: domain.to_string(),
                    bonus: *bonus,
                })
                .collect(),
            keyword_bonuses: keywords
                .iter()
                .map(|(keyword, bonus)| KeywordBonus {
                    keyword: keyword.to_string(),
                    bonus: *bonus,
                })
                .collect(),
            dimension_tiers: vec![
                DimensionTier {
                    min_side: 1000,
                    bonus: 1.0,
                },
                DimensionTier {
                    min_side: 800,
                    bonus: 0.5,
                },
            ],
            size_filter: Some(SizeFilter {
                min_side: 300,
                max_side: 4000,
                min_aspect_ratio: 0.4,
                max_aspect_ratio: 2.5,
            }),
            comment_templates: vec![
                "A textbook take on {style}: {elements} make it a natural fit for {occasion}".into(),
                "Balances {style} flair with everyday wear, letting {elements} stand out".into(),
                "A creative {style} combination where {elements} steal the show".into(),
                "Clean, effortless {style} styling with {elements} pitched just right".into(),
                "Fashion-forward {style} look with nicely layered {elements}".into(),
                "Distinctive {style} charm, {elements} are well proportioned".into(),
            ],
            fallback_comment: "Elegant outfit inspiration".into(),
        }
    }
}

/// Picks one of `count` equally valid comment templates.
pub trait CommentSelector: Send + Sync {
    fn pick(&self, count: usize) -> usize;
}

pub struct RandomCommentSelector;

impl CommentSelector for RandomCommentSelector {
    fn pick(&self, count: usize) -> usize {
        rand::thread_rng().gen_range(0..count)
    }
}

#[cfg(test)]
pub struct FixedCommentSelector(pub usize);

#[cfg(test)]
impl CommentSelector for FixedCommentSelector {
    fn pick(&self, count: usize) -> usize {
        self.0 % count
    }
}

pub struct Ranker {
    config: ScoringConfig,
    selector: Box<dyn CommentSelector>,
}

impl Ranker {
    pub fn new(config: ScoringConfig, selector: Box<dyn CommentSelector>) -> Self {
        Self { config, selector }
    }

    #[cfg(test)]
    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Additive relevance score, clamped to the configured range and
    /// rounded to one decimal.
    pub fn score(&self, result: &ImageSearchResult) -> f64 {
        let cfg = &self.config;
        let mut score = cfg.base_score;

        let host = result.display_link.to_lowercase();
        if let Some(domain) = cfg
            .domain_bonuses
            .iter()
            .find(|d| host.contains(&d.domain.to_lowercase()))
        {
            score += domain.bonus;
        }

        let text = format!("{} {}", result.title, result.link).to_lowercase();
        score += cfg
            .keyword_bonuses
            .iter()
            .filter(|k| text.contains(&k.keyword.to_lowercase()))
            .map(|k| k.bonus)
            .sum::<f64>();

        if let (Some(width), Some(height)) = (result.image.width, result.image.height) {
            let shortest = width.min(height);
            if let Some(tier) = cfg.dimension_tiers.iter().find(|t| shortest >= t.min_side) {
                score += tier.bonus;
            }
        }

        let clamped = score.clamp(cfg.min_score, cfg.max_score);
        (clamped * 10.0).round() / 10.0
    }

    pub fn passes_size_filter(&self, image: &ImageMeta) -> bool {
        self.config
            .size_filter
            .as_ref()
            .is_none_or(|filter| filter.accepts(image))
    }

    /// Two-phase selection: up to `ceil(target / groups)` best results per
    /// site group, then a global backfill from the remaining results. The
    /// final list is sorted by score, ties kept in discovery order.
    ///
    /// `group_order` fixes the group declaration order; groups seen in
    /// `results` but not declared are appended in first-seen order.
    pub fn rank(
        &self,
        results: Vec<ImageSearchResult>,
        group_order: &[String],
        target: usize,
    ) -> Vec<ImageSearchResult> {
        if target == 0 {
            return Vec::new();
        }

        let mut seen = HashSet::new();
        let unique: Vec<ImageSearchResult> = results
            .into_iter()
            .filter(|r| seen.insert(r.link.clone()))
            .collect();

        let mut groups: Vec<String> = group_order.to_vec();
        for r in &unique {
            if !groups.contains(&r.site_group) {
                groups.push(r.site_group.clone());
            }
        }
        if groups.is_empty() {
            return Vec::new();
        }
        let quota = target.div_ceil(groups.len());

        let mut by_group: HashMap<&str, Vec<usize>> = HashMap::new();
        for (idx, r) in unique.iter().enumerate() {
            by_group.entry(r.site_group.as_str()).or_default().push(idx);
        }

        let mut selected: Vec<usize> = Vec::new();
        for group in &groups {
            let Some(members) = by_group.get(group.as_str()) else {
                debug!("[{}] no results", group);
                continue;
            };
            let mut members = members.clone();
            members.sort_by(|a, b| unique[*b].score.total_cmp(&unique[*a].score));
            debug!("[{}] taking {} of {}", group, quota.min(members.len()), members.len());
            selected.extend(members.into_iter().take(quota));
        }

        if selected.len() < target {
            let chosen: HashSet<usize> = selected.iter().copied().collect();
            let mut rest: Vec<usize> = (0..unique.len()).filter(|i| !chosen.contains(i)).collect();
            rest.sort_by(|a, b| unique[*b].score.total_cmp(&unique[*a].score));
            let needed = target - selected.len();
            debug!("Backfilling {} of {} remaining results", needed.min(rest.len()), rest.len());
            selected.extend(rest.into_iter().take(needed));
        }

        selected.sort_by(|a, b| unique[*b].score.total_cmp(&unique[*a].score).then(a.cmp(b)));
        selected.truncate(target);

        let mut slots: Vec<Option<ImageSearchResult>> = unique.into_iter().map(Some).collect();
        let ranked: Vec<ImageSearchResult> = selected
            .into_iter()
            .filter_map(|idx| slots[idx].take())
            .collect();
        info!(
            "Ranked {} results across {} site groups (quota {})",
            ranked.len(),
            groups.len(),
            quota
        );
        ranked
    }

    pub fn comment(&self, analysis: &AnalysisResult) -> String {
        let templates = &self.config.comment_templates;
        if templates.is_empty() {
            return self.config.fallback_comment.clone();
        }

        let (style, elements) = match &analysis.style_analysis {
            Some(s) => (s.main_style.trim(), s.key_elements.join(", ")),
            None => ("", String::new()),
        };
        let style = if style.is_empty() { "signature" } else { style };
        let elements = if elements.is_empty() {
            "the key pieces".to_string()
        } else {
            elements
        };
        let occasion = analysis
            .occasions
            .first()
            .map(String::as_str)
            .unwrap_or("everyday");

        let template = &templates[self.selector.pick(templates.len())];
        let comment = template
            .replace("{style}", style)
            .replace("{elements}", &elements)
            .replace("{occasion}", occasion);
        if comment.trim().is_empty() {
            self.config.fallback_comment.clone()
        } else {
            comment
        }
    }

    pub fn annotate(
        &self,
        ranked: Vec<ImageSearchResult>,
        analysis: &AnalysisResult,
    ) -> Vec<ScoredResult> {
        ranked
            .into_iter()
            .map(|result| ScoredResult {
                comment: self.comment(analysis),
                result,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::ANALYSIS_JSON;

    fn ranker() -> Ranker {
        Ranker::new(ScoringConfig::default(), Box::new(FixedCommentSelector(0)))
    }

    fn result(group: &str, link: &str, score: f64) -> ImageSearchResult {
        ImageSearchResult {
            title: String::new(),
            link: link.to_string(),
            display_link: "example.com".to_string(),
            snippet: String::new(),
            image: ImageMeta::default(),
            source: "test".to_string(),
            site_group: group.to_string(),
            score,
        }
    }

    fn groups(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn high_tier_domain_scores_at_least_as_high() {
        let r = ranker();
        let mut plain = result("g", "https://a.example/x.jpg", 0.0);
        plain.title = "autumn outfit look style fashion ootd".into();
        let mut premium = plain.clone();
        premium.display_link = "www.xiaohongshu.com".into();

        let plain_score = r.score(&plain);
        let premium_score = r.score(&premium);
        assert!(premium_score >= plain_score);
        assert!(premium_score <= 10.0);
        assert_eq!(premium_score, 10.0);
    }

    #[test]
    fn score_components_add_up() {
        let r = ranker();
        let mut hit = result("g", "https://i.pinimg.com/1.jpg", 0.0);
        hit.display_link = "www.pinterest.com".into();
        hit.title = "Winter Outfit".into();
        assert_eq!(r.score(&hit), 9.5);

        hit.image.width = Some(1200);
        hit.image.height = Some(900);
        assert_eq!(r.score(&hit), 10.0);

        let bare = result("g", "https://unknown.test/p.jpg", 0.0);
        assert_eq!(r.score(&bare), 5.0);
    }

    #[test]
    fn chinese_keywords_earn_bonuses() {
        let r = ranker();
        let mut hit = result("g", "https://unknown.test/p.jpg", 0.0);
        hit.title = "秋季穿搭".into();
        assert_eq!(r.score(&hit), 7.0);

        hit.title = "法式风格时尚".into();
        assert_eq!(r.score(&hit), 8.0);
    }

    #[test]
    fn only_first_matching_domain_counts() {
        let r = ranker();
        let mut hit = result("g", "https://x.test/p.jpg", 0.0);
        hit.display_link = "weibo.com.pinterest.com".into();
        assert_eq!(r.score(&hit), 8.0);
    }

    #[test]
    fn size_filter_drops_bad_dimensions_only_when_known() {
        let r = ranker();
        let mut image = ImageMeta::default();
        assert!(r.passes_size_filter(&image));

        image.width = Some(200);
        image.height = Some(800);
        assert!(!r.passes_size_filter(&image));

        image.width = Some(600);
        image.height = Some(800);
        assert!(r.passes_size_filter(&image));

        image.width = Some(3000);
        image.height = Some(800);
        assert!(!r.passes_size_filter(&image));
    }

    #[test]
    fn sparse_group_is_backfilled_from_others() {
        let mut results = Vec::new();
        for i in 0..5 {
            results.push(result("social", &format!("s{i}"), 5.0 + i as f64 * 0.5));
        }
        for i in 0..5 {
            results.push(result("retail", &format!("r{i}"), 5.0 + i as f64 * 0.4));
        }

        let ranked = ranker().rank(results, &groups(&["social", "editorial", "retail"]), 4);

        assert_eq!(ranked.len(), 4);
        assert!(ranked.iter().all(|r| r.site_group != "editorial"));
        assert!(ranked.iter().any(|r| r.site_group == "social"));
        assert!(ranked.iter().any(|r| r.site_group == "retail"));
        assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
        let links: HashSet<_> = ranked.iter().map(|r| r.link.clone()).collect();
        assert_eq!(links.len(), 4);
    }

    #[test]
    fn quota_keeps_weaker_groups_represented() {
        let results = vec![
            result("a", "a1", 9.0),
            result("a", "a2", 8.9),
            result("a", "a3", 8.8),
            result("b", "b1", 6.0),
        ];
        let ranked = ranker().rank(results, &groups(&["a", "b"]), 2);
        let links: Vec<_> = ranked.iter().map(|r| r.link.as_str()).collect();
        assert_eq!(links, vec!["a1", "b1"]);
    }

    #[test]
    fn duplicate_links_are_collapsed() {
        let results = vec![
            result("a", "same", 9.0),
            result("b", "same", 9.0),
            result("b", "other", 7.0),
        ];
        let ranked = ranker().rank(results, &groups(&["a", "b"]), 4);
        let links: Vec<_> = ranked.iter().map(|r| r.link.as_str()).collect();
        assert_eq!(links, vec!["same", "other"]);
        assert_eq!(ranked[0].site_group, "a");
    }

    #[test]
    fn ties_keep_discovery_order() {
        let results = vec![
            result("a", "a1", 7.0),
            result("b", "b1", 7.0),
            result("a", "a2", 7.0),
            result("b", "b2", 7.0),
        ];
        let ranked = ranker().rank(results, &groups(&["a", "b"]), 3);
        let links: Vec<_> = ranked.iter().map(|r| r.link.as_str()).collect();
        assert_eq!(links, vec!["a1", "b1", "a2"]);
    }

    #[test]
    fn empty_input_yields_empty_ranking() {
        assert!(ranker().rank(Vec::new(), &groups(&["a"]), 4).is_empty());
        assert!(ranker().rank(vec![result("a", "x", 5.0)], &[], 0).is_empty());
    }

    #[test]
    fn comment_uses_style_and_elements() {
        let analysis: AnalysisResult = serde_json::from_str(ANALYSIS_JSON).unwrap();
        let comment = ranker().comment(&analysis);
        assert_eq!(
            comment,
            "A textbook take on minimalist: trench coat, loafers make it a natural fit for office"
        );
    }

    #[test]
    fn random_comment_is_one_of_the_templates() {
        let analysis: AnalysisResult = serde_json::from_str(ANALYSIS_JSON).unwrap();
        let ranker = Ranker::new(ScoringConfig::default(), Box::new(RandomCommentSelector));
        let rendered: Vec<String> = (0..ranker.config().comment_templates.len())
            .map(|i| {
                Ranker::new(ScoringConfig::default(), Box::new(FixedCommentSelector(i)))
                    .comment(&analysis)
            })
            .collect();

        for _ in 0..20 {
            assert!(rendered.contains(&ranker.comment(&analysis)));
        }
    }

    #[test]
    fn empty_templates_use_fallback_comment() {
        let config = ScoringConfig {
            comment_templates: Vec::new(),
            ..ScoringConfig::default()
        };
        let analysis: AnalysisResult = serde_json::from_str(ANALYSIS_JSON).unwrap();
        let ranker = Ranker::new(config, Box::new(RandomCommentSelector));
        assert_eq!(ranker.comment(&analysis), "Elegant outfit inspiration");
    }
}
