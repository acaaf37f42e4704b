// src/services/testing.rs
// Scripted stand-ins for the hosted models.
use crate::errors::OutfitError;
use crate::services::providers::{
    ImageGenerator, ImageSearchProvider, RawImageInfo, RawSearchHit, TextModel, VisionModel,
};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

type Reply<T> = Result<T, OutfitError>;

/// Pops scripted replies in order; once drained, repeats `fallback`.
struct Script<T: Clone> {
    queue: Mutex<VecDeque<Reply<T>>>,
    fallback: Reply<T>,
    calls: AtomicUsize,
}

impl<T: Clone> Script<T> {
    fn new(replies: Vec<Reply<T>>, fallback: Reply<T>) -> Self {
        Self {
            queue: Mutex::new(replies.into()),
            fallback,
            calls: AtomicUsize::new(0),
        }
    }

    fn next(&self) -> Reply<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

fn exhausted<T>() -> Reply<T> {
    Err(OutfitError::ExternalService("no scripted reply left".into()))
}

pub struct FakeVisionModel {
    script: Script<String>,
    last_mime_type: Mutex<Option<String>>,
}

impl FakeVisionModel {
    pub fn new(replies: Vec<Reply<String>>) -> Self {
        Self {
            script: Script::new(replies, exhausted()),
            last_mime_type: Mutex::new(None),
        }
    }

    pub fn always(reply: Reply<String>) -> Self {
        Self {
            script: Script::new(Vec::new(), reply),
            last_mime_type: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.script.calls.load(Ordering::SeqCst)
    }

    pub fn last_mime_type(&self) -> Option<String> {
        self.last_mime_type.lock().unwrap().clone()
    }
}

#[async_trait]
impl VisionModel for FakeVisionModel {
    async fn generate(&self, _image: &[u8], mime_type: &str, _prompt: &str) -> Reply<String> {
        *self.last_mime_type.lock().unwrap() = Some(mime_type.to_string());
        self.script.next()
    }
}

pub struct FakeTextModel {
    script: Script<String>,
    last_prompt: Mutex<Option<String>>,
}

impl FakeTextModel {
    pub fn new(replies: Vec<Reply<String>>) -> Self {
        Self {
            script: Script::new(replies, exhausted()),
            last_prompt: Mutex::new(None),
        }
    }

    pub fn always(reply: Reply<String>) -> Self {
        Self {
            script: Script::new(Vec::new(), reply),
            last_prompt: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.script.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextModel for FakeTextModel {
    async fn generate(&self, prompt: &str) -> Reply<String> {
        *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
        self.script.next()
    }
}

/// Answers by site filter; unknown filters yield no hits.
#[derive(Default)]
pub struct FakeSearchProvider {
    by_filter: HashMap<String, Reply<Vec<RawSearchHit>>>,
    calls: AtomicUsize,
    queries: Mutex<Vec<String>>,
}

impl FakeSearchProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, filter: &str, reply: Reply<Vec<RawSearchHit>>) -> Self {
        self.by_filter.insert(filter.to_string(), reply);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageSearchProvider for FakeSearchProvider {
    fn name(&self) -> &str {
        "fake"
    }

    async fn search(&self, query: &str, site_filter: &str) -> Reply<Vec<RawSearchHit>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries
            .lock()
            .unwrap()
            .push(format!("{} {}", query, site_filter));
        self.by_filter
            .get(site_filter)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

pub struct FakeImageGenerator {
    script: Script<Vec<u8>>,
}

impl FakeImageGenerator {
    pub fn new(replies: Vec<Reply<Vec<u8>>>) -> Self {
        Self {
            script: Script::new(replies, exhausted()),
        }
    }

    pub fn calls(&self) -> usize {
        self.script.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageGenerator for FakeImageGenerator {
    async fn generate(&self, _prompt: &str) -> Reply<Vec<u8>> {
        self.script.next()
    }
}

pub fn hit(title: &str, link: &str, display_link: &str) -> RawSearchHit {
    RawSearchHit {
        title: Some(title.to_string()),
        link: Some(link.to_string()),
        display_link: Some(display_link.to_string()),
        snippet: Some(String::new()),
        image: Some(RawImageInfo {
            context_link: Some(format!("https://{}/post", display_link)),
            thumbnail_link: Some(format!("https://thumbs.example.com/{}", title.len())),
            ..RawImageInfo::default()
        }),
    }
}

pub const ANALYSIS_JSON: &str = r#"{"scores":{"overall":"8","style":7,"practicality":9},
    "styleAnalysis":{"mainStyle":"minimalist","subStyle":"french","seasonality":"autumn",
        "colorScheme":"beige and navy","keyElements":["trench coat","loafers"]},
    "advantages":["a","b","c"],"recommendations":["x","y"],"occasions":["office"],
    "matchingTags":["minimalist trench","beige loafers"]}"#;
