//! Mock implementations of the pipeline seams for deterministic tests:
//! no network, no database.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use anyhow::Result;

use ai_client::AiError;
use newsapi_client::{NewsApiError, RawArticle, SourceRef};
use truthlens_common::{AnalysisResponse, Article};
use truthlens_store::{AnalysisUpdate, BulkInsertOutcome};

use crate::traits::{AnalysisModel, ArticleStore, NewsProvider, PageTextExtractor, TextEmbedder};

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockProvider {
    pub headlines: HashMap<String, Vec<RawArticle>>,
    pub topics: HashMap<String, Vec<RawArticle>>,
    /// When set, every request fails with a provider error.
    pub fail_all: bool,
}

impl MockProvider {
    pub fn with_headlines(category: &str, entries: Vec<RawArticle>) -> Self {
        let mut provider = Self::default();
        provider.headlines.insert(category.to_string(), entries);
        provider
    }
}

/// Build a provider entry with the fields the fetch stage cares about.
pub fn raw_article(title: &str, url: &str, source: &str, description: &str) -> RawArticle {
    RawArticle {
        source: SourceRef {
            id: None,
            name: Some(source.to_string()),
        },
        author: None,
        title: Some(title.to_string()),
        description: if description.is_empty() {
            None
        } else {
            Some(description.to_string())
        },
        url: Some(url.to_string()),
        published_at: Some("2026-08-01T12:00:00Z".to_string()),
        content: None,
    }
}

#[async_trait]
impl NewsProvider for MockProvider {
    async fn top_headlines(
        &self,
        category: &str,
        _page_size: u32,
    ) -> std::result::Result<Vec<RawArticle>, NewsApiError> {
        if self.fail_all {
            return Err(NewsApiError::NotOk {
                status: "error".to_string(),
                message: "mock failure".to_string(),
            });
        }
        Ok(self.headlines.get(category).cloned().unwrap_or_default())
    }

    async fn search(
        &self,
        query: &str,
        _page_size: u32,
    ) -> std::result::Result<Vec<RawArticle>, NewsApiError> {
        if self.fail_all {
            return Err(NewsApiError::NotOk {
                status: "error".to_string(),
                message: "mock failure".to_string(),
            });
        }
        Ok(self.topics.get(query).cloned().unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// In-memory store that mimics the uniqueness constraint: an insert for an
/// id already in `existing` counts as a duplicate instead of storing twice.
#[derive(Default)]
pub struct MockStore {
    pub existing: Mutex<HashSet<String>>,
    pub inserted: Mutex<Vec<Article>>,
    pub unanalyzed: Mutex<Vec<Article>>,
    pub updates: Mutex<Vec<AnalysisUpdate>>,
    pub failed_marks: Mutex<Vec<String>>,
    pub find_calls: AtomicU32,
    pub fail_updates: bool,
}

impl MockStore {
    pub fn with_existing(ids: &[&str]) -> Self {
        let store = Self::default();
        store
            .existing
            .lock()
            .unwrap()
            .extend(ids.iter().map(|s| s.to_string()));
        store
    }

    pub fn with_unanalyzed(articles: Vec<Article>) -> Self {
        let store = Self::default();
        *store.unanalyzed.lock().unwrap() = articles;
        store
    }
}

#[async_trait]
impl ArticleStore for MockStore {
    async fn article_exists(&self, article_id: &str) -> Result<bool> {
        Ok(self.existing.lock().unwrap().contains(article_id))
    }

    async fn insert_articles(&self, articles: &[Article]) -> BulkInsertOutcome {
        let mut outcome = BulkInsertOutcome::default();
        let mut existing = self.existing.lock().unwrap();
        for article in articles {
            if existing.insert(article.article_id.clone()) {
                self.inserted.lock().unwrap().push(article.clone());
                outcome.inserted += 1;
            } else {
                outcome.duplicates += 1;
            }
        }
        outcome
    }

    async fn find_unanalyzed(&self, limit: usize) -> Result<Vec<Article>> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        let batch = self.unanalyzed.lock().unwrap();
        Ok(batch.iter().take(limit).cloned().collect())
    }

    async fn apply_analysis(&self, update: &AnalysisUpdate) -> Result<bool> {
        if self.fail_updates {
            anyhow::bail!("mock update failure");
        }
        self.updates.lock().unwrap().push(update.clone());
        Ok(true)
    }

    async fn mark_failed_analysis(&self, article_id: &str, _error: &str) -> Result<()> {
        self.failed_marks.lock().unwrap().push(article_id.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Extractor
// ---------------------------------------------------------------------------

/// Returns canned text per URL; unknown URLs extract as empty (failure).
#[derive(Default)]
pub struct MockExtractor {
    pub pages: HashMap<String, String>,
}

impl MockExtractor {
    pub fn with_page(url: &str, text: &str) -> Self {
        let mut extractor = Self::default();
        extractor.pages.insert(url.to_string(), text.to_string());
        extractor
    }
}

#[async_trait]
impl PageTextExtractor for MockExtractor {
    async fn extract(&self, url: &str) -> String {
        self.pages.get(url).cloned().unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Embedder
// ---------------------------------------------------------------------------

pub struct MockEmbedder;

#[async_trait]
impl TextEmbedder for MockEmbedder {
    async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        if text.trim().is_empty() {
            return None;
        }
        Some(vec![0.0; 8])
    }

    fn model_id(&self) -> String {
        "mock-embedder".to_string()
    }
}

// ---------------------------------------------------------------------------
// Analysis model
// ---------------------------------------------------------------------------

type ErrorFactory = Box<dyn Fn() -> AiError + Send + Sync>;

enum Repeat {
    Ok(AnalysisResponse),
    Err(ErrorFactory),
}

/// Scripted model: pops queued responses first, then falls through to the
/// repeating behavior.
pub struct MockModel {
    responses: Mutex<VecDeque<std::result::Result<AnalysisResponse, AiError>>>,
    repeat: Repeat,
    pub calls: AtomicU32,
}

impl MockModel {
    /// Queue responses, then repeat the given default success.
    pub fn scripted(
        responses: Vec<std::result::Result<AnalysisResponse, AiError>>,
    ) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            repeat: Repeat::Ok(AnalysisResponse::default()),
            calls: AtomicU32::new(0),
        }
    }

    pub fn always_ok(response: AnalysisResponse) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            repeat: Repeat::Ok(response),
            calls: AtomicU32::new(0),
        }
    }

    pub fn always_err(factory: impl Fn() -> AiError + Send + Sync + 'static) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            repeat: Repeat::Err(Box::new(factory)),
            calls: AtomicU32::new(0),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalysisModel for MockModel {
    async fn analyze(
        &self,
        _system_prompt: &str,
        _user_prompt: &str,
    ) -> std::result::Result<AnalysisResponse, AiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(response) = self.responses.lock().unwrap().pop_front() {
            return response;
        }
        match &self.repeat {
            Repeat::Ok(response) => Ok(response.clone()),
            Repeat::Err(factory) => Err(factory()),
        }
    }

    fn model_id(&self) -> String {
        "mock-model".to_string()
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn test_config() -> truthlens_common::Config {
    truthlens_common::Config {
        neo4j_uri: "bolt://localhost:7687".to_string(),
        neo4j_user: "neo4j".to_string(),
        neo4j_password: "password".to_string(),
        anthropic_api_key: "sk-ant-test".to_string(),
        embedding_api_key: "sk-test".to_string(),
        news_api_key: "test-key".to_string(),
        host: "127.0.0.1".to_string(),
        port: 3000,
        analysis_batch_size: 20,
        analysis_max_retries: 2,
        scrape_interval_minutes: 360,
    }
}

pub fn pending_article(url: &str, title: &str, content: &str) -> Article {
    Article {
        article_id: truthlens_common::article_id(url),
        title: title.to_string(),
        source: "Example Times".to_string(),
        url: url.to_string(),
        content: content.to_string(),
        description: None,
        published_at: None,
        scraped_at: chrono::Utc::now(),
        content_hash: truthlens_common::content_fingerprint(content),
        word_count: Article::word_count_of(content),
        content_embedding: None,
        title_embedding: None,
        analysis_embedding: None,
        processing_status: Some(truthlens_common::ProcessingStatus::Pending),
        analysis: None,
        analyzed_at: None,
        analysis_model: None,
    }
}
