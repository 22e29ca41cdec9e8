// Trait abstractions for the pipeline stages' dependencies.
//
// NewsProvider — the listing provider behind one seam.
// ArticleStore — the narrow slice of the document store the core needs.
// PageTextExtractor / TextEmbedder — content helpers shared by both stages.
// AnalysisModel — the remote generative model, returning a classified error.
//
// These enable deterministic testing with the mocks in `testing.rs`:
// no network, no database. `cargo test` in seconds.

use async_trait::async_trait;
use anyhow::Result;

use ai_client::{AiError, Claude};
use newsapi_client::{NewsApiClient, NewsApiError, RawArticle};
use truthlens_common::{AnalysisResponse, Article};
use truthlens_store::{AnalysisUpdate, ArticleReader, ArticleWriter, BulkInsertOutcome, StoreClient};

// ---------------------------------------------------------------------------
// NewsProvider
// ---------------------------------------------------------------------------

#[async_trait]
pub trait NewsProvider: Send + Sync {
    /// List top items for a category.
    async fn top_headlines(
        &self,
        category: &str,
        page_size: u32,
    ) -> std::result::Result<Vec<RawArticle>, NewsApiError>;

    /// List items matching a free-text query.
    async fn search(
        &self,
        query: &str,
        page_size: u32,
    ) -> std::result::Result<Vec<RawArticle>, NewsApiError>;
}

#[async_trait]
impl NewsProvider for NewsApiClient {
    async fn top_headlines(
        &self,
        category: &str,
        page_size: u32,
    ) -> std::result::Result<Vec<RawArticle>, NewsApiError> {
        NewsApiClient::top_headlines(self, category, page_size).await
    }

    async fn search(
        &self,
        query: &str,
        page_size: u32,
    ) -> std::result::Result<Vec<RawArticle>, NewsApiError> {
        NewsApiClient::search(self, query, page_size).await
    }
}

// ---------------------------------------------------------------------------
// ArticleStore
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Whether an article with this identifier is already stored.
    async fn article_exists(&self, article_id: &str) -> Result<bool>;

    /// Bulk unordered insert; per-item failures are tallied, never raised.
    async fn insert_articles(&self, articles: &[Article]) -> BulkInsertOutcome;

    /// Up to `limit` articles eligible for analysis, newest first.
    async fn find_unanalyzed(&self, limit: usize) -> Result<Vec<Article>>;

    /// Apply an analysis update. Returns whether a row was updated.
    async fn apply_analysis(&self, update: &AnalysisUpdate) -> Result<bool>;

    /// Mark an article for retry on a later run.
    async fn mark_failed_analysis(&self, article_id: &str, error: &str) -> Result<()>;
}

/// Concrete store handle pairing the reader and writer over one connection.
pub struct StoreHandle {
    writer: ArticleWriter,
    reader: ArticleReader,
}

impl StoreHandle {
    pub fn new(client: StoreClient) -> Self {
        Self {
            writer: ArticleWriter::new(client.clone()),
            reader: ArticleReader::new(client),
        }
    }
}

#[async_trait]
impl ArticleStore for StoreHandle {
    async fn article_exists(&self, article_id: &str) -> Result<bool> {
        Ok(self.reader.article_exists(article_id).await?)
    }

    async fn insert_articles(&self, articles: &[Article]) -> BulkInsertOutcome {
        self.writer.insert_articles(articles).await
    }

    async fn find_unanalyzed(&self, limit: usize) -> Result<Vec<Article>> {
        Ok(self.reader.find_unanalyzed(limit).await?)
    }

    async fn apply_analysis(&self, update: &AnalysisUpdate) -> Result<bool> {
        Ok(self.writer.apply_analysis(update).await?)
    }

    async fn mark_failed_analysis(&self, article_id: &str, error: &str) -> Result<()> {
        Ok(self.writer.mark_failed_analysis(article_id, error).await?)
    }
}

// ---------------------------------------------------------------------------
// PageTextExtractor
// ---------------------------------------------------------------------------

#[async_trait]
pub trait PageTextExtractor: Send + Sync {
    /// Download and extract the readable text of a page. Any failure returns
    /// empty text rather than an error — callers treat empty as "extraction
    /// failed" and apply their own fallback.
    async fn extract(&self, url: &str) -> String;
}

// ---------------------------------------------------------------------------
// TextEmbedder
// ---------------------------------------------------------------------------

#[async_trait]
pub trait TextEmbedder: Send + Sync {
    /// Embed text into a fixed-length vector. `None` on empty input or any
    /// client failure — embedding loss never fails a pipeline run.
    async fn embed(&self, text: &str) -> Option<Vec<f32>>;

    /// Identifier of the embedding model, recorded in run summaries.
    fn model_id(&self) -> String;
}

// ---------------------------------------------------------------------------
// AnalysisModel
// ---------------------------------------------------------------------------

#[async_trait]
pub trait AnalysisModel: Send + Sync {
    /// One structured-analysis call. Errors carry the closed `AiError`
    /// taxonomy so the stage can switch on the kind.
    async fn analyze(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> std::result::Result<AnalysisResponse, AiError>;

    /// Identifier of the model, stamped on analyzed articles.
    fn model_id(&self) -> String;
}

pub struct ClaudeAnalysisModel {
    claude: Claude,
}

impl ClaudeAnalysisModel {
    pub fn new(claude: Claude) -> Self {
        Self { claude }
    }
}

#[async_trait]
impl AnalysisModel for ClaudeAnalysisModel {
    async fn analyze(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> std::result::Result<AnalysisResponse, AiError> {
        self.claude
            .extract::<AnalysisResponse>(system_prompt, user_prompt)
            .await
    }

    fn model_id(&self) -> String {
        self.claude.model().to_string()
    }
}
