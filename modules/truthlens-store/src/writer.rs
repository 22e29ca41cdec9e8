use chrono::{DateTime, Utc};
use neo4rs::query;
use tracing::{debug, warn};

use truthlens_common::{Article, ProcessingStatus};

use crate::error::{is_constraint_violation, StoreError};
use crate::StoreClient;

/// Write-side wrapper for the article store. Used by the pipeline stages only.
pub struct ArticleWriter {
    client: StoreClient,
}

/// Outcome of a bulk unordered insert: per-item failures never abort the
/// batch, they are tallied here.
#[derive(Debug, Default, Clone, Copy)]
pub struct BulkInsertOutcome {
    pub inserted: u32,
    pub duplicates: u32,
    pub failed: u32,
}

/// Partial update written back by the analysis stage. Exactly one of these is
/// applied per selected article, success or fallback.
#[derive(Debug, Clone)]
pub struct AnalysisUpdate {
    pub article_id: String,
    pub analysis_json: String,
    pub bias_score: f64,
    pub misinformation_risk: f64,
    pub sentiment: f64,
    pub credibility_score: f64,
    pub status: ProcessingStatus,
    pub analyzed_at: DateTime<Utc>,
    pub analysis_model: String,
    pub content_embedding: Option<Vec<f32>>,
    pub title_embedding: Option<Vec<f32>>,
    pub analysis_embedding: Option<Vec<f32>>,
    /// Operator override: overwrite embeddings even when already present.
    pub force_embeddings: bool,
}

impl ArticleWriter {
    pub fn new(client: StoreClient) -> Self {
        Self { client }
    }

    /// Insert one article. The uniqueness constraint on `article_id` turns a
    /// concurrent double-insert into `StoreError::Duplicate`.
    pub async fn insert_article(&self, article: &Article) -> Result<(), StoreError> {
        let q = query(
            "CREATE (a:Article {
                article_id: $article_id,
                title: $title,
                source: $source,
                url: $url,
                content: $content,
                description: $description,
                published_at: $published_at,
                scraped_at: $scraped_at,
                content_hash: $content_hash,
                word_count: $word_count,
                processing_status: $processing_status,
                content_embedding: CASE WHEN size($content_embedding) > 0
                    THEN $content_embedding ELSE null END,
                title_embedding: CASE WHEN size($title_embedding) > 0
                    THEN $title_embedding ELSE null END
            }) RETURN a.article_id AS article_id",
        )
        .param("article_id", article.article_id.as_str())
        .param("title", article.title.as_str())
        .param("source", article.source.as_str())
        .param("url", article.url.as_str())
        .param("content", article.content.as_str())
        .param("description", article.description.as_deref().unwrap_or(""))
        .param(
            "published_at",
            article
                .published_at
                .map(|dt| format_datetime(&dt))
                .unwrap_or_default(),
        )
        .param("scraped_at", format_datetime(&article.scraped_at))
        .param("content_hash", article.content_hash.as_str())
        .param("word_count", article.word_count as i64)
        .param(
            "processing_status",
            article
                .processing_status
                .unwrap_or(ProcessingStatus::Pending)
                .as_str(),
        )
        .param(
            "content_embedding",
            embedding_to_f64(article.content_embedding.as_deref()),
        )
        .param(
            "title_embedding",
            embedding_to_f64(article.title_embedding.as_deref()),
        );

        // The violation can surface either on execute or while draining the
        // result stream, depending on when the server flushes the failure.
        let mut stream = match self.client.graph.execute(q).await {
            Ok(stream) => stream,
            Err(e) if is_constraint_violation(&e) => {
                return Err(StoreError::Duplicate(article.article_id.clone()))
            }
            Err(e) => return Err(StoreError::Database(e)),
        };
        loop {
            match stream.next().await {
                Ok(Some(_)) => {}
                Ok(None) => return Ok(()),
                Err(e) if is_constraint_violation(&e) => {
                    return Err(StoreError::Duplicate(article.article_id.clone()))
                }
                Err(e) => return Err(StoreError::Database(e)),
            }
        }
    }

    /// Bulk unordered insert. Each item is written independently so one
    /// duplicate-key or validation failure cannot abort the rest.
    pub async fn insert_articles(&self, articles: &[Article]) -> BulkInsertOutcome {
        let mut outcome = BulkInsertOutcome::default();
        for article in articles {
            match self.insert_article(article).await {
                Ok(()) => outcome.inserted += 1,
                Err(StoreError::Duplicate(id)) => {
                    debug!(article_id = %id, "Duplicate insert skipped by constraint");
                    outcome.duplicates += 1;
                }
                Err(e) => {
                    warn!(article_id = %article.article_id, error = %e, "Article insert failed");
                    outcome.failed += 1;
                }
            }
        }
        outcome
    }

    /// Apply an analysis result. Guarded so the status only moves forward
    /// from `pending`/`failed_analysis`/absent, and embeddings are written
    /// only where missing unless the update forces them.
    /// Returns whether a row was actually updated.
    pub async fn apply_analysis(&self, update: &AnalysisUpdate) -> Result<bool, StoreError> {
        let q = query(
            "MATCH (a:Article {article_id: $article_id})
             WHERE a.processing_status IN ['pending', 'failed_analysis']
                OR a.processing_status IS NULL
             SET a.ai_analysis = $analysis_json,
                 a.bias_score = $bias_score,
                 a.misinformation_risk = $misinformation_risk,
                 a.sentiment = $sentiment,
                 a.credibility_score = $credibility_score,
                 a.processing_status = $status,
                 a.analyzed_at = $analyzed_at,
                 a.analysis_model = $analysis_model,
                 a.content_embedding = CASE
                     WHEN size($content_embedding) = 0 THEN a.content_embedding
                     WHEN $force OR a.content_embedding IS NULL THEN $content_embedding
                     ELSE a.content_embedding END,
                 a.title_embedding = CASE
                     WHEN size($title_embedding) = 0 THEN a.title_embedding
                     WHEN $force OR a.title_embedding IS NULL THEN $title_embedding
                     ELSE a.title_embedding END,
                 a.analysis_embedding = CASE
                     WHEN size($analysis_embedding) = 0 THEN a.analysis_embedding
                     WHEN $force OR a.analysis_embedding IS NULL THEN $analysis_embedding
                     ELSE a.analysis_embedding END
             RETURN a.article_id AS article_id",
        )
        .param("article_id", update.article_id.as_str())
        .param("analysis_json", update.analysis_json.as_str())
        .param("bias_score", update.bias_score)
        .param("misinformation_risk", update.misinformation_risk)
        .param("sentiment", update.sentiment)
        .param("credibility_score", update.credibility_score)
        .param("status", update.status.as_str())
        .param("analyzed_at", format_datetime(&update.analyzed_at))
        .param("analysis_model", update.analysis_model.as_str())
        .param(
            "content_embedding",
            embedding_to_f64(update.content_embedding.as_deref()),
        )
        .param(
            "title_embedding",
            embedding_to_f64(update.title_embedding.as_deref()),
        )
        .param(
            "analysis_embedding",
            embedding_to_f64(update.analysis_embedding.as_deref()),
        )
        .param("force", update.force_embeddings);

        let mut stream = self.client.graph.execute(q).await?;
        let mut updated = false;
        while stream.next().await?.is_some() {
            updated = true;
        }
        Ok(updated)
    }

    /// Mark an article as failed so a later run re-selects it. Only moves
    /// articles that are not already in a terminal state.
    pub async fn mark_failed_analysis(
        &self,
        article_id: &str,
        error: &str,
    ) -> Result<(), StoreError> {
        let q = query(
            "MATCH (a:Article {article_id: $article_id})
             WHERE a.processing_status IN ['pending', 'failed_analysis']
                OR a.processing_status IS NULL
             SET a.processing_status = 'failed_analysis',
                 a.last_error = $error
             RETURN a.article_id AS article_id",
        )
        .param("article_id", article_id)
        .param("error", truthlens_common::truncate_on_boundary(error, 500));

        let mut stream = self.client.graph.execute(q).await?;
        while stream.next().await?.is_some() {}
        Ok(())
    }
}

fn embedding_to_f64(embedding: Option<&[f32]>) -> Vec<f64> {
    embedding
        .map(|e| e.iter().map(|v| *v as f64).collect())
        .unwrap_or_default()
}

pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}
