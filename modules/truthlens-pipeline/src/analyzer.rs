use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tracing::{error, info, warn};

use ai_client::{AiError, Claude};
use truthlens_common::{
    truncate_on_boundary, AnalysisResponse, Article, Config, ProcessingStatus, TruthLensError,
};
use truthlens_store::AnalysisUpdate;

use crate::embedder::Embedder;
use crate::run_log::{RunLog, SampleItem};
use crate::stats::AnalysisStats;
use crate::traits::{AnalysisModel, ArticleStore, ClaudeAnalysisModel, TextEmbedder};

/// Model used for comprehensive article analysis.
pub const DEFAULT_ANALYSIS_MODEL: &str = "claude-haiku-4-5-20251001";

/// Article content beyond this many bytes is cut from the prompt. The model's
/// judgment saturates well before this on news-length text.
const CONTENT_PROMPT_BUDGET: usize = 20_000;

/// Default retry ceiling: `max_retries + 1` total attempts per article.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(1);
const DEFAULT_JITTER_MS: u64 = 1000;

/// Bias overall scores above this count toward the high-bias stat.
const HIGH_BIAS_THRESHOLD: f64 = 0.7;
/// Misinformation risk scores above this count toward the flagged stat.
const MISINFO_FLAG_THRESHOLD: f64 = 0.6;

const SYSTEM_PROMPT: &str = "You are a media analysis model. Assess news articles for \
political bias, misinformation risk, sentiment, and credibility. Ground every indicator \
you report in specific article text, and reserve scores above 0.8 for unambiguous cases.";

/// The AI pipeline: selects unanalyzed articles, runs the remote model with
/// retry and backoff, validates the structured response, and writes exactly
/// one update per article — a validated analysis or the deterministic
/// fallback. A single bad article never aborts the batch.
pub struct AnalyzeStage {
    store: Arc<dyn ArticleStore>,
    model: Arc<dyn AnalysisModel>,
    embedder: Arc<dyn TextEmbedder>,
    max_retries: u32,
    backoff_base: Duration,
    jitter_ms: u64,
    force_embeddings: bool,
    schema_description: String,
    log_root: Option<PathBuf>,
}

impl AnalyzeStage {
    pub fn new(
        store: Arc<dyn ArticleStore>,
        model: Arc<dyn AnalysisModel>,
        embedder: Arc<dyn TextEmbedder>,
    ) -> Self {
        // The schema the model is asked to follow is generated once from the
        // static contract type, not rebuilt per call.
        let schema = schemars::schema_for!(AnalysisResponse);
        let schema_description =
            serde_json::to_string_pretty(&schema).expect("analysis schema serializes");

        Self {
            store,
            model,
            embedder,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base: DEFAULT_BACKOFF_BASE,
            jitter_ms: DEFAULT_JITTER_MS,
            force_embeddings: false,
            schema_description,
            log_root: None,
        }
    }

    /// Build the stage from configuration. Missing keys are a construction
    /// failure with a distinct error kind — nothing downstream retries them.
    pub fn from_config(
        config: &Config,
        store: Arc<dyn ArticleStore>,
    ) -> Result<Self, TruthLensError> {
        if config.anthropic_api_key.is_empty() {
            return Err(TruthLensError::Config(
                "ANTHROPIC_API_KEY is required".into(),
            ));
        }
        if config.embedding_api_key.is_empty() {
            return Err(TruthLensError::Config(
                "EMBEDDING_API_KEY is required".into(),
            ));
        }
        let model = ClaudeAnalysisModel::new(Claude::new(
            &config.anthropic_api_key,
            DEFAULT_ANALYSIS_MODEL,
        ));
        Ok(Self::new(
            store,
            Arc::new(model),
            Arc::new(Embedder::new(&config.embedding_api_key)),
        )
        .with_max_retries(config.analysis_max_retries))
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Tune the retry backoff (tests set both to zero).
    pub fn with_backoff(mut self, base: Duration, jitter_ms: u64) -> Self {
        self.backoff_base = base;
        self.jitter_ms = jitter_ms;
        self
    }

    /// Operator override: regenerate embeddings even where already present.
    pub fn with_force_embeddings(mut self, force: bool) -> Self {
        self.force_embeddings = force;
        self
    }

    /// Redirect run summaries away from the default data dir (tests).
    pub fn with_log_root(mut self, root: PathBuf) -> Self {
        self.log_root = Some(root);
        self
    }

    /// Analyze up to `batch_size` eligible articles, strictly sequentially —
    /// the remote model's request quota is the binding constraint, so local
    /// parallelism would only add throttling.
    pub async fn run(&self, batch_size: usize) -> AnalysisStats {
        let mut stats = AnalysisStats::new();
        let mut log = RunLog::new("analysis");
        if let Some(root) = &self.log_root {
            log = log.with_root(root.clone());
        }
        log.set_analysis_model(&self.model.model_id());
        log.set_embedding_model(&self.embedder.model_id());

        info!(batch_size, "Starting analysis run");

        let batch = match self.store.find_unanalyzed(batch_size).await {
            Ok(batch) => batch,
            Err(e) => {
                error!(error = %e, "Failed to select analysis batch");
                stats.processing_errors += 1;
                stats.finish();
                return stats;
            }
        };

        if batch.is_empty() {
            info!("No articles eligible for analysis");
            stats.finish_empty();
            if let Err(e) = log.save(&stats) {
                warn!(error = %e, "Failed to save analysis run summary");
            }
            return stats;
        }

        info!(count = batch.len(), "Selected articles for analysis");

        for article in &batch {
            stats.articles_selected += 1;
            self.analyze_one(article, &mut stats, &mut log).await;
        }

        stats.finish();
        if let Err(e) = log.save(&stats) {
            warn!(error = %e, "Failed to save analysis run summary");
        }

        info!("{stats}");
        stats
    }

    /// Per-article state machine. Every selected article ends in exactly one
    /// store write — a validated analysis or the fallback.
    async fn analyze_one(&self, article: &Article, stats: &mut AnalysisStats, log: &mut RunLog) {
        info!(
            article_id = %article.article_id,
            title = truncate_on_boundary(&article.title, 60),
            "Analyzing article"
        );

        let prompt = self.build_user_prompt(article);
        match self.call_with_retries(&prompt, article, stats).await {
            Ok(analysis) => self.persist_success(article, analysis, stats, log).await,
            Err(reason) => self.persist_fallback(article, &reason, stats, log).await,
        }
    }

    /// Attempt the model call up to `max_retries + 1` times, classifying each
    /// outcome on the closed error taxonomy. Returns the validated analysis,
    /// or the fallback reason once attempts are exhausted.
    async fn call_with_retries(
        &self,
        prompt: &str,
        article: &Article,
        stats: &mut AnalysisStats,
    ) -> Result<AnalysisResponse, String> {
        let article_id = article.article_id.as_str();
        let mut attempt: u32 = 0;

        loop {
            match self.model.analyze(SYSTEM_PROMPT, prompt).await {
                Ok(analysis) => match analysis.validate() {
                    Ok(()) => return Ok(analysis),
                    Err(e) => {
                        warn!(article_id, attempt, error = %e, "Response failed range validation");
                        stats.processing_errors += 1;
                        if attempt >= self.max_retries {
                            return Err("ValidationError".to_string());
                        }
                    }
                },
                // Safety blocks never retry: the same prompt will block again.
                Err(AiError::SafetyBlocked(msg)) => {
                    warn!(article_id, message = %msg, "Prompt blocked by safety filter");
                    return Err("SafetyBlocked".to_string());
                }
                Err(AiError::EmptyResponse) => {
                    warn!(article_id, attempt, "Empty model response");
                    if attempt >= self.max_retries {
                        return Err("BlockedOrEmpty".to_string());
                    }
                }
                // The model may emit valid JSON on a re-ask.
                Err(AiError::Malformed(msg)) => {
                    warn!(article_id, attempt, error = %msg, "Malformed structured output");
                    stats.processing_errors += 1;
                    if attempt >= self.max_retries {
                        return Err("ValidationError".to_string());
                    }
                }
                // Transient kinds, and anything unclassified treated as such.
                Err(e) => {
                    warn!(
                        article_id,
                        attempt,
                        kind = e.kind(),
                        error = %e,
                        "Model call failed"
                    );
                    if attempt >= self.max_retries {
                        stats.processing_errors += 1;
                        return Err(e.kind().to_string());
                    }
                }
            }

            stats.api_retries += 1;
            self.backoff(attempt).await;
            attempt += 1;
        }
    }

    async fn persist_success(
        &self,
        article: &Article,
        analysis: AnalysisResponse,
        stats: &mut AnalysisStats,
        log: &mut RunLog,
    ) {
        let (content_embedding, title_embedding) = self.backfill_embeddings(article, stats).await;

        // Embed the categorical parts of the analysis itself so analyses are
        // searchable by similarity.
        let mut analysis_embedding = None;
        if article.analysis_embedding.is_none() || self.force_embeddings {
            let summary = analysis.summary_text();
            if !summary.is_empty() {
                analysis_embedding = self.embedder.embed(&summary).await;
                stats.embeddings_generated += analysis_embedding.is_some() as u32;
            }
        }

        let update = self.build_update(
            article,
            &analysis,
            ProcessingStatus::Analyzed,
            self.model.model_id(),
            content_embedding,
            title_embedding,
            analysis_embedding,
        );

        match self.store.apply_analysis(&update).await {
            Ok(true) => {
                stats.articles_analyzed += 1;
                if analysis.bias_analysis.overall_score > HIGH_BIAS_THRESHOLD {
                    stats.high_bias_detected += 1;
                }
                if analysis.misinformation_analysis.risk_score > MISINFO_FLAG_THRESHOLD {
                    stats.misinformation_flagged += 1;
                }
                log.push_sample(SampleItem::new(
                    &article.title,
                    &article.source,
                    &article.url,
                    &article.content,
                ));
                info!(article_id = %article.article_id, "Article analyzed and updated");
            }
            Ok(false) => {
                warn!(
                    article_id = %article.article_id,
                    "Article no longer eligible for update, skipping"
                );
            }
            Err(e) => {
                error!(article_id = %article.article_id, error = %e, "Analysis update failed");
                stats.processing_errors += 1;
                if let Err(e) = self
                    .store
                    .mark_failed_analysis(&article.article_id, &e.to_string())
                    .await
                {
                    warn!(article_id = %article.article_id, error = %e, "Failed to mark article for retry");
                }
            }
        }
    }

    async fn persist_fallback(
        &self,
        article: &Article,
        reason: &str,
        stats: &mut AnalysisStats,
        log: &mut RunLog,
    ) {
        warn!(article_id = %article.article_id, reason, "Using fallback analysis");
        stats.fallback_analyses_used += 1;

        let analysis = AnalysisResponse::fallback(reason);

        // Fallback must not regress observability: missing embeddings are
        // still backfilled so similarity search covers these articles too.
        let (content_embedding, title_embedding) = self.backfill_embeddings(article, stats).await;

        let update = self.build_update(
            article,
            &analysis,
            ProcessingStatus::AnalyzedFallback,
            format!("fallback ({reason})"),
            content_embedding,
            title_embedding,
            None,
        );

        match self.store.apply_analysis(&update).await {
            Ok(true) => {
                log.push_sample(SampleItem::new(
                    &article.title,
                    &article.source,
                    &article.url,
                    &article.content,
                ));
                info!(article_id = %article.article_id, "Fallback analysis applied");
            }
            Ok(false) => {
                warn!(
                    article_id = %article.article_id,
                    "Article no longer eligible for fallback update, skipping"
                );
            }
            Err(e) => {
                error!(article_id = %article.article_id, error = %e, "Fallback update failed");
                stats.processing_errors += 1;
                if let Err(e) = self
                    .store
                    .mark_failed_analysis(&article.article_id, &e.to_string())
                    .await
                {
                    warn!(article_id = %article.article_id, error = %e, "Failed to mark article for retry");
                }
            }
        }
    }

    /// Compute content/title embeddings only where the article lacks them
    /// (or when the operator forces regeneration). Vectors are immutable once
    /// set; re-embedding unchanged text is pure cost.
    async fn backfill_embeddings(
        &self,
        article: &Article,
        stats: &mut AnalysisStats,
    ) -> (Option<Vec<f32>>, Option<Vec<f32>>) {
        let mut content_embedding = None;
        if article.content_embedding.is_none() || self.force_embeddings {
            content_embedding = self.embedder.embed(&article.content).await;
            stats.embeddings_generated += content_embedding.is_some() as u32;
        }

        let mut title_embedding = None;
        if article.title_embedding.is_none() || self.force_embeddings {
            title_embedding = self.embedder.embed(&article.title).await;
            stats.embeddings_generated += title_embedding.is_some() as u32;
        }

        (content_embedding, title_embedding)
    }

    #[allow(clippy::too_many_arguments)]
    fn build_update(
        &self,
        article: &Article,
        analysis: &AnalysisResponse,
        status: ProcessingStatus,
        analysis_model: String,
        content_embedding: Option<Vec<f32>>,
        title_embedding: Option<Vec<f32>>,
        analysis_embedding: Option<Vec<f32>>,
    ) -> AnalysisUpdate {
        AnalysisUpdate {
            article_id: article.article_id.clone(),
            analysis_json: serde_json::to_string(analysis).expect("analysis serializes"),
            bias_score: analysis.bias_analysis.overall_score,
            misinformation_risk: analysis.misinformation_analysis.risk_score,
            sentiment: analysis.sentiment_analysis.overall_sentiment,
            credibility_score: analysis.credibility_assessment.overall_score,
            status,
            analyzed_at: Utc::now(),
            analysis_model,
            content_embedding,
            title_embedding,
            analysis_embedding,
            force_embeddings: self.force_embeddings,
        }
    }

    fn build_user_prompt(&self, article: &Article) -> String {
        let content = truncate_on_boundary(&article.content, CONTENT_PROMPT_BUDGET);
        format!(
            "Analyze the following news article for bias, misinformation, sentiment, and \
             credibility. Scores run 0.0 (low) to 1.0 (high); sentiment runs -1.0 to 1.0.\n\n\
             Article Title: {title}\n\
             Article Source: {source}\n\
             Article Content:\n{content}\n\n\
             Report the analysis through the structured_response tool. Every field of this \
             schema must be present:\n{schema}",
            title = article.title,
            source = article.source,
            schema = self.schema_description,
        )
    }

    /// Exponential backoff with random jitter between attempts.
    async fn backoff(&self, attempt: u32) {
        let delay = self.backoff_base * 2u32.saturating_pow(attempt);
        let jitter = if self.jitter_ms > 0 {
            Duration::from_millis(rand::rng().random_range(0..self.jitter_ms))
        } else {
            Duration::ZERO
        };
        tokio::time::sleep(delay + jitter).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{pending_article, MockEmbedder, MockModel, MockStore};

    fn stage(store: Arc<MockStore>, model: Arc<MockModel>) -> AnalyzeStage {
        AnalyzeStage::new(store, model, Arc::new(MockEmbedder))
            .with_backoff(Duration::ZERO, 0)
            .with_log_root(tempfile::tempdir().unwrap().keep())
    }

    fn article() -> Article {
        pending_article(
            "http://ex.com/a",
            "Title X",
            "Plenty of body text for the analysis prompt.",
        )
    }

    #[tokio::test]
    async fn success_path_writes_analyzed() {
        let mut response = AnalysisResponse::default();
        response.bias_analysis.overall_score = 0.8;
        response.misinformation_analysis.risk_score = 0.7;
        let store = Arc::new(MockStore::with_unanalyzed(vec![article()]));
        let model = Arc::new(MockModel::always_ok(response));

        let stats = stage(store.clone(), model.clone()).run(10).await;

        assert_eq!(stats.articles_selected, 1);
        assert_eq!(stats.articles_analyzed, 1);
        assert_eq!(stats.fallback_analyses_used, 0);
        assert_eq!(stats.high_bias_detected, 1);
        assert_eq!(stats.misinformation_flagged, 1);
        assert_eq!(model.call_count(), 1);

        let updates = store.updates.lock().unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].status, ProcessingStatus::Analyzed);
        assert_eq!(updates[0].analysis_model, "mock-model");
        assert!(updates[0].content_embedding.is_some());
        assert_eq!(stats.status, crate::stats::RunStatus::CompletedSuccessfully);
    }

    #[tokio::test]
    async fn retry_ceiling_then_fallback_on_transient_errors() {
        // Scenario: rate-limited on every attempt with max_retries = 2 →
        // exactly 3 calls, then the fallback lands with the error kind.
        let store = Arc::new(MockStore::with_unanalyzed(vec![article()]));
        let model = Arc::new(MockModel::always_err(|| {
            AiError::RateLimited("429".to_string())
        }));

        let stats = stage(store.clone(), model.clone()).run(10).await;

        assert_eq!(model.call_count(), DEFAULT_MAX_RETRIES + 1);
        assert_eq!(stats.api_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(stats.fallback_analyses_used, 1);
        assert_eq!(stats.articles_analyzed, 0);

        let updates = store.updates.lock().unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].status, ProcessingStatus::AnalyzedFallback);
        assert!(updates[0].analysis_model.contains("fallback"));
        assert!(updates[0].analysis_model.contains("RateLimited"));
        assert!((updates[0].misinformation_risk - 0.1).abs() < f64::EPSILON);
        assert_eq!(
            stats.status,
            crate::stats::RunStatus::CompletedWithErrorsOrFallbacks
        );
    }

    #[tokio::test]
    async fn safety_block_falls_back_without_retry() {
        let store = Arc::new(MockStore::with_unanalyzed(vec![article()]));
        let model = Arc::new(MockModel::always_err(|| {
            AiError::SafetyBlocked("blocked".to_string())
        }));

        let stats = stage(store.clone(), model.clone()).run(10).await;

        assert_eq!(model.call_count(), 1);
        assert_eq!(stats.api_retries, 0);
        assert_eq!(stats.fallback_analyses_used, 1);

        let updates = store.updates.lock().unwrap();
        assert!(updates[0].analysis_model.contains("SafetyBlocked"));
    }

    #[tokio::test]
    async fn out_of_range_response_retries_then_falls_back() {
        // Scenario: bias overall_score = 1.5 on every attempt → validation
        // fails each time → fallback with at least one processing error.
        let mut bad = AnalysisResponse::default();
        bad.bias_analysis.overall_score = 1.5;
        let store = Arc::new(MockStore::with_unanalyzed(vec![article()]));
        let model = Arc::new(MockModel::scripted(vec![
            Ok(bad.clone()),
            Ok(bad.clone()),
            Ok(bad),
        ]));

        let stats = stage(store.clone(), model.clone()).run(10).await;

        assert_eq!(model.call_count(), DEFAULT_MAX_RETRIES + 1);
        assert_eq!(stats.fallback_analyses_used, 1);
        assert!(stats.processing_errors >= 1);

        let updates = store.updates.lock().unwrap();
        assert_eq!(updates[0].status, ProcessingStatus::AnalyzedFallback);
        assert!(updates[0].analysis_model.contains("ValidationError"));
        // The fallback shape itself is schema-legal.
        let persisted: AnalysisResponse =
            serde_json::from_str(&updates[0].analysis_json).unwrap();
        assert!(persisted.validate().is_ok());
    }

    #[tokio::test]
    async fn transient_error_then_success_recovers() {
        let store = Arc::new(MockStore::with_unanalyzed(vec![article()]));
        let model = Arc::new(MockModel::scripted(vec![
            Err(AiError::Unavailable("503".to_string())),
            Ok(AnalysisResponse::default()),
        ]));

        let stats = stage(store.clone(), model.clone()).run(10).await;

        assert_eq!(model.call_count(), 2);
        assert_eq!(stats.api_retries, 1);
        assert_eq!(stats.articles_analyzed, 1);
        assert_eq!(stats.fallback_analyses_used, 0);
    }

    #[tokio::test]
    async fn embeddings_not_regenerated_when_present() {
        let mut existing = article();
        existing.content_embedding = Some(vec![1.0; 8]);
        existing.title_embedding = Some(vec![1.0; 8]);
        let store = Arc::new(MockStore::with_unanalyzed(vec![existing]));
        let model = Arc::new(MockModel::always_ok(AnalysisResponse::default()));

        let stats = stage(store.clone(), model).run(10).await;

        let updates = store.updates.lock().unwrap();
        assert!(updates[0].content_embedding.is_none());
        assert!(updates[0].title_embedding.is_none());
        // Only the analysis-summary embedding may have been produced, and the
        // default response has an essentially empty summary apart from labels.
        assert!(stats.embeddings_generated <= 1);
    }

    #[tokio::test]
    async fn failed_update_marks_article_for_retry() {
        let mut store = MockStore::with_unanalyzed(vec![article()]);
        store.fail_updates = true;
        let store = Arc::new(store);
        let model = Arc::new(MockModel::always_ok(AnalysisResponse::default()));

        let stats = stage(store.clone(), model).run(10).await;

        assert_eq!(stats.articles_analyzed, 0);
        assert!(stats.processing_errors >= 1);
        assert_eq!(store.failed_marks.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_batch_completes_without_model_calls() {
        let store = Arc::new(MockStore::default());
        let model = Arc::new(MockModel::always_ok(AnalysisResponse::default()));

        let stats = stage(store, model.clone()).run(10).await;

        assert_eq!(model.call_count(), 0);
        assert_eq!(stats.status, crate::stats::RunStatus::CompletedNoArticles);
    }

    #[tokio::test]
    async fn batch_size_limits_selection() {
        let articles = (0..5)
            .map(|i| {
                pending_article(
                    &format!("http://ex.com/{i}"),
                    &format!("Title {i}"),
                    "Body text.",
                )
            })
            .collect();
        let store = Arc::new(MockStore::with_unanalyzed(articles));
        let model = Arc::new(MockModel::always_ok(AnalysisResponse::default()));

        let stats = stage(store, model).run(2).await;

        assert_eq!(stats.articles_selected, 2);
        assert_eq!(stats.articles_analyzed, 2);
    }

    #[test]
    fn from_config_rejects_missing_api_key() {
        let mut config = crate::testing::test_config();
        config.anthropic_api_key = String::new();
        let store: Arc<dyn crate::traits::ArticleStore> = Arc::new(MockStore::default());
        let err = AnalyzeStage::from_config(&config, store).err().unwrap();
        assert!(matches!(err, TruthLensError::Config(_)));
    }

    #[test]
    fn prompt_contains_schema_and_content() {
        let store = Arc::new(MockStore::default());
        let model = Arc::new(MockModel::always_ok(AnalysisResponse::default()));
        let stage = stage(store, model);

        let prompt = stage.build_user_prompt(&article());
        assert!(prompt.contains("Title X"));
        assert!(prompt.contains("bias_analysis"));
        assert!(prompt.contains("misinformation_analysis"));
        assert!(prompt.contains("structured_response"));
    }
}
