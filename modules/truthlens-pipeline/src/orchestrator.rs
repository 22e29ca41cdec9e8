use serde::Serialize;
use tracing::info;

use crate::analyzer::AnalyzeStage;
use crate::fetch::FetchStage;
use crate::stats::{AnalysisStats, FetchStats};

/// Default cap on the chained analysis batch.
pub const DEFAULT_ANALYSIS_BATCH: usize = 20;

/// Merged result of a fetch run and the (conditionally) chained analysis run.
/// The analysis sub-result sits under its own key so callers can distinguish
/// "fetch ran" from "analysis ran".
#[derive(Debug, Clone, Serialize)]
pub struct CombinedOutcome {
    pub status: &'static str,
    pub message: String,
    pub fetch: FetchStats,
    pub analysis: Option<AnalysisStats>,
}

/// Wraps the two stages: runs fetch, then chains analysis only when the fetch
/// actually stored something new. The analysis stage remains independently
/// invokable via `run_analyze`.
pub struct Orchestrator {
    fetch: FetchStage,
    analyze: AnalyzeStage,
    default_batch_size: usize,
}

impl Orchestrator {
    pub fn new(fetch: FetchStage, analyze: AnalyzeStage) -> Self {
        Self {
            fetch,
            analyze,
            default_batch_size: DEFAULT_ANALYSIS_BATCH,
        }
    }

    pub fn with_default_batch_size(mut self, batch_size: usize) -> Self {
        self.default_batch_size = batch_size;
        self
    }

    /// Run the fetch stage; iff it stored new articles, run the analysis
    /// stage sized to what was just stored (capped at the default batch).
    pub async fn run_fetch_then_analyze(&self) -> CombinedOutcome {
        let fetch = self.fetch.run().await;

        let analysis = if fetch.articles_stored > 0 {
            let batch_size = (fetch.articles_stored as usize).min(self.default_batch_size);
            info!(
                stored = fetch.articles_stored,
                batch_size, "New articles stored, chaining analysis stage"
            );
            Some(self.analyze.run(batch_size).await)
        } else {
            info!("No new articles stored, analysis stage not triggered");
            None
        };

        let message = match &analysis {
            Some(stats) => format!(
                "Fetch stored {} articles; analysis processed {}",
                fetch.articles_stored, stats.articles_selected
            ),
            None => "Fetch stored no new articles; analysis not triggered".to_string(),
        };

        CombinedOutcome {
            status: "success",
            message,
            fetch,
            analysis,
        }
    }

    /// Direct trigger for the analysis stage.
    pub async fn run_analyze(&self, batch_size: Option<usize>) -> AnalysisStats {
        self.analyze
            .run(batch_size.unwrap_or(self.default_batch_size))
            .await
    }

    /// Direct trigger for the fetch stage alone.
    pub async fn run_fetch(&self) -> FetchStats {
        self.fetch.run().await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::testing::{
        pending_article, raw_article, MockEmbedder, MockExtractor, MockModel, MockProvider,
        MockStore,
    };
    use truthlens_common::AnalysisResponse;

    fn orchestrator(
        provider: MockProvider,
        extractor: MockExtractor,
        store: Arc<MockStore>,
        model: Arc<MockModel>,
    ) -> Orchestrator {
        let log_root = tempfile::tempdir().unwrap().keep();
        let fetch = FetchStage::new(
            Arc::new(provider),
            store.clone(),
            Arc::new(extractor),
            Arc::new(MockEmbedder),
        )
        .with_log_root(log_root.clone());
        let analyze = AnalyzeStage::new(store, model, Arc::new(MockEmbedder))
            .with_backoff(Duration::ZERO, 0)
            .with_log_root(log_root);
        Orchestrator::new(fetch, analyze)
    }

    #[tokio::test]
    async fn zero_stored_articles_never_invokes_analysis() {
        // Provider returns nothing, so the analysis entry point must see
        // zero calls — not even a batch selection.
        let store = Arc::new(MockStore::default());
        let model = Arc::new(MockModel::always_ok(AnalysisResponse::default()));

        let outcome = orchestrator(
            MockProvider::default(),
            MockExtractor::default(),
            store.clone(),
            model.clone(),
        )
        .run_fetch_then_analyze()
        .await;

        assert_eq!(outcome.fetch.articles_stored, 0);
        assert!(outcome.analysis.is_none());
        assert_eq!(model.call_count(), 0);
        assert_eq!(store.find_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn stored_articles_chain_into_analysis() {
        let url = "http://ex.com/a";
        let provider = MockProvider::with_headlines(
            "general",
            vec![raw_article("Title X", url, "Example Times", "")],
        );
        let extractor = MockExtractor::with_page(url, &vec!["word"; 100].join(" "));
        let store = Arc::new(MockStore::default());
        let model = Arc::new(MockModel::always_ok(AnalysisResponse::default()));

        // The freshly stored article is what the analysis stage selects.
        {
            let mut unanalyzed = store.unanalyzed.lock().unwrap();
            unanalyzed.push(pending_article(url, "Title X", "Body text."));
        }

        let outcome = orchestrator(provider, extractor, store.clone(), model.clone())
            .run_fetch_then_analyze()
            .await;

        assert_eq!(outcome.fetch.articles_stored, 1);
        let analysis = outcome.analysis.expect("analysis should have run");
        assert_eq!(analysis.articles_selected, 1);
        assert_eq!(model.call_count(), 1);
        assert_eq!(outcome.status, "success");
    }

    #[tokio::test]
    async fn chained_batch_is_capped_by_default_size() {
        let entries: Vec<_> = (0..5)
            .map(|i| {
                raw_article(
                    &format!("Title {i}"),
                    &format!("http://ex.com/{i}"),
                    "Example Times",
                    &"d".repeat(300),
                )
            })
            .collect();
        let provider = MockProvider::with_headlines("general", entries);
        let store = Arc::new(MockStore::default());
        let model = Arc::new(MockModel::always_ok(AnalysisResponse::default()));
        {
            let mut unanalyzed = store.unanalyzed.lock().unwrap();
            for i in 0..5 {
                unanalyzed.push(pending_article(
                    &format!("http://ex.com/{i}"),
                    &format!("Title {i}"),
                    "Body text.",
                ));
            }
        }

        let outcome = orchestrator(provider, MockExtractor::default(), store, model)
            .with_default_batch_size(3)
            .run_fetch_then_analyze()
            .await;

        assert_eq!(outcome.fetch.articles_stored, 5);
        // min(5 stored, default 3) = 3
        assert_eq!(outcome.analysis.unwrap().articles_selected, 3);
    }

    #[tokio::test]
    async fn direct_analysis_trigger_uses_default_batch() {
        let store = Arc::new(MockStore::with_unanalyzed(vec![pending_article(
            "http://ex.com/a",
            "Title X",
            "Body text.",
        )]));
        let model = Arc::new(MockModel::always_ok(AnalysisResponse::default()));

        let stats = orchestrator(
            MockProvider::default(),
            MockExtractor::default(),
            store,
            model,
        )
        .run_analyze(None)
        .await;

        assert_eq!(stats.articles_selected, 1);
        assert_eq!(stats.articles_analyzed, 1);
    }

    #[tokio::test]
    async fn combined_outcome_serializes_with_distinct_keys() {
        let store = Arc::new(MockStore::default());
        let model = Arc::new(MockModel::always_ok(AnalysisResponse::default()));

        let outcome = orchestrator(
            MockProvider::default(),
            MockExtractor::default(),
            store,
            model,
        )
        .run_fetch_then_analyze()
        .await;

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "success");
        assert!(json["fetch"]["articles_stored"].is_number());
        assert!(json["analysis"].is_null());
    }
}
