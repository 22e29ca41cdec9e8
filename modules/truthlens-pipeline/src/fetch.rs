use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use newsapi_client::{NewsApiClient, RawArticle};
use truthlens_common::{
    article_id, content_fingerprint, Article, Config, ProcessingStatus, TruthLensError,
};

use crate::embedder::Embedder;
use crate::extractor::HttpExtractor;
use crate::run_log::{RunLog, SampleItem};
use crate::stats::FetchStats;
use crate::traits::{ArticleStore, NewsProvider, PageTextExtractor, TextEmbedder};

/// Categories pulled from the provider's top-headlines listing each run.
pub const CATEGORIES: &[&str] = &["general", "business", "technology", "science", "health"];

/// Free-text topics searched each run, aimed at coverage the category
/// listings miss.
pub const TOPICS: &[&str] = &[
    "misinformation",
    "fact checking",
    "media bias",
    "election integrity",
];

/// Entries requested per category/topic slice.
const PAGE_SIZE: u32 = 20;

/// Concurrent provider/page requests. Kept low to respect provider rate
/// limits.
const FETCH_CONCURRENCY: usize = 2;

/// Articles whose text (after the description fallback) is shorter than this
/// are rejected. Filters paywalled stubs and cookie-wall shells.
pub const MIN_CONTENT_CHARS: usize = 150;

enum Slice {
    Category(&'static str),
    Topic(&'static str),
}

impl Slice {
    fn label(&self) -> &'static str {
        match *self {
            Slice::Category(name) | Slice::Topic(name) => name,
        }
    }
}

enum EntryOutcome {
    MissingFields,
    Duplicate,
    TooShort,
    Ready(Box<Article>),
}

/// The scraping pipeline: list articles from the provider across the fixed
/// categories and topics, dedupe by URL-derived identifier, extract full
/// text, attach embeddings, and bulk-store the survivors as `pending`.
pub struct FetchStage {
    provider: Arc<dyn NewsProvider>,
    store: Arc<dyn ArticleStore>,
    extractor: Arc<dyn PageTextExtractor>,
    embedder: Arc<dyn TextEmbedder>,
    log_root: Option<PathBuf>,
}

impl FetchStage {
    pub fn new(
        provider: Arc<dyn NewsProvider>,
        store: Arc<dyn ArticleStore>,
        extractor: Arc<dyn PageTextExtractor>,
        embedder: Arc<dyn TextEmbedder>,
    ) -> Self {
        Self {
            provider,
            store,
            extractor,
            embedder,
            log_root: None,
        }
    }

    /// Build the stage from configuration. Missing keys are a construction
    /// failure with a distinct error kind — nothing downstream retries them.
    pub fn from_config(
        config: &Config,
        store: Arc<dyn ArticleStore>,
    ) -> Result<Self, TruthLensError> {
        if config.news_api_key.is_empty() {
            return Err(TruthLensError::Config("NEWS_API_KEY is required".into()));
        }
        if config.embedding_api_key.is_empty() {
            return Err(TruthLensError::Config(
                "EMBEDDING_API_KEY is required".into(),
            ));
        }
        Ok(Self::new(
            Arc::new(NewsApiClient::new(&config.news_api_key)),
            store,
            Arc::new(HttpExtractor::new()),
            Arc::new(Embedder::new(&config.embedding_api_key)),
        ))
    }

    /// Redirect run summaries away from the default data dir (tests).
    pub fn with_log_root(mut self, root: PathBuf) -> Self {
        self.log_root = Some(root);
        self
    }

    /// Run one fetch cycle. Never fails outright: provider and storage
    /// failures are counted and the run completes with whatever survived.
    pub async fn run(&self) -> FetchStats {
        let mut stats = FetchStats::new();
        let mut log = RunLog::new("fetch");
        if let Some(root) = &self.log_root {
            log = log.with_root(root.clone());
        }
        log.set_embedding_model(&self.embedder.model_id());

        info!(
            categories = CATEGORIES.len(),
            topics = TOPICS.len(),
            "Starting fetch run"
        );

        // 1. Provider listing fan-out, bounded to respect rate limits.
        let slices: Vec<Slice> = CATEGORIES
            .iter()
            .copied()
            .map(Slice::Category)
            .chain(TOPICS.iter().copied().map(Slice::Topic))
            .collect();

        let listings: Vec<_> = stream::iter(slices.into_iter().map(|slice| async move {
            let result = match &slice {
                Slice::Category(category) => {
                    self.provider.top_headlines(category, PAGE_SIZE).await
                }
                Slice::Topic(topic) => self.provider.search(topic, PAGE_SIZE).await,
            };
            (slice, result)
        }))
        .buffer_unordered(FETCH_CONCURRENCY)
        .collect()
        .await;

        let mut entries: Vec<RawArticle> = Vec::new();
        for (slice, result) in listings {
            match result {
                Ok(list) => {
                    match slice {
                        Slice::Category(_) => stats.categories_processed += 1,
                        Slice::Topic(_) => stats.topics_processed += 1,
                    }
                    stats.articles_found += list.len() as u32;
                    entries.extend(list);
                }
                Err(e) => {
                    warn!(slice = slice.label(), error = %e, "Provider request failed");
                    stats.fetch_errors += 1;
                }
            }
        }

        // Within-run dedup: the same story often appears in several slices.
        let mut seen = HashSet::new();
        let entries: Vec<RawArticle> = entries
            .into_iter()
            .filter(|entry| match &entry.url {
                Some(url) => seen.insert(url.clone()),
                None => true,
            })
            .collect();

        info!(entries = entries.len(), "Unique listing entries to process");

        // 2. Per-entry pipeline: dedupe against the store, extract, embed.
        let outcomes: Vec<EntryOutcome> =
            stream::iter(entries.into_iter().map(|entry| self.process_entry(entry)))
                .buffer_unordered(FETCH_CONCURRENCY)
                .collect()
                .await;

        let mut assembled: Vec<Article> = Vec::new();
        for outcome in outcomes {
            match outcome {
                EntryOutcome::MissingFields => {}
                EntryOutcome::Duplicate => stats.duplicates_skipped += 1,
                EntryOutcome::TooShort => stats.quality_rejected += 1,
                EntryOutcome::Ready(article) => {
                    stats.embeddings_generated += article.content_embedding.is_some() as u32
                        + article.title_embedding.is_some() as u32;
                    assembled.push(*article);
                }
            }
        }

        for article in assembled.iter().take(crate::run_log::MAX_SAMPLE_ITEMS) {
            log.push_sample(SampleItem::new(
                &article.title,
                &article.source,
                &article.url,
                &article.content,
            ));
        }

        // 3. Bulk unordered insert; the store constraint absorbs races.
        let outcome = self.store.insert_articles(&assembled).await;
        stats.articles_stored += outcome.inserted;
        stats.duplicates_skipped += outcome.duplicates;
        stats.storage_errors += outcome.failed;

        stats.finish();
        if let Err(e) = log.save(&stats) {
            warn!(error = %e, "Failed to save fetch run summary");
        }

        info!("{stats}");
        stats
    }

    async fn process_entry(&self, entry: RawArticle) -> EntryOutcome {
        let title = match entry.title.as_deref().map(str::trim) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => {
                debug!("Entry skipped: missing title");
                return EntryOutcome::MissingFields;
            }
        };
        let url = match entry.url.as_deref().map(str::trim) {
            Some(u) if !u.is_empty() => u.to_string(),
            _ => {
                debug!(title, "Entry skipped: missing URL");
                return EntryOutcome::MissingFields;
            }
        };

        let id = article_id(&url);
        match self.store.article_exists(&id).await {
            Ok(true) => {
                debug!(url, "Duplicate skipped");
                return EntryOutcome::Duplicate;
            }
            Ok(false) => {}
            Err(e) => {
                // Proceed; the insert constraint is the backstop.
                warn!(url, error = %e, "Existence check failed, proceeding");
            }
        }

        let extracted = self.extractor.extract(&url).await;
        let content = if extracted.trim().len() >= MIN_CONTENT_CHARS {
            extracted
        } else {
            entry.description.clone().unwrap_or_default()
        };
        if content.trim().len() < MIN_CONTENT_CHARS {
            debug!(url, chars = content.trim().len(), "Rejected below content length threshold");
            return EntryOutcome::TooShort;
        }

        let content_embedding = self.embedder.embed(&content).await;
        let title_embedding = self.embedder.embed(&title).await;

        let published_at = parse_published_at(entry.published_at.as_deref(), &url);

        let article = Article {
            article_id: id,
            word_count: Article::word_count_of(&content),
            content_hash: content_fingerprint(&content),
            title,
            source: entry
                .source
                .name
                .clone()
                .unwrap_or_else(|| "Unknown".to_string()),
            url,
            description: entry.description.clone(),
            published_at,
            scraped_at: Utc::now(),
            content_embedding,
            title_embedding,
            analysis_embedding: None,
            processing_status: Some(ProcessingStatus::Pending),
            analysis: None,
            analyzed_at: None,
            analysis_model: None,
            content,
        };

        EntryOutcome::Ready(Box::new(article))
    }
}

/// Defensive timestamp parse: provider timestamps are usually RFC 3339 but
/// not reliably so. Unparseable values are logged and dropped, never fatal.
fn parse_published_at(raw: Option<&str>, url: &str) -> Option<DateTime<Utc>> {
    let raw = raw?;
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => Some(dt.with_timezone(&Utc)),
        Err(e) => {
            warn!(url, raw, error = %e, "Unparseable publish timestamp");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{raw_article, MockEmbedder, MockExtractor, MockProvider, MockStore};

    fn stage(
        provider: MockProvider,
        store: Arc<MockStore>,
        extractor: MockExtractor,
    ) -> FetchStage {
        FetchStage::new(
            Arc::new(provider),
            store,
            Arc::new(extractor),
            Arc::new(MockEmbedder),
        )
        .with_log_root(tempfile::tempdir().unwrap().keep())
    }

    fn long_text(words: usize) -> String {
        vec!["word"; words].join(" ")
    }

    #[tokio::test]
    async fn stores_new_article_with_pending_status() {
        let url = "http://ex.com/a";
        let provider = MockProvider::with_headlines(
            "general",
            vec![raw_article("Title X", url, "Example Times", "")],
        );
        let extractor = MockExtractor::with_page(url, &long_text(100));
        let store = Arc::new(MockStore::default());

        let stats = stage(provider, store.clone(), extractor).run().await;

        assert_eq!(stats.articles_stored, 1);
        assert_eq!(stats.duplicates_skipped, 0);
        let inserted = store.inserted.lock().unwrap();
        assert_eq!(inserted.len(), 1);
        assert_eq!(inserted[0].article_id, article_id(url));
        assert_eq!(
            inserted[0].processing_status,
            Some(ProcessingStatus::Pending)
        );
        assert!(inserted[0].content_embedding.is_some());
        assert!(inserted[0].title_embedding.is_some());
    }

    #[tokio::test]
    async fn second_run_skips_duplicate() {
        let url = "http://ex.com/a";
        let make_provider = || {
            MockProvider::with_headlines(
                "general",
                vec![raw_article("Title X", url, "Example Times", "")],
            )
        };
        let store = Arc::new(MockStore::default());

        let first = stage(
            make_provider(),
            store.clone(),
            MockExtractor::with_page(url, &long_text(100)),
        )
        .run()
        .await;
        let second = stage(
            make_provider(),
            store.clone(),
            MockExtractor::with_page(url, &long_text(100)),
        )
        .run()
        .await;

        assert_eq!(first.articles_stored, 1);
        assert_eq!(second.articles_stored, 0);
        assert_eq!(second.duplicates_skipped, 1);
        assert_eq!(store.inserted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn quality_gate_rejects_short_content() {
        let url = "http://ex.com/stub";
        let provider = MockProvider::with_headlines(
            "general",
            vec![raw_article("Paywalled", url, "Example Times", "short stub")],
        );
        // Extraction fails and the description is far below the threshold.
        let store = Arc::new(MockStore::default());

        let stats = stage(provider, store.clone(), MockExtractor::default())
            .run()
            .await;

        assert_eq!(stats.articles_stored, 0);
        assert_eq!(stats.quality_rejected, 1);
        assert!(store.inserted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn description_fallback_when_extraction_fails() {
        // Scenario: extraction returns empty, provider description is 300
        // chars. The stored article uses the description as content.
        let url = "http://ex.com/a";
        let description = "d".repeat(300);
        let provider = MockProvider::with_headlines(
            "general",
            vec![raw_article("X", url, "Example Times", &description)],
        );
        let store = Arc::new(MockStore::default());

        let stats = stage(provider, store.clone(), MockExtractor::default())
            .run()
            .await;

        assert_eq!(stats.articles_stored, 1);
        let inserted = store.inserted.lock().unwrap();
        assert_eq!(inserted[0].content, description);
        assert_eq!(
            inserted[0].processing_status,
            Some(ProcessingStatus::Pending)
        );
    }

    #[tokio::test]
    async fn provider_failure_counts_error_and_continues() {
        let mut provider = MockProvider::default();
        provider.fail_all = true;
        let store = Arc::new(MockStore::default());

        let stats = stage(provider, store, MockExtractor::default()).run().await;

        assert_eq!(
            stats.fetch_errors as usize,
            CATEGORIES.len() + TOPICS.len()
        );
        assert_eq!(stats.articles_stored, 0);
        assert_eq!(stats.status, crate::stats::RunStatus::CompletedWithErrors);
    }

    #[tokio::test]
    async fn entries_without_title_or_url_are_skipped() {
        let mut entry = raw_article("", "http://ex.com/a", "Example Times", "");
        entry.title = None;
        let provider = MockProvider::with_headlines("general", vec![entry]);
        let store = Arc::new(MockStore::default());

        let stats = stage(provider, store.clone(), MockExtractor::default())
            .run()
            .await;

        assert_eq!(stats.articles_stored, 0);
        assert_eq!(stats.quality_rejected, 0);
        assert!(store.inserted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn same_story_across_slices_stored_once() {
        let url = "http://ex.com/a";
        let entry = raw_article("Title X", url, "Example Times", "");
        let mut provider = MockProvider::default();
        provider
            .headlines
            .insert("general".to_string(), vec![entry.clone()]);
        provider
            .headlines
            .insert("business".to_string(), vec![entry]);
        let store = Arc::new(MockStore::default());

        let stats = stage(
            provider,
            store.clone(),
            MockExtractor::with_page(url, &long_text(100)),
        )
        .run()
        .await;

        assert_eq!(stats.articles_stored, 1);
        assert_eq!(store.inserted.lock().unwrap().len(), 1);
    }

    #[test]
    fn from_config_rejects_missing_provider_key() {
        let mut config = crate::testing::test_config();
        config.news_api_key = String::new();
        let store: Arc<dyn crate::traits::ArticleStore> = Arc::new(MockStore::default());
        let err = FetchStage::from_config(&config, store).err().unwrap();
        assert!(matches!(err, TruthLensError::Config(_)));
    }

    #[test]
    fn unparseable_timestamp_is_none() {
        assert!(parse_published_at(Some("not a date"), "http://ex.com").is_none());
        assert!(parse_published_at(None, "http://ex.com").is_none());
        assert!(parse_published_at(Some("2026-08-01T12:00:00Z"), "http://ex.com").is_some());
    }
}
