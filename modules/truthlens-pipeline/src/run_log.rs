//! Run log — one persisted JSON summary per stage run.
//!
//! Each run writes a single `{DATA_DIR}/{stage}-runs/{run_id}.json` document
//! with timestamps, the full statistics object, and a bounded sample of
//! processed items. Write-only side artifact; nothing in the pipeline reads
//! it back.

use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use truthlens_common::truncate_on_boundary;

/// Cap on sampled items so the artifact stays small.
pub const MAX_SAMPLE_ITEMS: usize = 10;

const PREVIEW_BYTES: usize = 200;

/// Root data directory, controlled by `DATA_DIR` env var (default: `"data"`).
pub fn data_dir() -> PathBuf {
    PathBuf::from(std::env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()))
}

#[derive(Debug, Clone, Serialize)]
pub struct SampleItem {
    pub title: String,
    pub source: String,
    pub url: String,
    pub content_preview: String,
}

impl SampleItem {
    pub fn new(title: &str, source: &str, url: &str, content: &str) -> Self {
        Self {
            title: title.to_string(),
            source: source.to_string(),
            url: url.to_string(),
            content_preview: truncate_on_boundary(content, PREVIEW_BYTES).to_string(),
        }
    }
}

pub struct RunLog {
    pub run_id: String,
    stage: &'static str,
    started_at: DateTime<Utc>,
    samples: Vec<SampleItem>,
    analysis_model: Option<String>,
    embedding_model: Option<String>,
    root: Option<PathBuf>,
}

impl RunLog {
    pub fn new(stage: &'static str) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            stage,
            started_at: Utc::now(),
            samples: Vec::new(),
            analysis_model: None,
            embedding_model: None,
            root: None,
        }
    }

    /// Override the output root (defaults to `data_dir()`).
    pub fn with_root(mut self, root: PathBuf) -> Self {
        self.root = Some(root);
        self
    }

    pub fn set_analysis_model(&mut self, model: &str) {
        self.analysis_model = Some(model.to_string());
    }

    pub fn set_embedding_model(&mut self, model: &str) {
        self.embedding_model = Some(model.to_string());
    }

    /// Record a sample item; silently dropped once the cap is reached.
    pub fn push_sample(&mut self, item: SampleItem) {
        if self.samples.len() < MAX_SAMPLE_ITEMS {
            self.samples.push(item);
        }
    }

    /// Serialize the summary to JSON and write it to disk.
    /// Returns the file path on success.
    pub fn save<S: Serialize>(&self, stats: &S) -> Result<PathBuf> {
        let dir = self
            .root
            .clone()
            .unwrap_or_else(data_dir)
            .join(format!("{}-runs", self.stage));
        std::fs::create_dir_all(&dir)?;

        let path = dir.join(format!("{}.json", self.run_id));
        let finished_at = Utc::now();

        let output = SerializedRunLog {
            run_id: &self.run_id,
            stage: self.stage,
            started_at: self.started_at,
            finished_at,
            duration_seconds: (finished_at - self.started_at).num_milliseconds() as f64 / 1000.0,
            statistics: stats,
            sample_articles: &self.samples,
            analysis_model: self.analysis_model.as_deref(),
            embedding_model: self.embedding_model.as_deref(),
        };

        std::fs::write(&path, serde_json::to_string_pretty(&output)?)?;
        info!(path = %path.display(), stage = self.stage, "Run summary saved");

        Ok(path)
    }
}

#[derive(Serialize)]
struct SerializedRunLog<'a, S: Serialize> {
    run_id: &'a str,
    stage: &'a str,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    duration_seconds: f64,
    statistics: &'a S,
    sample_articles: &'a [SampleItem],
    analysis_model: Option<&'a str>,
    embedding_model: Option<&'a str>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::FetchStats;

    #[test]
    fn save_writes_bounded_summary() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = RunLog::new("fetch").with_root(dir.path().to_path_buf());
        log.set_embedding_model("text-embedding-3-small");

        for i in 0..25 {
            log.push_sample(SampleItem::new(
                &format!("Title {i}"),
                "Example Times",
                &format!("https://example.com/{i}"),
                "Body text that is long enough to be previewed in the artifact.",
            ));
        }

        let stats = FetchStats::new();
        let path = log.save(&stats).unwrap();
        assert!(path.exists());

        let raw = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed["stage"], "fetch");
        assert_eq!(
            parsed["sample_articles"].as_array().unwrap().len(),
            MAX_SAMPLE_ITEMS
        );
        assert_eq!(parsed["embedding_model"], "text-embedding-3-small");
        assert!(parsed["statistics"]["articles_found"].is_number());
    }

    #[test]
    fn preview_is_truncated() {
        let long = "x".repeat(1000);
        let item = SampleItem::new("t", "s", "u", &long);
        assert_eq!(item.content_preview.len(), PREVIEW_BYTES);
    }
}
