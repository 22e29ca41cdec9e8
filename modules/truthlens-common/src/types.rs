use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::analysis::AnalysisResponse;

/// Lifecycle of an article with respect to AI analysis. Transitions are
/// monotone: `Pending` moves to one of the terminal-ish states and never back.
/// `Pending` and `FailedAnalysis` (and articles with no status at all) are
/// eligible for re-selection by the analysis stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Pending,
    Analyzed,
    AnalyzedFallback,
    FailedAnalysis,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Analyzed => "analyzed",
            ProcessingStatus::AnalyzedFallback => "analyzed_fallback",
            ProcessingStatus::FailedAnalysis => "failed_analysis",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ProcessingStatus::Pending),
            "analyzed" => Some(ProcessingStatus::Analyzed),
            "analyzed_fallback" => Some(ProcessingStatus::AnalyzedFallback),
            "failed_analysis" => Some(ProcessingStatus::FailedAnalysis),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored news article. One per distinct canonical URL; `article_id` is a
/// pure function of the URL so re-fetching the same URL resolves to the same
/// record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub article_id: String,
    pub title: String,
    pub source: String,
    pub url: String,
    pub content: String,
    pub description: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub scraped_at: DateTime<Utc>,
    /// Hash of the normalized extracted text. Near-duplicate fingerprint,
    /// independent of the URL.
    pub content_hash: String,
    pub word_count: usize,
    pub content_embedding: Option<Vec<f32>>,
    pub title_embedding: Option<Vec<f32>>,
    pub analysis_embedding: Option<Vec<f32>>,
    pub processing_status: Option<ProcessingStatus>,
    pub analysis: Option<AnalysisResponse>,
    pub analyzed_at: Option<DateTime<Utc>>,
    pub analysis_model: Option<String>,
}

impl Article {
    pub fn word_count_of(content: &str) -> usize {
        content.split_whitespace().count()
    }
}

/// Derive the stable article identifier from the canonical URL.
pub fn article_id(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

/// Fingerprint of extracted text for near-duplicate detection.
///
/// The text is normalized first — lowercased, punctuation stripped, whitespace
/// collapsed — so the hash survives minor formatting differences between two
/// scrapes of the same story.
pub fn content_fingerprint(text: &str) -> String {
    let normalized = text
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}

/// Truncate to at most `max_bytes`, backing up to a char boundary.
pub fn truncate_on_boundary(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn article_id_is_deterministic() {
        let a = article_id("http://ex.com/a");
        let b = article_id("http://ex.com/a");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn article_id_differs_per_url() {
        assert_ne!(article_id("http://ex.com/a"), article_id("http://ex.com/b"));
    }

    #[test]
    fn fingerprint_ignores_case_and_punctuation() {
        let a = content_fingerprint("Senate passes the bill!");
        let b = content_fingerprint("senate   passes the bill");
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_differs_on_content() {
        assert_ne!(
            content_fingerprint("Senate passes the bill"),
            content_fingerprint("Senate rejects the bill")
        );
    }

    #[test]
    fn status_round_trips() {
        for s in [
            ProcessingStatus::Pending,
            ProcessingStatus::Analyzed,
            ProcessingStatus::AnalyzedFallback,
            ProcessingStatus::FailedAnalysis,
        ] {
            assert_eq!(ProcessingStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(ProcessingStatus::parse("garbage"), None);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let text = "héllo wörld";
        let truncated = truncate_on_boundary(text, 3);
        assert!(truncated.len() <= 3);
        assert!(text.starts_with(truncated));
        // Short input passes through untouched
        assert_eq!(truncate_on_boundary("abc", 100), "abc");
    }

    #[test]
    fn word_count_splits_on_whitespace() {
        assert_eq!(Article::word_count_of("one two  three\nfour"), 4);
        assert_eq!(Article::word_count_of(""), 0);
    }
}
