use chrono::{DateTime, Utc};
use serde::Serialize;

/// Final status of a stage run. A run never fails outright — it always
/// returns statistics, and the status says whether anything degraded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    CompletedSuccessfully,
    CompletedWithErrors,
    CompletedWithErrorsOrFallbacks,
    CompletedNoArticles,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::CompletedSuccessfully => "completed_successfully",
            RunStatus::CompletedWithErrors => "completed_with_errors",
            RunStatus::CompletedWithErrorsOrFallbacks => "completed_with_errors_or_fallbacks",
            RunStatus::CompletedNoArticles => "completed_no_articles",
        }
    }
}

/// Stats from one fetch stage run. Stage-owned, returned by value; the
/// orchestrator aggregates explicitly rather than sharing a mutable instance.
#[derive(Debug, Clone, Serialize)]
pub struct FetchStats {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub categories_processed: u32,
    pub topics_processed: u32,
    pub articles_found: u32,
    pub articles_stored: u32,
    pub duplicates_skipped: u32,
    pub quality_rejected: u32,
    pub embeddings_generated: u32,
    pub fetch_errors: u32,
    pub storage_errors: u32,
    pub status: RunStatus,
}

impl FetchStats {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            categories_processed: 0,
            topics_processed: 0,
            articles_found: 0,
            articles_stored: 0,
            duplicates_skipped: 0,
            quality_rejected: 0,
            embeddings_generated: 0,
            fetch_errors: 0,
            storage_errors: 0,
            status: RunStatus::Running,
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
        self.status = if self.fetch_errors + self.storage_errors > 0 {
            RunStatus::CompletedWithErrors
        } else {
            RunStatus::CompletedSuccessfully
        };
    }
}

impl Default for FetchStats {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for FetchStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Fetch Run Complete ===")?;
        writeln!(f, "Categories processed: {}", self.categories_processed)?;
        writeln!(f, "Topics processed:     {}", self.topics_processed)?;
        writeln!(f, "Articles found:       {}", self.articles_found)?;
        writeln!(f, "Articles stored:      {}", self.articles_stored)?;
        writeln!(f, "Duplicates skipped:   {}", self.duplicates_skipped)?;
        writeln!(f, "Quality rejected:     {}", self.quality_rejected)?;
        writeln!(f, "Embeddings generated: {}", self.embeddings_generated)?;
        writeln!(f, "Fetch errors:         {}", self.fetch_errors)?;
        writeln!(f, "Storage errors:       {}", self.storage_errors)?;
        writeln!(f, "Status:               {}", self.status.as_str())?;
        Ok(())
    }
}

/// Stats from one analysis stage run.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisStats {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub articles_selected: u32,
    pub articles_analyzed: u32,
    pub fallback_analyses_used: u32,
    pub high_bias_detected: u32,
    pub misinformation_flagged: u32,
    pub embeddings_generated: u32,
    pub processing_errors: u32,
    pub api_retries: u32,
    pub status: RunStatus,
}

impl AnalysisStats {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            articles_selected: 0,
            articles_analyzed: 0,
            fallback_analyses_used: 0,
            high_bias_detected: 0,
            misinformation_flagged: 0,
            embeddings_generated: 0,
            processing_errors: 0,
            api_retries: 0,
            status: RunStatus::Running,
        }
    }

    /// `completed_successfully` only if nothing errored and nothing fell back.
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
        self.status = if self.processing_errors + self.fallback_analyses_used > 0 {
            RunStatus::CompletedWithErrorsOrFallbacks
        } else {
            RunStatus::CompletedSuccessfully
        };
    }

    pub fn finish_empty(&mut self) {
        self.finished_at = Some(Utc::now());
        self.status = RunStatus::CompletedNoArticles;
    }
}

impl Default for AnalysisStats {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AnalysisStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Analysis Run Complete ===")?;
        writeln!(f, "Articles selected:     {}", self.articles_selected)?;
        writeln!(f, "Articles analyzed:     {}", self.articles_analyzed)?;
        writeln!(f, "Fallbacks used:        {}", self.fallback_analyses_used)?;
        writeln!(f, "High bias detected:    {}", self.high_bias_detected)?;
        writeln!(f, "Misinformation flags:  {}", self.misinformation_flagged)?;
        writeln!(f, "Embeddings generated:  {}", self.embeddings_generated)?;
        writeln!(f, "Processing errors:     {}", self.processing_errors)?;
        writeln!(f, "API retries:           {}", self.api_retries)?;
        writeln!(f, "Status:                {}", self.status.as_str())?;
        Ok(())
    }
}
