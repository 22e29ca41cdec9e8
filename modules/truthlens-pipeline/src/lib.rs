pub mod analyzer;
pub mod embedder;
pub mod extractor;
pub mod fetch;
pub mod orchestrator;
pub mod run_log;
pub mod stats;
pub mod traits;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use analyzer::AnalyzeStage;
pub use fetch::FetchStage;
pub use orchestrator::{CombinedOutcome, Orchestrator};
pub use stats::{AnalysisStats, FetchStats, RunStatus};
