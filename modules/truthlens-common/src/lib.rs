pub mod analysis;
pub mod config;
pub mod error;
pub mod types;

pub use analysis::{
    AnalysisResponse, BiasAnalysis, CredibilityAssessment, FactCheck, MisinformationAnalysis,
    RangeError, SentimentAnalysis,
};
pub use config::Config;
pub use error::TruthLensError;
pub use types::{
    article_id, content_fingerprint, truncate_on_boundary, Article, ProcessingStatus,
};
