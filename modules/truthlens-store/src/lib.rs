pub mod client;
pub mod error;
pub mod migrate;
pub mod reader;
pub mod writer;

pub use client::StoreClient;
pub use error::StoreError;
pub use migrate::migrate;
pub use reader::ArticleReader;
pub use writer::{AnalysisUpdate, ArticleWriter, BulkInsertOutcome};
