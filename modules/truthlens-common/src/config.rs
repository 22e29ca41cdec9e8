use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Neo4j
    pub neo4j_uri: String,
    pub neo4j_user: String,
    pub neo4j_password: String,

    // AI providers
    pub anthropic_api_key: String,
    pub embedding_api_key: String,

    // News listing provider
    pub news_api_key: String,

    // Web server
    pub host: String,
    pub port: u16,

    // Pipeline tuning
    pub analysis_batch_size: usize,
    pub analysis_max_retries: u32,
    pub scrape_interval_minutes: u64,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            neo4j_uri: required_env("NEO4J_URI"),
            neo4j_user: required_env("NEO4J_USER"),
            neo4j_password: required_env("NEO4J_PASSWORD"),
            anthropic_api_key: required_env("ANTHROPIC_API_KEY"),
            embedding_api_key: required_env("EMBEDDING_API_KEY"),
            news_api_key: required_env("NEWS_API_KEY"),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .expect("PORT must be a number"),
            analysis_batch_size: env::var("ANALYSIS_BATCH_SIZE")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .expect("ANALYSIS_BATCH_SIZE must be a number"),
            analysis_max_retries: env::var("ANALYSIS_MAX_RETRIES")
                .unwrap_or_else(|_| "2".to_string())
                .parse()
                .expect("ANALYSIS_MAX_RETRIES must be a number"),
            scrape_interval_minutes: env::var("SCRAPE_INTERVAL_MINUTES")
                .unwrap_or_else(|_| "360".to_string())
                .parse()
                .expect("SCRAPE_INTERVAL_MINUTES must be a number"),
        }
    }

    /// Log the config with secrets redacted.
    pub fn log_redacted(&self) {
        tracing::info!(
            neo4j_uri = %self.neo4j_uri,
            host = %self.host,
            port = self.port,
            analysis_batch_size = self.analysis_batch_size,
            analysis_max_retries = self.analysis_max_retries,
            scrape_interval_minutes = self.scrape_interval_minutes,
            "Config loaded (keys redacted)"
        );
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}
