pub mod error;
pub mod types;

pub use error::{NewsApiError, Result};
pub use types::{ArticlesResponse, RawArticle, SourceRef};

use std::time::Duration;

use tracing::info;

const BASE_URL: &str = "https://newsapi.org/v2";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the NewsAPI.org listing endpoints. Two operations are exposed:
/// top headlines by category, and free-text topic search. A non-"ok" provider
/// status surfaces as `NewsApiError::NotOk`; callers treat any error as
/// "zero usable entries for this request".
pub struct NewsApiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl NewsApiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("Failed to build HTTP client"),
            api_key: api_key.into(),
            base_url: BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// List top headlines for a category.
    pub async fn top_headlines(&self, category: &str, page_size: u32) -> Result<Vec<RawArticle>> {
        let url = format!("{}/top-headlines", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("X-Api-Key", &self.api_key)
            .query(&[
                ("category", category),
                ("language", "en"),
                ("pageSize", &page_size.to_string()),
            ])
            .send()
            .await?;

        let articles = self.handle_response(response).await?;
        info!(category, count = articles.len(), "Top headlines fetched");
        Ok(articles)
    }

    /// List articles matching a free-text query, newest first.
    pub async fn search(&self, query: &str, page_size: u32) -> Result<Vec<RawArticle>> {
        let url = format!("{}/everything", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("X-Api-Key", &self.api_key)
            .query(&[
                ("q", query),
                ("language", "en"),
                ("sortBy", "publishedAt"),
                ("pageSize", &page_size.to_string()),
            ])
            .send()
            .await?;

        let articles = self.handle_response(response).await?;
        info!(query, count = articles.len(), "Topic search fetched");
        Ok(articles)
    }

    async fn handle_response(&self, response: reqwest::Response) -> Result<Vec<RawArticle>> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NewsApiError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let parsed: ArticlesResponse = response
            .json()
            .await
            .map_err(|e| NewsApiError::Parse(e.to_string()))?;

        if parsed.status != "ok" {
            return Err(NewsApiError::NotOk {
                status: parsed.status,
                message: parsed
                    .message
                    .or(parsed.code)
                    .unwrap_or_else(|| "no message".to_string()),
            });
        }

        Ok(parsed.articles)
    }
}
