use std::time::Duration;

use async_trait::async_trait;
use spider_transformations::transformation::content::{
    transform_content_input, ReturnFormat, TransformConfig, TransformInput,
};
use tracing::{info, warn};

use crate::traits::PageTextExtractor;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// Plain HTTP fetch + Readability extraction. News article pages render
/// server-side, so no browser is needed; pages that require JS come back
/// empty and the caller falls through to the provider description.
pub struct HttpExtractor {
    client: reqwest::Client,
}

impl HttpExtractor {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .user_agent(USER_AGENT)
                .build()
                .expect("Failed to build HTTP client"),
        }
    }
}

impl Default for HttpExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PageTextExtractor for HttpExtractor {
    async fn extract(&self, url: &str) -> String {
        let response = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(url, error = %e, "Page download failed");
                return String::new();
            }
        };

        if !response.status().is_success() {
            warn!(url, status = %response.status(), "Page returned non-success status");
            return String::new();
        }

        let html = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!(url, error = %e, "Page body read failed");
                return String::new();
            }
        };

        if html.is_empty() {
            warn!(url, "Empty page body");
            return String::new();
        }

        let parsed_url = url::Url::parse(url).ok();
        let config = TransformConfig {
            readability: true,
            main_content: true,
            return_format: ReturnFormat::Markdown,
            filter_images: true,
            filter_svg: true,
            clean_html: true,
        };
        let input = TransformInput {
            url: parsed_url.as_ref(),
            content: html.as_bytes(),
            screenshot_bytes: None,
            encoding: None,
            selector_config: None,
            ignore_tags: None,
        };

        let text = transform_content_input(input, &config);

        if text.trim().is_empty() {
            warn!(url, "Empty content after Readability extraction");
            return String::new();
        }

        info!(url, bytes = text.len(), "Extracted article text");
        text.trim().to_string()
    }
}
