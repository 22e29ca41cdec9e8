use chrono::{DateTime, NaiveDateTime, Utc};
use neo4rs::query;

use truthlens_common::{AnalysisResponse, Article, ProcessingStatus};

use crate::StoreClient;

/// Read-side wrapper for the article store. The pipeline needs only a narrow
/// slice: existence checks, the unanalyzed batch, and status counts.
pub struct ArticleReader {
    client: StoreClient,
}

impl ArticleReader {
    pub fn new(client: StoreClient) -> Self {
        Self { client }
    }

    /// Whether an article with this identifier is already stored.
    pub async fn article_exists(&self, article_id: &str) -> Result<bool, neo4rs::Error> {
        let q = query("MATCH (a:Article {article_id: $article_id}) RETURN count(a) AS cnt")
            .param("article_id", article_id);

        let mut stream = self.client.graph.execute(q).await?;
        if let Some(row) = stream.next().await? {
            let count: i64 = row.get("cnt").unwrap_or(0);
            return Ok(count > 0);
        }
        Ok(false)
    }

    /// Fetch up to `limit` articles eligible for analysis, newest first:
    /// status `pending`, `failed_analysis`, or absent.
    pub async fn find_unanalyzed(&self, limit: usize) -> Result<Vec<Article>, neo4rs::Error> {
        let q = query(
            "MATCH (a:Article)
             WHERE a.processing_status IN ['pending', 'failed_analysis']
                OR a.processing_status IS NULL
             RETURN a
             ORDER BY a.scraped_at DESC
             LIMIT $limit",
        )
        .param("limit", limit as i64);

        let mut stream = self.client.graph.execute(q).await?;
        let mut articles = Vec::new();
        while let Some(row) = stream.next().await? {
            if let Some(article) = row_to_article(&row) {
                articles.push(article);
            }
        }
        Ok(articles)
    }

    /// Count articles by processing status; `None` counts everything.
    pub async fn count_by_status(
        &self,
        status: Option<ProcessingStatus>,
    ) -> Result<u64, neo4rs::Error> {
        let q = match status {
            Some(s) => query(
                "MATCH (a:Article)
                 WHERE coalesce(a.processing_status, 'pending') = $status
                 RETURN count(a) AS cnt",
            )
            .param("status", s.as_str()),
            None => query("MATCH (a:Article) RETURN count(a) AS cnt"),
        };

        let mut stream = self.client.graph.execute(q).await?;
        if let Some(row) = stream.next().await? {
            let count: i64 = row.get("cnt").unwrap_or(0);
            return Ok(count as u64);
        }
        Ok(0)
    }
}

fn row_to_article(row: &neo4rs::Row) -> Option<Article> {
    let n: neo4rs::Node = row.get("a").ok()?;

    let article_id: String = n.get("article_id").ok()?;

    let description: String = n.get("description").unwrap_or_default();
    let status_str: String = n.get("processing_status").unwrap_or_default();
    let analysis_json: String = n.get("ai_analysis").unwrap_or_default();
    let analysis: Option<AnalysisResponse> = if analysis_json.is_empty() {
        None
    } else {
        serde_json::from_str(&analysis_json).ok()
    };
    let analysis_model: String = n.get("analysis_model").unwrap_or_default();
    let content: String = n.get("content").unwrap_or_default();
    let word_count: i64 = n.get("word_count").unwrap_or(0);

    Some(Article {
        article_id,
        title: n.get("title").unwrap_or_default(),
        source: n.get("source").unwrap_or_default(),
        url: n.get("url").unwrap_or_default(),
        content,
        description: if description.is_empty() {
            None
        } else {
            Some(description)
        },
        published_at: parse_optional_datetime_prop(&n, "published_at"),
        scraped_at: parse_datetime_prop(&n, "scraped_at"),
        content_hash: n.get("content_hash").unwrap_or_default(),
        word_count: word_count as usize,
        content_embedding: embedding_prop(&n, "content_embedding"),
        title_embedding: embedding_prop(&n, "title_embedding"),
        analysis_embedding: embedding_prop(&n, "analysis_embedding"),
        processing_status: ProcessingStatus::parse(&status_str),
        analysis,
        analyzed_at: parse_optional_datetime_prop(&n, "analyzed_at"),
        analysis_model: if analysis_model.is_empty() {
            None
        } else {
            Some(analysis_model)
        },
    })
}

fn embedding_prop(n: &neo4rs::Node, prop: &str) -> Option<Vec<f32>> {
    let values: Vec<f64> = n.get(prop).ok()?;
    if values.is_empty() {
        return None;
    }
    Some(values.into_iter().map(|v| v as f32).collect())
}

fn parse_optional_datetime_prop(n: &neo4rs::Node, prop: &str) -> Option<DateTime<Utc>> {
    if let Ok(s) = n.get::<String>(prop) {
        if s.is_empty() {
            return None;
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(&s) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S%.f") {
            return Some(naive.and_utc());
        }
    }
    None
}

fn parse_datetime_prop(n: &neo4rs::Node, prop: &str) -> DateTime<Utc> {
    parse_optional_datetime_prop(n, prop).unwrap_or_else(Utc::now)
}
