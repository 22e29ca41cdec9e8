use neo4rs::query;
use tracing::info;

use crate::StoreClient;

/// Run idempotent schema migrations: constraints, indexes.
///
/// The uniqueness constraint on `article_id` is load-bearing, not an
/// optimization: the fetch stage's duplicate check races with concurrent
/// inserts, and the constraint is what makes the second insert fail safely.
pub async fn migrate(client: &StoreClient) -> Result<(), neo4rs::Error> {
    let statements = [
        "CREATE CONSTRAINT article_id_unique IF NOT EXISTS \
         FOR (a:Article) REQUIRE a.article_id IS UNIQUE",
        "CREATE INDEX article_status IF NOT EXISTS \
         FOR (a:Article) ON (a.processing_status)",
        "CREATE INDEX article_published_at IF NOT EXISTS \
         FOR (a:Article) ON (a.published_at)",
        "CREATE INDEX article_scraped_at IF NOT EXISTS \
         FOR (a:Article) ON (a.scraped_at)",
        "CREATE INDEX article_bias_score IF NOT EXISTS \
         FOR (a:Article) ON (a.bias_score)",
        "CREATE INDEX article_misinformation_risk IF NOT EXISTS \
         FOR (a:Article) ON (a.misinformation_risk)",
        "CREATE INDEX article_credibility_score IF NOT EXISTS \
         FOR (a:Article) ON (a.credibility_score)",
    ];

    for statement in &statements {
        client.graph.run(query(statement)).await?;
    }

    info!("Article constraints and indexes ensured");
    Ok(())
}
