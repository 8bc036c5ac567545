//! News ingestion: near-duplicate filtering, persistence, and fan-out.

use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::broadcast::{BroadcastEvent, BroadcastHub};
use crate::dedup::{DedupOutcome, Deduplicator};
use crate::db::{NewsArticle, NewsStore, PersistenceError};
use crate::TARGET_DEDUP;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IngestSummary {
    pub received: usize,
    pub unique: usize,
    pub duplicates: usize,
    pub failed: usize,
}

pub struct NewsAgent {
    dedup: Arc<Deduplicator>,
    store: Arc<dyn NewsStore>,
    hub: Arc<BroadcastHub>,
}

impl NewsAgent {
    pub fn new(dedup: Arc<Deduplicator>, store: Arc<dyn NewsStore>, hub: Arc<BroadcastHub>) -> Self {
        Self { dedup, store, hub }
    }

    /// Rebuilds the rolling dedup index from persisted records still inside
    /// the check window. Run once at startup, before the first ingest.
    pub async fn restore_index(&self) -> Result<usize, PersistenceError> {
        let cutoff = Utc::now() - Duration::days(self.dedup.config().check_window_days);
        let records = self.store.dedup_records_since(cutoff).await?;
        let restored = records.len();
        for record in records {
            self.dedup.restore(record);
        }
        Ok(restored)
    }

    /// Ingests a batch of articles. Duplicates within the rolling window are
    /// counted and skipped; unique articles are persisted and announced.
    /// A failed write skips the broadcast for that article only.
    pub async fn ingest(&self, articles: Vec<NewsArticle>) -> IngestSummary {
        let mut summary = IngestSummary {
            received: articles.len(),
            ..IngestSummary::default()
        };

        for article in articles {
            let text = normalize_text(&article.title, &article.summary);
            match self.dedup.check(&article.id, &text) {
                DedupOutcome::Duplicate { of, similarity } => {
                    debug!(
                        target: TARGET_DEDUP,
                        "Skipping article {} (duplicate of {}, similarity {:.3})",
                        article.id, of, similarity
                    );
                    summary.duplicates += 1;
                    continue;
                }
                DedupOutcome::Unique => {}
            }

            match self.store.add_article(&article).await {
                Ok(_) => {
                    // The signature row is what lets the index survive a
                    // restart; losing one is tolerable, so the failure is
                    // only logged.
                    if let Some(record) = self.dedup.record(&article.id) {
                        if let Err(err) = self.store.add_dedup_record(&record).await {
                            warn!(
                                target: TARGET_DEDUP,
                                "Failed to persist dedup record {}: {}", article.id, err
                            );
                        }
                    }
                    summary.unique += 1;
                    self.hub.broadcast(BroadcastEvent::NewsUpdate { article });
                }
                Err(err) => {
                    warn!(target: TARGET_DEDUP, "Failed to store article {}: {}", article.id, err);
                    summary.failed += 1;
                }
            }
        }

        info!(
            target: TARGET_DEDUP,
            "Ingested {} articles: {} unique, {} duplicates, {} failed",
            summary.received, summary.unique, summary.duplicates, summary.failed
        );
        summary
    }
}

/// Collapses title and summary into the text the deduplicator compares:
/// lowercased, whitespace-normalized.
fn normalize_text(title: &str, summary: &str) -> String {
    format!("{} {}", title, summary)
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::SubscriptionFilter;
    use crate::db::{MemoryStore, NewsCategory};
    use chrono::Utc;

    fn article(id: &str, title: &str, summary: &str) -> NewsArticle {
        NewsArticle {
            id: id.to_string(),
            title: title.to_string(),
            summary: summary.to_string(),
            category: NewsCategory::Injuries,
            published_at: Utc::now(),
            url: format!("https://news.example/{}", id),
            team_id: Some("NBA_LAL".to_string()),
        }
    }

    fn agent() -> (NewsAgent, Arc<MemoryStore>, Arc<BroadcastHub>) {
        let store = Arc::new(MemoryStore::new());
        let hub = Arc::new(BroadcastHub::new());
        let dedup = Arc::new(Deduplicator::new(Default::default()));
        (
            NewsAgent::new(dedup, Arc::clone(&store) as Arc<dyn NewsStore>, Arc::clone(&hub)),
            store,
            hub,
        )
    }

    #[tokio::test]
    async fn near_duplicates_are_skipped() {
        let (agent, store, _hub) = agent();

        let summary = agent
            .ingest(vec![
                article("a1", "Star guard out six weeks", "MRI revealed a sprained ankle."),
                article("a2", "Star guard out six weeks", "MRI revealed a sprained ankle!"),
                article("a3", "Closer signs with division rival", "Two-year deal announced."),
            ])
            .await;

        assert_eq!(summary.received, 3);
        assert_eq!(summary.unique, 2);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(store.article_count(), 2);
        // One signature row per unique article, none for the duplicate.
        assert_eq!(store.dedup_record_count(), 2);
    }

    #[tokio::test]
    async fn dedup_index_survives_a_restart() {
        let store = Arc::new(MemoryStore::new());
        let hub = Arc::new(BroadcastHub::new());

        let first = NewsAgent::new(
            Arc::new(Deduplicator::new(Default::default())),
            Arc::clone(&store) as Arc<dyn NewsStore>,
            Arc::clone(&hub),
        );
        first
            .ingest(vec![article("a1", "Star guard out six weeks", "MRI revealed a sprained ankle.")])
            .await;
        assert_eq!(store.dedup_record_count(), 1);

        // A fresh process starts with an empty index and rebuilds it from
        // the store.
        let second = NewsAgent::new(
            Arc::new(Deduplicator::new(Default::default())),
            Arc::clone(&store) as Arc<dyn NewsStore>,
            hub,
        );
        assert_eq!(second.restore_index().await.unwrap(), 1);

        let summary = second
            .ingest(vec![article("a2", "Star guard out six weeks", "MRI revealed a sprained ankle.")])
            .await;
        assert_eq!(summary.duplicates, 1);
    }

    #[tokio::test]
    async fn unique_articles_are_broadcast() {
        let (agent, _store, hub) = agent();
        let (conn, mut rx) = hub.register();
        hub.subscribe(conn, SubscriptionFilter::team("NBA_LAL"));
        while rx.try_recv().is_ok() {}

        agent
            .ingest(vec![article("a1", "Trade talks heating up", "Front office listening to offers.")])
            .await;

        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn text_normalization_collapses_whitespace_and_case() {
        assert_eq!(
            normalize_text("Star  Guard", "Out\nSix Weeks"),
            "star guard out six weeks"
        );
    }
}
