//! Rolling near-duplicate detection over recently ingested content.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::debug;

use super::minhash::MinHashSignature;
use crate::TARGET_DEDUP;

#[derive(Debug, Clone)]
pub struct DedupConfig {
    pub similarity_threshold: f64,
    pub check_window_days: i64,
    pub shingle_size: usize,
    pub num_hashes: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.85,
            check_window_days: 7,
            shingle_size: 3,
            num_hashes: 128,
        }
    }
}

/// A content id associated with its signature and ingestion time.
#[derive(Debug, Clone)]
pub struct DedupRecord {
    pub content_id: String,
    pub signature: MinHashSignature,
    pub ingested_at: DateTime<Utc>,
}

/// Classification of a piece of content against the rolling index.
/// A duplicate is not an error; callers skip the content and move on.
#[derive(Debug, Clone, PartialEq)]
pub enum DedupOutcome {
    Unique,
    Duplicate { of: String, similarity: f64 },
}

/// Wraps MinHash with the configured threshold and a rolling index of recent
/// signatures. Records older than the check window are not consulted and are
/// purged by maintenance.
pub struct Deduplicator {
    config: DedupConfig,
    records: DashMap<String, DedupRecord>,
}

impl Deduplicator {
    pub fn new(config: DedupConfig) -> Self {
        Self {
            config,
            records: DashMap::new(),
        }
    }

    pub fn config(&self) -> &DedupConfig {
        &self.config
    }

    pub fn signature_for(&self, text: &str) -> MinHashSignature {
        MinHashSignature::generate(text, self.config.shingle_size, self.config.num_hashes)
    }

    /// Classifies `text` against every record inside the window. Unique
    /// content is added to the index under `content_id`.
    pub fn check(&self, content_id: &str, text: &str) -> DedupOutcome {
        self.check_at(content_id, text, Utc::now())
    }

    pub fn check_at(&self, content_id: &str, text: &str, now: DateTime<Utc>) -> DedupOutcome {
        let signature = self.signature_for(text);
        let cutoff = now - Duration::days(self.config.check_window_days);

        let mut best: Option<(String, f64)> = None;
        for record in self.records.iter() {
            if record.ingested_at < cutoff || record.content_id == content_id {
                continue;
            }
            // Signatures in the index share this instance's configuration,
            // so a length mismatch cannot occur here.
            let Ok(similarity) = signature.similarity(&record.signature) else {
                continue;
            };
            if similarity >= self.config.similarity_threshold
                && best.as_ref().map(|(_, s)| similarity > *s).unwrap_or(true)
            {
                best = Some((record.content_id.clone(), similarity));
            }
        }

        match best {
            Some((of, similarity)) => {
                debug!(
                    target: TARGET_DEDUP,
                    "Content {} is a duplicate of {} (similarity {:.3})", content_id, of, similarity
                );
                DedupOutcome::Duplicate { of, similarity }
            }
            None => {
                self.records.insert(
                    content_id.to_string(),
                    DedupRecord {
                        content_id: content_id.to_string(),
                        signature,
                        ingested_at: now,
                    },
                );
                DedupOutcome::Unique
            }
        }
    }

    /// The indexed record for a content id, if present.
    pub fn record(&self, content_id: &str) -> Option<DedupRecord> {
        self.records.get(content_id).map(|r| r.clone())
    }

    /// Re-adds a previously persisted record, e.g. when rebuilding the index
    /// at startup.
    pub fn restore(&self, record: DedupRecord) {
        self.records.insert(record.content_id.clone(), record);
    }

    /// Drops records older than the check window. Returns how many were
    /// removed.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now())
    }

    pub fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - Duration::days(self.config.check_window_days);
        let before = self.records.len();
        self.records.retain(|_, record| record.ingested_at >= cutoff);
        before - self.records.len()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
