//! Near-duplicate detection for ingested text content.

mod minhash;
mod service;

pub use self::minhash::{MinHashSignature, SignatureError, EMPTY_SLOT};
pub use self::service::{DedupConfig, DedupOutcome, DedupRecord, Deduplicator};
