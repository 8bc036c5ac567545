//! MinHash signatures over shingled text.

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Sentinel slot value for hash functions that saw no shingles.
pub const EMPTY_SLOT: u64 = u64::MAX;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature length mismatch: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },
    #[error("malformed serialized signature")]
    Malformed,
}

/// A fixed-length sequence of minimum hash values. The length is always
/// exactly the configured number of hash functions, regardless of input
/// length; empty input yields a signature of sentinel values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinHashSignature {
    slots: Vec<u64>,
}

impl MinHashSignature {
    /// Generates the signature for `text` using overlapping character
    /// shingles of `shingle_size` and `num_hashes` hash functions.
    ///
    /// The hash family is derived by double hashing: one SHA-256 digest per
    /// shingle supplies two 64-bit values, and function `i` is
    /// `h1 + i * h2`.
    pub fn generate(text: &str, shingle_size: usize, num_hashes: usize) -> Self {
        let mut slots = vec![EMPTY_SLOT; num_hashes];
        let chars: Vec<char> = text.chars().collect();

        if shingle_size > 0 && chars.len() >= shingle_size {
            for window in chars.windows(shingle_size) {
                let shingle: String = window.iter().collect();
                let digest = Sha256::digest(shingle.as_bytes());
                let h1 = u64::from_be_bytes(digest[0..8].try_into().expect("digest width"));
                // Forcing the stride odd keeps the derived functions distinct.
                let h2 = u64::from_be_bytes(digest[8..16].try_into().expect("digest width")) | 1;

                for (i, slot) in slots.iter_mut().enumerate() {
                    let h = h1.wrapping_add((i as u64).wrapping_mul(h2));
                    if h < *slot {
                        *slot = h;
                    }
                }
            }
        }

        Self { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Estimated Jaccard similarity: the fraction of hash slots that agree.
    /// Always in [0, 1]; identical inputs give exactly 1.0.
    pub fn similarity(&self, other: &MinHashSignature) -> Result<f64, SignatureError> {
        if self.slots.len() != other.slots.len() {
            return Err(SignatureError::LengthMismatch {
                left: self.slots.len(),
                right: other.slots.len(),
            });
        }
        if self.slots.is_empty() {
            return Ok(1.0);
        }

        let agreeing = self
            .slots
            .iter()
            .zip(other.slots.iter())
            .filter(|(a, b)| a == b)
            .count();
        Ok(agreeing as f64 / self.slots.len() as f64)
    }

    /// Whether the estimated similarity reaches `threshold`.
    pub fn is_duplicate(
        &self,
        other: &MinHashSignature,
        threshold: f64,
    ) -> Result<bool, SignatureError> {
        Ok(self.similarity(other)? >= threshold)
    }

    /// Compact string representation: fixed-width hex, one 16-character
    /// chunk per slot.
    pub fn serialize(&self) -> String {
        let mut out = String::with_capacity(self.slots.len() * 16);
        for slot in &self.slots {
            out.push_str(&format!("{:016x}", slot));
        }
        out
    }

    pub fn deserialize(serialized: &str) -> Result<Self, SignatureError> {
        if serialized.len() % 16 != 0 {
            return Err(SignatureError::Malformed);
        }
        let slots = serialized
            .as_bytes()
            .chunks(16)
            .map(|chunk| {
                std::str::from_utf8(chunk)
                    .ok()
                    .and_then(|s| u64::from_str_radix(s, 16).ok())
                    .ok_or(SignatureError::Malformed)
            })
            .collect::<Result<Vec<u64>, _>>()?;
        Ok(Self { slots })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHINGLE: usize = 3;
    const HASHES: usize = 128;

    #[test]
    fn identical_texts_have_similarity_one() {
        let text = "Lakers beat Celtics 102-99 in overtime thriller";
        let a = MinHashSignature::generate(text, SHINGLE, HASHES);
        let b = MinHashSignature::generate(text, SHINGLE, HASHES);
        assert_eq!(a.similarity(&b).unwrap(), 1.0);
    }

    #[test]
    fn similarity_is_bounded() {
        let a = MinHashSignature::generate("completely different text about hockey", SHINGLE, HASHES);
        let b = MinHashSignature::generate("unrelated story on baseball trades", SHINGLE, HASHES);
        let s = a.similarity(&b).unwrap();
        assert!((0.0..=1.0).contains(&s));
    }

    #[test]
    fn near_duplicates_score_higher_than_unrelated() {
        let base = "Star forward questionable for Friday after ankle sprain in practice";
        let near = "Star forward questionable for Friday after ankle sprain in practise";
        let far = "Pitching rotation announced ahead of opening day";

        let sig_base = MinHashSignature::generate(base, SHINGLE, HASHES);
        let sig_near = MinHashSignature::generate(near, SHINGLE, HASHES);
        let sig_far = MinHashSignature::generate(far, SHINGLE, HASHES);

        assert!(
            sig_base.similarity(&sig_near).unwrap() > sig_base.similarity(&sig_far).unwrap()
        );
    }

    #[test]
    fn empty_text_yields_full_length_sentinel_signature() {
        let sig = MinHashSignature::generate("", SHINGLE, HASHES);
        assert_eq!(sig.len(), HASHES);
        // And similarity against itself is still defined.
        assert_eq!(sig.similarity(&sig).unwrap(), 1.0);
    }

    #[test]
    fn text_shorter_than_shingle_yields_sentinel_signature() {
        let sig = MinHashSignature::generate("ab", SHINGLE, HASHES);
        assert_eq!(sig.len(), HASHES);
    }

    #[test]
    fn round_trip_preserves_similarity() {
        let sig = MinHashSignature::generate("Trade deadline moves shake up the East", SHINGLE, HASHES);
        let restored = MinHashSignature::deserialize(&sig.serialize()).unwrap();
        assert_eq!(sig.similarity(&restored).unwrap(), 1.0);
    }

    #[test]
    fn deserialize_rejects_garbage() {
        assert_eq!(
            MinHashSignature::deserialize("abc"),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            MinHashSignature::deserialize("zzzzzzzzzzzzzzzz"),
            Err(SignatureError::Malformed)
        );
    }

    #[test]
    fn threshold_is_monotonic() {
        let a = MinHashSignature::generate("Guard out two weeks with hamstring strain", SHINGLE, HASHES);
        let b = MinHashSignature::generate("Guard out two weeks with a hamstring strain", SHINGLE, HASHES);

        for t1 in [0.95, 0.85, 0.6, 0.3] {
            if a.is_duplicate(&b, t1).unwrap() {
                for t2 in [0.2, 0.1, 0.0] {
                    assert!(t2 >= t1 || a.is_duplicate(&b, t2).unwrap());
                }
            }
        }
    }

    #[test]
    fn mismatched_lengths_are_an_error() {
        let a = MinHashSignature::generate("text", SHINGLE, 64);
        let b = MinHashSignature::generate("text", SHINGLE, 128);
        assert!(matches!(
            a.similarity(&b),
            Err(SignatureError::LengthMismatch { .. })
        ));
    }
}
