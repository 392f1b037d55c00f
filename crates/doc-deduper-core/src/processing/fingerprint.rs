//! 64-bit SimHash over whitespace-separated tokens.
//!
//! Each token is digested with MD5; the top 64 bits of the digest vote on the
//! matching output bit (+1 for a set bit, -1 otherwise) and an output bit is set
//! when its tally is non-negative. Token order does not matter.

pub const FINGERPRINT_BITS: u32 = 64;

/// Fingerprint of one document's extracted text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(pub u64);

impl Fingerprint {
    /// Returns `None` for text without a single token
    pub fn from_text(text: &str) -> Option<Self> {
        let mut tally = [0i64; FINGERPRINT_BITS as usize];
        let mut tokens = 0usize;

        for token in text.split_whitespace() {
            tokens += 1;
            let digest = md5::compute(token.as_bytes());
            for (bit, votes) in tally.iter_mut().enumerate() {
                let byte = digest.0[bit / 8];
                if (byte >> (7 - bit % 8)) & 1 == 1 {
                    *votes += 1;
                } else {
                    *votes -= 1;
                }
            }
        }

        if tokens == 0 {
            return None;
        }

        let mut value = 0u64;
        for (bit, votes) in tally.iter().enumerate() {
            if *votes >= 0 {
                value |= 1 << (FINGERPRINT_BITS as usize - 1 - bit);
            }
        }
        Some(Self(value))
    }

    pub fn hamming_distance(&self, other: &Fingerprint) -> u32 {
        (self.0 ^ other.0).count_ones()
    }

    /// `1 - hamming / 64`, always within [0, 1]
    pub fn similarity(&self, other: &Fingerprint) -> f64 {
        1.0 - self.hamming_distance(other) as f64 / FINGERPRINT_BITS as f64
    }
}
