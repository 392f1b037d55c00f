use log::{debug, info};
use serde::Serialize;

use crate::processing::Fingerprint;
use crate::types::FileRecord;

/// Similarity at or above which two documents are reported by default
pub const DEFAULT_NEAR_THRESHOLD: f64 = 0.85;

/// Two documents whose fingerprints are close. Advisory only.
#[derive(Debug, Clone, Serialize)]
pub struct NearDuplicatePair {
    pub first: FileRecord,
    pub second: FileRecord,
    pub similarity: f64,
}

/// All-pairs fingerprint comparison over extracted text
pub struct FingerprintIndex {
    threshold: f64,
}

impl Default for FingerprintIndex {
    fn default() -> Self {
        Self::new(DEFAULT_NEAR_THRESHOLD)
    }
}

impl FingerprintIndex {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 1.0),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Compare every pair of documents with non-empty text.
    ///
    /// Documents are ordered by path first, so `first` always sorts before
    /// `second` and the output order is stable.
    pub fn find_near_duplicates<I>(&self, documents: I) -> Vec<NearDuplicatePair>
    where
        I: IntoIterator<Item = (FileRecord, String)>,
    {
        let mut fingerprinted: Vec<(FileRecord, Fingerprint)> = documents
            .into_iter()
            .filter_map(|(record, text)| Fingerprint::from_text(&text).map(|fp| (record, fp)))
            .collect();
        fingerprinted.sort_by(|a, b| a.0.path.as_os_str().cmp(b.0.path.as_os_str()));

        let mut pairs = Vec::new();
        for (i, (first, fp_a)) in fingerprinted.iter().enumerate() {
            for (second, fp_b) in &fingerprinted[i + 1..] {
                let similarity = fp_a.similarity(fp_b);
                if similarity >= self.threshold {
                    debug!(
                        "Near duplicate {:.3}: {} ~ {}",
                        similarity,
                        first.path.display(),
                        second.path.display()
                    );
                    pairs.push(NearDuplicatePair {
                        first: first.clone(),
                        second: second.clone(),
                        similarity,
                    });
                }
            }
        }

        info!(
            "Compared {} documents, {} near-duplicate pairs at >= {:.2}",
            fingerprinted.len(),
            pairs.len(),
            self.threshold
        );
        pairs
    }
}
