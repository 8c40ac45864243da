//! Lexical embedder: hashed bag of words.
//!
//! Needs no model files. Texts sharing words land close together, which is
//! enough for pipeline tests and offline smoke runs; it has no notion of
//! synonyms.

use ndarray::Array1;

use crate::embedder::{EmbedderBackend, EmbeddingResult};

pub struct HashingEmbedder {
    dim: usize,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    fn bucket(&self, token: &str) -> usize {
        // FNV-1a
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in token.bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        (hash % self.dim as u64) as usize
    }
}

impl EmbedderBackend for HashingEmbedder {
    fn embed(&self, text: &str) -> Option<EmbeddingResult> {
        let mut v = Array1::<f32>::zeros(self.dim);
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            v[self.bucket(&token.to_lowercase())] += 1.0;
        }
        let norm = v.dot(&v).sqrt();
        if norm > 0.0 {
            v /= norm;
        }
        Some(EmbeddingResult { embedding: v })
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn is_available(&self) -> bool {
        true
    }

    fn model_name(&self) -> &str {
        "hashing-bow"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &Array1<f32>, b: &Array1<f32>) -> f32 {
        a.dot(b)
    }

    #[test]
    fn test_shared_words_score_higher() {
        let e = HashingEmbedder::new(384);
        let q = e.embed("total revenue in 2023").unwrap().embedding;
        let near = e.embed("Revenue in 2023 was $5M").unwrap().embedding;
        let far = e.embed("The office cat sleeps all day").unwrap().embedding;
        assert!(cosine(&q, &near) > cosine(&q, &far));
        assert_eq!(q.len(), 384);
    }

    #[test]
    fn test_case_insensitive_and_empty() {
        let e = HashingEmbedder::new(16);
        let a = e.embed("Chart").unwrap().embedding;
        let b = e.embed("chart").unwrap().embedding;
        assert_eq!(a, b);
        let empty = e.embed("").unwrap().embedding;
        assert!(empty.iter().all(|&x| x == 0.0));
    }
}
