//! Brute-force cosine ranking over the in-memory store.

use std::cmp::Ordering;

use serde::Serialize;

use crate::embeddings::EmbeddingRecord;
use crate::error::{Result, RetrievalError};

/// Default number of chunks kept per query.
pub const DEFAULT_TOP_K: usize = 3;

/// Stored chunk annotated with its similarity to one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    /// Provenance label of the chunk.
    pub source: String,
    /// Chunk text.
    pub text: String,
    /// Cosine similarity against the query (`NaN` for zero vectors).
    pub score: f32,
}

/// Cosine of the angle between `a` and `b`.
///
/// Returns `NaN` when either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(RetrievalError::DimensionMismatch {
            expected: b.len(),
            actual: a.len(),
        });
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return Ok(f32::NAN);
    }
    Ok((dot / denom) as f32)
}

/// Scores every record against `query` and keeps the best `top_k`.
///
/// Ordering is by descending score; equal scores keep record order and `NaN`
/// scores sort last.
pub fn rank(query: &[f32], records: &[EmbeddingRecord], top_k: usize) -> Result<Vec<ScoredChunk>> {
    if top_k == 0 {
        return Ok(Vec::new());
    }
    let mut scored = Vec::with_capacity(records.len());
    for (idx, record) in records.iter().enumerate() {
        scored.push((idx, cosine_similarity(query, &record.embedding)?));
    }
    scored.sort_by(|a, b| compare_scores(a.1, b.1));
    scored.truncate(top_k);
    Ok(scored
        .into_iter()
        .map(|(idx, score)| ScoredChunk {
            source: records[idx].source.clone(),
            text: records[idx].text.clone(),
            score,
        })
        .collect())
}

fn compare_scores(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}
