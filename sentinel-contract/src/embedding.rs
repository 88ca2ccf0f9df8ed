// sentinel-contract/src/embedding.rs
// ============================================================================
// Module: Sentinel Embedding Model
// Description: The embedding row and similarity-search request/result types
// (§3 "Embedding", §4.4).
// Purpose: Shared vocabulary between the embedding store trait and its two
// backend implementations.
// Dependencies: sentinel-core, serde
// ============================================================================

use sentinel_core::EmbeddingId;
use sentinel_core::Instant;
use sentinel_core::TenantId;
use serde::Deserialize;
use serde::Serialize;

/// What an embedding was computed from (§3 "Embedding").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// Embedding of an event's content.
    Event,
    /// Embedding of a session summary.
    Session,
    /// Embedding of a derived "lesson" artifact.
    Lesson,
}

/// A persisted embedding row (§3 "Embedding").
///
/// # Invariants
/// - At most one row exists per (tenant, source_type, source_id) (§8
///   property 4); storing the same tuple again updates the existing row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    /// Embedding identifier.
    pub id: EmbeddingId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Source kind.
    pub source_type: SourceType,
    /// Identifier of the source row within its own table.
    pub source_id: String,
    /// SHA-256 hash of `text`, used to detect unchanged re-stores cheaply.
    pub content_hash: String,
    /// The text the embedding was computed from.
    pub text: String,
    /// The raw embedding vector.
    pub vector: Vec<f32>,
    /// Name of the embedding model used.
    pub model: String,
    /// Dimensionality of `vector`.
    pub dimensions: u32,
    /// Creation instant (updated to the latest store call).
    pub created_at: Instant,
}

/// Filters accepted by `similaritySearch` (§4.4).
#[derive(Debug, Clone, Default)]
pub struct SimilarityFilter {
    /// Restrict to a single source type.
    pub source_type: Option<SourceType>,
    /// Lower `created_at` bound (inclusive).
    pub from: Option<Instant>,
    /// Upper `created_at` bound (exclusive).
    pub to: Option<Instant>,
    /// Maximum rows to return. Defaults to 10 (§4.4).
    pub limit: Option<u32>,
    /// Minimum cosine similarity to include. Defaults to 0.0.
    pub min_score: Option<f32>,
}

impl SimilarityFilter {
    /// Effective row limit, defaulting to 10 (§4.4).
    #[must_use]
    pub fn effective_limit(&self) -> u32 {
        self.limit.unwrap_or(10)
    }

    /// Effective minimum score, defaulting to 0.0 (§4.4).
    #[must_use]
    pub fn effective_min_score(&self) -> f32 {
        self.min_score.unwrap_or(0.0)
    }
}

/// A single similarity search result (§4.4).
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatch {
    /// The matched embedding row.
    pub embedding: Embedding,
    /// Cosine similarity to the query vector, in [-1, 1].
    pub score: f32,
}

/// Computes cosine similarity between two vectors (§4.4). Returns `0.0`
/// when either vector has zero norm (§8 boundary: "Cosine similarity on a
/// zero vector: returns score 0").
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0_f32;
    let mut norm_a = 0.0_f32;
    let mut norm_b = 0.0_f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Encodes a vector as a little-endian float32 blob (§4.4 "raw vectors
/// (little-endian float32 blob)").
#[must_use]
pub fn encode_vector(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Decodes a little-endian float32 blob back into a vector.
#[must_use]
pub fn decode_vector(bytes: &[u8]) -> Vec<f32> {
    bytes.chunks_exact(4).map(|chunk| {
        let mut buf = [0_u8; 4];
        buf.copy_from_slice(chunk);
        f32::from_le_bytes(buf)
    }).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_similarity_of_identical_vectors_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        let score = cosine_similarity(&v, &v);
        assert!((score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_of_zero_vector_is_zero() {
        let zero = vec![0.0, 0.0, 0.0];
        let other = vec![1.0, 2.0, 3.0];
        assert_eq!(cosine_similarity(&zero, &other), 0.0);
    }

    #[test]
    fn vector_encoding_round_trips() {
        let original = vec![1.5_f32, -2.25, 0.0, 3.0];
        let encoded = encode_vector(&original);
        let decoded = decode_vector(&encoded);
        assert_eq!(original, decoded);
    }
}
