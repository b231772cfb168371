use std::fs;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::StoreError;

/// Turns text into an embedding vector. Implemented over the embedding
/// endpoint in production and by fixed-vector fakes in tests.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;
}

/// One pre-embedded document: the text that was embedded, its vector,
/// and whatever metadata the index build attached (product indexes carry
/// a `product_name` key).
#[derive(Clone, Debug, Deserialize)]
pub struct VectorRecord {
    pub document: String,
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

#[derive(Clone, Debug)]
pub struct SimilarityHit<'a> {
    pub record: &'a VectorRecord,
    pub score: f32,
}

impl SimilarityHit<'_> {
    pub fn document(&self) -> &str {
        &self.record.document
    }

    pub fn product_name(&self) -> Option<&str> {
        self.record.metadata.get("product_name").and_then(Value::as_str)
    }
}

/// Read-only similarity index, loaded once at startup from a JSON array
/// of records. Like the catalog, an empty index is a degraded state the
/// tools answer around rather than an error.
#[derive(Clone, Debug, Default)]
pub struct VectorIndex {
    records: Vec<VectorRecord>,
}

impl VectorIndex {
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let raw = fs::read(path)
            .map_err(|source| StoreError::ReadFile { path: path.to_path_buf(), source })?;
        let records: Vec<VectorRecord> = serde_json::from_slice(&raw)
            .map_err(|source| StoreError::ParseFile { path: path.to_path_buf(), source })?;
        Ok(Self { records })
    }

    pub fn from_records(records: Vec<VectorRecord>) -> Self {
        Self { records }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// The `k` records nearest to `query` by cosine similarity, best
    /// first. Records whose vector length disagrees with the query are
    /// skipped rather than scored.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<SimilarityHit<'_>> {
        let mut hits: Vec<SimilarityHit<'_>> = self
            .records
            .iter()
            .filter(|record| record.embedding.len() == query.len())
            .map(|record| SimilarityHit { record, score: cosine_similarity(query, &record.embedding) })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(k);
        hits
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
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
