use serde::{Deserialize, Serialize};

use super::enums::Program;

/// A short, citable text snippet for one course. Identity is `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub program: Program,
    pub text: String,
    pub source_ref: String,
    pub source_url: String,
}

/// A chunk scored by one or both retrieval signals. Query-scoped, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub chunk: Chunk,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lexical_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_distance: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fused_score: Option<f64>,
}

impl SearchHit {
    pub fn lexical(chunk: Chunk, score: f64) -> Self {
        Self {
            chunk,
            lexical_score: Some(score),
            vector_distance: None,
            fused_score: None,
        }
    }

    pub fn vector(chunk: Chunk, distance: f32) -> Self {
        Self {
            chunk,
            lexical_score: None,
            vector_distance: Some(distance),
            fused_score: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.chunk.id
    }
}
