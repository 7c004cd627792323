pub mod lexical;
pub mod vector;
pub mod fusion;
pub mod retrieval;

pub use fusion::fuse;
pub use lexical::{lexical_search, LexicalIndex};
pub use retrieval::{HybridRetriever, RetrievalOutcome};
pub use vector::{vector_search, VectorIndex};

use thiserror::Error;

use crate::pipeline::storage::StorageError;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Index corrupt: {0}")]
    IndexCorrupt(String),

    #[error("Vector dimension mismatch: index {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}
