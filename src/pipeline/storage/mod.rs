pub mod types;
pub mod chunker;
pub mod embedder;
pub mod plan_store;
pub mod index;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Embedding model not found: {0}")]
    ModelNotFound(PathBuf),

    #[error("Embedding model initialization: {0}")]
    ModelInit(String),

    #[error("Tokenization error: {0}")]
    Tokenization(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    /// Another index build holds the lock on this directory.
    #[error("Index build already running (lock held on {0})")]
    LockHeld(PathBuf),

    #[error("Atomic replace of {path} failed: {reason}")]
    Persist { path: PathBuf, reason: String },

    #[error("No normalized plans to index")]
    EmptyCorpus,
}
