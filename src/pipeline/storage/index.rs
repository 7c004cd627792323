//! Search index artifacts under `index/`.
//!
//! A build writes `chunks.json`, `lexical.json`, `vectors.json` and finally
//! `manifest.json`, each replaced atomically, while holding an exclusive
//! lock on `index/.build.lock`. Readers take no lock: a query racing a
//! rebuild may mix old and new files. Rebuilds are rare offline batch
//! jobs and that window is accepted.

use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use super::chunker::build_chunks;
use super::plan_store::write_atomic;
use super::types::EmbeddingModel;
use super::StorageError;
use crate::models::{Chunk, Plan, Program};
use crate::pipeline::rag::{LexicalIndex, VectorIndex};

pub const CHUNKS_FILE: &str = "chunks.json";
pub const LEXICAL_FILE: &str = "lexical.json";
pub const VECTORS_FILE: &str = "vectors.json";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const LOCK_FILE: &str = ".build.lock";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub built_at: DateTime<Utc>,
    pub chunk_count: usize,
    pub programs: Vec<Program>,
    /// Embedding provider label; `None` when the vector index was skipped.
    pub provider: Option<String>,
    pub dimension: usize,
    /// SHA-256 of `chunks.json`.
    pub corpus_sha256: String,
}

/// Whatever could be read back from `index/`.
#[derive(Debug, Default)]
pub struct IndexArtifacts {
    pub chunks: Vec<Chunk>,
    pub lexical: Option<LexicalIndex>,
    pub vectors: Option<VectorIndex>,
    pub manifest: Option<IndexManifest>,
}

/// Rebuild every index artifact from the given plans.
///
/// Fails fast with `LockHeld` if another build owns the directory.
/// Embedding failures drop the vector index (lexical search still works).
pub fn build_index(
    index_dir: &Path,
    plans: &[Plan],
    embedder: &dyn EmbeddingModel,
) -> Result<IndexManifest, StorageError> {
    std::fs::create_dir_all(index_dir)?;
    let lock_path = index_dir.join(LOCK_FILE);
    let lock_file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)?;
    let mut lock = fd_lock::RwLock::new(lock_file);
    let _guard = match lock.try_write() {
        Ok(guard) => guard,
        Err(e) if e.kind() == ErrorKind::WouldBlock => {
            return Err(StorageError::LockHeld(lock_path));
        }
        Err(e) => return Err(e.into()),
    };

    let chunks: Vec<Chunk> = plans.iter().flat_map(build_chunks).collect();
    if chunks.is_empty() {
        return Err(StorageError::EmptyCorpus);
    }

    let chunks_json = serde_json::to_vec_pretty(&chunks)?;
    let corpus_sha256 = format!("{:x}", Sha256::digest(&chunks_json));
    write_atomic(&index_dir.join(CHUNKS_FILE), &chunks_json)?;

    let lexical = LexicalIndex::build(&chunks);
    write_atomic(&index_dir.join(LEXICAL_FILE), &serde_json::to_vec(&lexical)?)?;

    let vectors_path = index_dir.join(VECTORS_FILE);
    let (provider, dimension) = match embed_chunks(&chunks, embedder) {
        Some(index) => {
            write_atomic(&vectors_path, &serde_json::to_vec(&index)?)?;
            (Some(embedder.provider().to_string()), index.dimension())
        }
        None => {
            // A stale vectors.json would no longer line up with chunks.json.
            if vectors_path.exists() {
                std::fs::remove_file(&vectors_path)?;
            }
            (None, 0)
        }
    };

    let mut programs: Vec<Program> = plans.iter().map(|p| p.program).collect();
    programs.sort();
    programs.dedup();

    let manifest = IndexManifest {
        built_at: Utc::now(),
        chunk_count: chunks.len(),
        programs,
        provider,
        dimension,
        corpus_sha256,
    };
    write_atomic(&index_dir.join(MANIFEST_FILE), &serde_json::to_vec_pretty(&manifest)?)?;

    info!(
        chunks = manifest.chunk_count,
        dimension = manifest.dimension,
        provider = manifest.provider.as_deref().unwrap_or("none"),
        "Index built"
    );
    Ok(manifest)
}

/// Embed all chunk texts; batch first, then one by one if the batch fails.
fn embed_chunks(chunks: &[Chunk], embedder: &dyn EmbeddingModel) -> Option<VectorIndex> {
    let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();

    let vectors = match embedder.embed_batch(&texts) {
        Ok(vectors) if vectors.len() == texts.len() => vectors,
        Ok(vectors) => {
            warn!(got = vectors.len(), expected = texts.len(), "Batch embedding count mismatch");
            embed_individually(&texts, embedder)?
        }
        Err(e) => {
            warn!(error = %e, "Batch embedding failed, retrying one at a time");
            embed_individually(&texts, embedder)?
        }
    };

    let dimension = vectors.first().map_or(0, |v| v.len());
    match VectorIndex::new(dimension, vectors) {
        Ok(index) => Some(index),
        Err(e) => {
            warn!(error = %e, "Embeddings unusable, vector index skipped");
            None
        }
    }
}

fn embed_individually(texts: &[&str], embedder: &dyn EmbeddingModel) -> Option<Vec<Vec<f32>>> {
    let mut vectors = Vec::with_capacity(texts.len());
    for (idx, text) in texts.iter().enumerate() {
        match embedder.embed(text) {
            Ok(v) => vectors.push(v),
            Err(e) => {
                warn!(chunk = idx, error = %e, "Embedding failed, vector index skipped");
                return None;
            }
        }
    }
    Some(vectors)
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Option<T> {
    let bytes = std::fs::read(path).ok()?;
    match serde_json::from_slice(&bytes) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Unreadable index file ignored");
            None
        }
    }
}

/// Read back whatever artifacts exist. Missing or unreadable pieces are
/// `None`; pieces that do not line up with `chunks.json` are dropped.
pub fn load_index(index_dir: &Path) -> IndexArtifacts {
    let chunks: Vec<Chunk> = read_json(&index_dir.join(CHUNKS_FILE)).unwrap_or_default();

    let lexical = read_json::<LexicalIndex>(&index_dir.join(LEXICAL_FILE))
        .filter(|l| aligned("lexical", l.len(), chunks.len()));
    let vectors = read_json::<VectorIndex>(&index_dir.join(VECTORS_FILE))
        .filter(|v| aligned("vector", v.len(), chunks.len()));
    let manifest = read_json(&index_dir.join(MANIFEST_FILE));

    IndexArtifacts {
        chunks,
        lexical,
        vectors,
        manifest,
    }
}

fn aligned(kind: &str, len: usize, chunks: usize) -> bool {
    if len != chunks {
        warn!(kind, len, chunks, "Index does not match chunks.json, ignored");
    }
    len == chunks
}

pub fn lock_path(index_dir: &Path) -> PathBuf {
    index_dir.join(LOCK_FILE)
}
