use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use super::fusion::fuse;
use super::lexical::LexicalIndex;
use super::vector::{vector_search, VectorIndex};
use super::RagError;
use crate::config::DataPaths;
use crate::models::{Chunk, Program, SearchHit};
use crate::pipeline::storage::chunker::build_chunks;
use crate::pipeline::storage::index::load_index;
use crate::pipeline::storage::plan_store::load_all_plans;
use crate::pipeline::storage::types::EmbeddingModel;

/// Ranked hits plus which signals contributed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RetrievalOutcome {
    pub hits: Vec<SearchHit>,
    pub lexical_available: bool,
    pub vector_available: bool,
}

impl RetrievalOutcome {
    /// Neither index could answer: callers report "no results".
    pub fn is_unavailable(&self) -> bool {
        !self.lexical_available && !self.vector_available
    }
}

/// Lexical + vector retrieval over one chunk corpus, fused by rank.
pub struct HybridRetriever {
    chunks: Vec<Chunk>,
    lexical: Option<LexicalIndex>,
    vectors: Option<VectorIndex>,
    embedder: Option<Arc<dyn EmbeddingModel>>,
}

impl HybridRetriever {
    pub fn new(
        chunks: Vec<Chunk>,
        lexical: Option<LexicalIndex>,
        vectors: Option<VectorIndex>,
        embedder: Option<Arc<dyn EmbeddingModel>>,
    ) -> Self {
        Self {
            chunks,
            lexical,
            vectors,
            embedder,
        }
    }

    /// Load the persisted index. Without `chunks.json` the corpus is rebuilt
    /// from the normalized plans (lexical only); a missing `lexical.json` is
    /// rebuilt in memory.
    pub fn open(
        paths: &DataPaths,
        embedder: Option<Arc<dyn EmbeddingModel>>,
    ) -> Result<Self, RagError> {
        let artifacts = load_index(&paths.index_dir());
        let (chunks, lexical, vectors) = if artifacts.chunks.is_empty() {
            let plans = load_all_plans(&paths.normalized_dir())?;
            let chunks: Vec<Chunk> = plans.iter().flat_map(build_chunks).collect();
            if !chunks.is_empty() {
                warn!(chunks = chunks.len(), "No built index, using normalized plans");
            }
            (chunks, None, None)
        } else {
            (artifacts.chunks, artifacts.lexical, artifacts.vectors)
        };

        let lexical = match lexical {
            Some(index) => Some(index),
            None if !chunks.is_empty() => Some(LexicalIndex::build(&chunks)),
            None => None,
        };

        if let (Some(index), Some(model)) = (&vectors, &embedder) {
            if model.dimension() != 0 && model.dimension() != index.dimension() {
                warn!(
                    index = index.dimension(),
                    model = model.dimension(),
                    "Embedding model does not match vector index"
                );
            }
        }

        Ok(Self::new(chunks, lexical, vectors, embedder))
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    fn lexical_hits(&self, query: &str, depth: usize) -> Option<Vec<SearchHit>> {
        let index = self.lexical.as_ref()?;
        match index.search(query, &self.chunks, depth) {
            Ok(hits) => Some(hits),
            Err(e) => {
                warn!(error = %e, "Lexical search skipped");
                None
            }
        }
    }

    fn vector_hits(&self, query: &str, depth: usize) -> Option<Vec<SearchHit>> {
        let index = self.vectors.as_ref().filter(|v| !v.is_empty())?;
        let model = self.embedder.as_ref()?;
        let query_vector = match model.embed(query) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Query embedding failed, lexical only");
                return None;
            }
        };
        if query_vector.len() != index.dimension() {
            warn!(
                index = index.dimension(),
                query = query_vector.len(),
                "Query vector does not match index dimension, lexical only"
            );
            return None;
        }
        if index.len() != self.chunks.len() {
            warn!(
                vectors = index.len(),
                chunks = self.chunks.len(),
                "Vector index does not match corpus, lexical only"
            );
            return None;
        }
        Some(vector_search(Some(index), &self.chunks, &query_vector, depth))
    }

    /// Top `k` chunks for `query`, optionally limited to one program.
    ///
    /// Each signal is retrieved at depth `2k`; both run in parallel and the
    /// program filter is applied to the fused list before truncating.
    pub fn search(&self, query: &str, k: usize, program: Option<Program>) -> RetrievalOutcome {
        let depth = k.saturating_mul(2);
        let (lexical, vector) = rayon::join(
            || self.lexical_hits(query, depth),
            || self.vector_hits(query, depth),
        );

        let outcome_flags = (lexical.is_some(), vector.is_some());
        if outcome_flags == (false, false) {
            warn!("No index available for query");
            return RetrievalOutcome::default();
        }

        let lexical = lexical.unwrap_or_default();
        let vector = vector.unwrap_or_default();
        debug!(lexical = lexical.len(), vector = vector.len(), "Fusing hits");

        let hits: Vec<SearchHit> = fuse(&lexical, &vector, lexical.len() + vector.len())
            .into_iter()
            .filter(|hit| program.map_or(true, |p| hit.chunk.program == p))
            .take(k)
            .collect();

        RetrievalOutcome {
            hits,
            lexical_available: outcome_flags.0,
            vector_available: outcome_flags.1,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::models::{source_ref, Course, CourseKind, Plan, Rules};
    use crate::pipeline::storage::embedder::{MockEmbedder, MOCK_EMBEDDING_DIM};
    use crate::pipeline::storage::index::build_index;
    use crate::pipeline::storage::plan_store::save_plan;

    fn plan(program: Program, names: &[(&str, &str)]) -> Plan {
        Plan {
            program,
            version: "2026-2027".into(),
            source_url: program.page_url().into(),
            courses: names
                .iter()
                .enumerate()
                .map(|(row, (name, module))| Course {
                    code: None,
                    name: name.to_string(),
                    semester: 1,
                    credit_value: 3.0,
                    kind: CourseKind::Elective,
                    module: module.to_string(),
                    prerequisites: vec![],
                    notes: None,
                    source_ref: source_ref(2, row),
                })
                .collect(),
            rules: Rules {
                total_credit_value: 120,
                min_elective_credit_value: 24,
                per_semester_constraints: BTreeMap::new(),
            },
        }
    }

    fn plans() -> Vec<Plan> {
        vec![
            plan(
                Program::Ai,
                &[
                    ("Машинное обучение", "Ядро"),
                    ("Компьютерное зрение", "Специализация"),
                    ("Обработка текстов", "Специализация"),
                ],
            ),
            plan(
                Program::AiProduct,
                &[
                    ("Продуктовая аналитика", "Продукт"),
                    ("Машинное обучение в продукте", "Продукт"),
                    ("Управление командой", "Менеджмент"),
                ],
            ),
        ]
    }

    fn retriever(with_vectors: bool) -> HybridRetriever {
        let chunks: Vec<Chunk> = plans().iter().flat_map(build_chunks).collect();
        let lexical = LexicalIndex::build(&chunks);
        let (vectors, embedder) = if with_vectors {
            let model = MockEmbedder::new();
            let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
            let embedded = model.embed_batch(&texts).unwrap();
            let index = VectorIndex::new(model.dimension(), embedded).unwrap();
            let model: Arc<dyn EmbeddingModel> = Arc::new(model);
            (Some(index), Some(model))
        } else {
            (None, None)
        };
        HybridRetriever::new(chunks, Some(lexical), vectors, embedder)
    }

    #[test]
    fn hybrid_search_uses_both_signals() {
        let outcome = retriever(true).search("зрение", 3, None);
        assert!(outcome.lexical_available);
        assert!(outcome.vector_available);
        assert_eq!(outcome.hits[0].chunk.id, "AI-page=2,row=1");
        assert!(outcome.hits[0].lexical_score.is_some());
        assert!(outcome.hits[0].vector_distance.is_some());
        assert!(outcome.hits.len() <= 3);
    }

    #[test]
    fn program_filter_applies_after_fusion() {
        let outcome = retriever(true).search("машинное обучение", 2, Some(Program::AiProduct));
        assert!(!outcome.hits.is_empty());
        assert!(outcome.hits.iter().all(|h| h.chunk.program == Program::AiProduct));
        assert_eq!(outcome.hits[0].chunk.id, "AI Product-page=2,row=1");
    }

    #[test]
    fn lexical_only_when_vectors_missing() {
        let outcome = retriever(false).search("аналитика", 5, None);
        assert!(outcome.lexical_available);
        assert!(!outcome.vector_available);
        assert_eq!(outcome.hits.len(), 1);
        assert_eq!(outcome.hits[0].fused_score.unwrap(), 1.0 + 1.0 / 1_000_001.0);
    }

    #[test]
    fn vector_only_when_lexical_missing() {
        let mut r = retriever(true);
        r.lexical = None;
        let outcome = r.search("зрение", 2, None);
        assert!(!outcome.lexical_available);
        assert!(outcome.vector_available);
        assert_eq!(outcome.hits.len(), 2);
    }

    #[test]
    fn mismatched_embedder_dimension_reports_vectors_unavailable() {
        let mut r = retriever(true);
        r.embedder = Some(Arc::new(MockEmbedder::with_dimension(MOCK_EMBEDDING_DIM + 1)));
        let outcome = r.search("аналитика", 5, None);
        assert!(outcome.lexical_available);
        assert!(!outcome.vector_available);
        assert_eq!(outcome.hits.len(), 1);
        assert!(outcome.hits[0].vector_distance.is_none());
    }

    #[test]
    fn no_index_is_an_explicit_empty_outcome() {
        let r = HybridRetriever::new(Vec::new(), None, None, None);
        let outcome = r.search("обучение", 5, None);
        assert!(outcome.hits.is_empty());
        assert!(outcome.is_unavailable());
    }

    #[test]
    fn open_falls_back_to_normalized_plans() {
        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::new(dir.path());
        for p in plans() {
            save_plan(&paths.normalized_dir(), &p).unwrap();
        }

        let r = HybridRetriever::open(&paths, None).unwrap();
        assert_eq!(r.len(), 6);
        let outcome = r.search("команда", 5, None);
        assert!(outcome.lexical_available);
        assert!(!outcome.vector_available);
        // Exact tokens only: "команда" does not match "командой".
        assert!(outcome.hits.is_empty());
        let outcome = r.search("командой", 5, None);
        assert_eq!(outcome.hits[0].chunk.program, Program::AiProduct);
    }

    #[test]
    fn open_reads_built_index() {
        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::new(dir.path());
        let model: Arc<dyn EmbeddingModel> = Arc::new(MockEmbedder::new());
        build_index(&paths.index_dir(), &plans(), model.as_ref()).unwrap();

        let r = HybridRetriever::open(&paths, Some(model)).unwrap();
        let outcome = r.search("продуктовая аналитика", 1, None);
        assert!(outcome.vector_available);
        assert_eq!(outcome.hits.len(), 1);
        assert_eq!(outcome.hits[0].chunk.id, "AI Product-page=2,row=0");
    }

    #[test]
    fn empty_data_dir_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let r = HybridRetriever::open(&DataPaths::new(dir.path()), None).unwrap();
        assert!(r.is_empty());
        assert!(r.search("что угодно", 3, None).is_unavailable());
    }
}
