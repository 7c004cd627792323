//! BM25 (Okapi) ranking over chunk text.
//!
//! Tokens are the lowercased whitespace-separated words of a text; no
//! stemming or stop words.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::RagError;
use crate::models::{Chunk, SearchHit};

/// Term-frequency saturation.
pub const K1: f64 = 1.5;
/// Document-length normalization strength.
pub const B: f64 = 0.75;

pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Corpus statistics for BM25. Document `i` is chunk `i` of the corpus
/// it was built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexicalIndex {
    term_freqs: Vec<BTreeMap<String, u32>>,
    doc_lens: Vec<usize>,
    avg_doc_len: f64,
    idf: BTreeMap<String, f64>,
}

impl LexicalIndex {
    pub fn build(chunks: &[Chunk]) -> Self {
        Self::from_texts(chunks.iter().map(|c| c.text.as_str()))
    }

    pub fn from_texts<'a>(texts: impl Iterator<Item = &'a str>) -> Self {
        let mut term_freqs = Vec::new();
        let mut doc_lens = Vec::new();
        let mut doc_freq: BTreeMap<String, u32> = BTreeMap::new();

        for text in texts {
            let tokens = tokenize(text);
            doc_lens.push(tokens.len());
            let mut freqs: BTreeMap<String, u32> = BTreeMap::new();
            for token in tokens {
                *freqs.entry(token).or_insert(0) += 1;
            }
            for term in freqs.keys() {
                *doc_freq.entry(term.clone()).or_insert(0) += 1;
            }
            term_freqs.push(freqs);
        }

        let n_docs = doc_lens.len();
        let avg_doc_len = if n_docs == 0 {
            0.0
        } else {
            doc_lens.iter().sum::<usize>() as f64 / n_docs as f64
        };

        let idf: BTreeMap<String, f64> = doc_freq
            .into_iter()
            .map(|(term, df)| (term, idf(n_docs, df)))
            .collect();

        Self {
            term_freqs,
            doc_lens,
            avg_doc_len,
            idf,
        }
    }

    pub fn len(&self) -> usize {
        self.doc_lens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_lens.is_empty()
    }

    /// BM25 score of every document, in corpus order. Repeated query
    /// tokens count once per repetition.
    pub fn scores(&self, query: &str) -> Vec<f64> {
        let query_tokens = tokenize(query);
        self.term_freqs
            .iter()
            .zip(&self.doc_lens)
            .map(|(freqs, &doc_len)| {
                query_tokens
                    .iter()
                    .map(|token| {
                        let tf = match freqs.get(token) {
                            Some(&tf) => tf as f64,
                            None => return 0.0,
                        };
                        let idf = self.idf.get(token).copied().unwrap_or(0.0);
                        let norm = 1.0 - B + B * doc_len as f64 / self.avg_doc_len;
                        idf * (tf * (K1 + 1.0)) / (tf + K1 * norm)
                    })
                    .sum()
            })
            .collect()
    }

    /// Top `k` chunks by score, highest first; equal scores keep corpus
    /// order. Chunks sharing no token with the query are not hits.
    pub fn search(&self, query: &str, chunks: &[Chunk], k: usize) -> Result<Vec<SearchHit>, RagError> {
        if chunks.len() != self.len() {
            return Err(RagError::IndexCorrupt(format!(
                "lexical index covers {} documents, corpus has {}",
                self.len(),
                chunks.len()
            )));
        }

        let mut ranked: Vec<(usize, f64)> = self
            .scores(query)
            .into_iter()
            .enumerate()
            .filter(|(_, score)| *score > 0.0)
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

        Ok(ranked
            .into_iter()
            .take(k)
            .map(|(idx, score)| SearchHit::lexical(chunks[idx].clone(), score))
            .collect())
    }
}

/// Inverse document frequency, `ln(1 + (N - df + 0.5) / (df + 0.5))`.
///
/// Strictly positive and decreasing in `df`, so any matched term adds to a
/// document's score, including terms present in every document.
pub fn idf(n_docs: usize, df: u32) -> f64 {
    let n = n_docs as f64;
    let df = df as f64;
    (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
}

/// Rank `chunks` against `query` with a throwaway index.
pub fn lexical_search(query: &str, chunks: &[Chunk], k: usize) -> Vec<SearchHit> {
    LexicalIndex::build(chunks)
        .search(query, chunks, k)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Program;

    fn chunk(id: &str, text: &str) -> Chunk {
        Chunk {
            id: id.into(),
            program: Program::Ai,
            text: text.into(),
            source_ref: id.into(),
            source_url: "https://example.org".into(),
        }
    }

    fn corpus() -> Vec<Chunk> {
        vec![
            chunk("a", "Машинное обучение — Обязательные — 6.0 ECTS — семестр 1"),
            chunk("b", "Глубокое обучение — Специализация — 5.0 ECTS — семестр 2"),
            chunk("c", "Обработка естественного языка — Специализация — 4.0 ECTS — семестр 2"),
            chunk("d", "Компьютерное зрение — Специализация — 4.0 ECTS — семестр 3"),
            chunk("e", "Философия науки — Общие — 3.0 ECTS — семестр 1"),
        ]
    }

    #[test]
    fn rare_term_ranks_its_document_first() {
        let hits = lexical_search("зрение", &corpus(), 3);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id(), "d");
        assert!(hits[0].lexical_score.unwrap() > 0.0);
    }

    #[test]
    fn matching_is_case_insensitive() {
        let hits = lexical_search("ФИЛОСОФИЯ", &corpus(), 3);
        assert_eq!(hits[0].id(), "e");
    }

    #[test]
    fn scores_descend_and_respect_k() {
        let hits = lexical_search("обучение специализация", &corpus(), 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id(), "b");
        assert!(hits[0].lexical_score >= hits[1].lexical_score);
    }

    #[test]
    fn ties_keep_corpus_order() {
        let chunks = vec![
            chunk("x", "alpha beta"),
            chunk("y", "alpha beta"),
            chunk("z", "gamma"),
            chunk("w", "delta"),
            chunk("v", "epsilon"),
        ];
        let hits = lexical_search("alpha", &chunks, 5);
        let ids: Vec<&str> = hits.iter().map(|h| h.id()).collect();
        assert_eq!(ids, vec!["x", "y"]);
    }

    #[test]
    fn unknown_terms_yield_nothing() {
        assert!(lexical_search("квантовые вычисления", &corpus(), 5).is_empty());
        assert!(lexical_search("", &corpus(), 5).is_empty());
        assert!(lexical_search("обучение", &[], 5).is_empty());
    }

    #[test]
    fn idf_is_positive_and_falls_with_document_frequency() {
        let index = LexicalIndex::build(&corpus());
        // "ects" is in all 5 documents, "специализация" in 3, "зрение" in 1.
        let ects = index.idf["ects"];
        assert!(ects > 0.0, "idf should be positive, got {ects}");
        assert!(ects < index.idf["специализация"]);
        assert!(index.idf["специализация"] < index.idf["зрение"]);
    }

    #[test]
    fn single_document_corpus_matches() {
        let chunks = vec![chunk("a", "Машинное обучение")];
        let hits = lexical_search("машинное", &chunks, 5);
        assert_eq!(hits.len(), 1);
        assert!(hits[0].lexical_score.unwrap() > 0.0);
    }

    #[test]
    fn two_document_corpus_matches_unique_term() {
        let chunks = vec![
            chunk("a", "Машинное обучение — Ядро"),
            chunk("b", "Философия науки — Общие"),
        ];
        let hits = lexical_search("философия", &chunks, 5);
        let ids: Vec<&str> = hits.iter().map(|h| h.id()).collect();
        assert_eq!(ids, vec!["b"]);
    }

    #[test]
    fn term_in_half_the_documents_is_still_a_hit() {
        let chunks = vec![
            chunk("a", "Машинное обучение — Ядро — 6.0 ECTS — семестр 1"),
            chunk("b", "Глубокое обучение — Специализация — 5.0 ECTS — семестр 2"),
            chunk("c", "Философия науки — Общие — 3.0 ECTS — семестр 2"),
            chunk("d", "Компьютерное зрение — Специализация — 4.0 ECTS — семестр 3"),
        ];
        let index = LexicalIndex::build(&chunks);
        let hits = index.search("специализация", &chunks, 5).unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id()).collect();
        assert_eq!(ids, vec!["b", "d"]);
        // Rarer than the template token present in every chunk.
        assert!(index.idf["специализация"] > index.idf["ects"]);
    }

    #[test]
    fn longer_documents_score_lower_for_same_tf() {
        let chunks = vec![
            chunk("short", "graph theory"),
            chunk("long", "graph theory and many other words here"),
            chunk("x", "x"),
            chunk("y", "y"),
            chunk("z", "z"),
        ];
        let hits = lexical_search("graph", &chunks, 2);
        assert_eq!(hits[0].id(), "short");
        assert!(hits[0].lexical_score.unwrap() > hits[1].lexical_score.unwrap());
    }

    #[test]
    fn mismatched_corpus_is_rejected() {
        let index = LexicalIndex::build(&corpus());
        let result = index.search("обучение", &corpus()[..2], 5);
        assert!(matches!(result, Err(RagError::IndexCorrupt(_))));
    }

    #[test]
    fn index_survives_serialization() {
        let index = LexicalIndex::build(&corpus());
        let json = serde_json::to_string(&index).unwrap();
        let back: LexicalIndex = serde_json::from_str(&json).unwrap();
        assert_eq!(back.scores("семестр 2"), index.scores("семестр 2"));
    }
}
