//! Reciprocal-rank fusion of lexical and vector hit lists.
//!
//! Scores from the two signals live on incomparable scales, so only list
//! positions are used: `1/(1 + rank_lexical) + 1/(1 + rank_vector)`, with
//! a chunk missing from a list taking `ABSENT_RANK` there.

use std::collections::HashMap;

use crate::models::SearchHit;

/// Rank given to a chunk absent from one list; contributes ~0.
pub const ABSENT_RANK: f64 = 1_000_000.0;

pub fn reciprocal_rank(rank: f64) -> f64 {
    1.0 / (1.0 + rank)
}

/// First position of each id in a hit list.
fn rank_map(hits: &[SearchHit]) -> HashMap<&str, usize> {
    let mut ranks = HashMap::with_capacity(hits.len());
    for (pos, hit) in hits.iter().enumerate() {
        ranks.entry(hit.id()).or_insert(pos);
    }
    ranks
}

/// Merge two ranked lists into the top `k` by fused score.
///
/// Each chunk appears once, carrying whatever lexical score and vector
/// distance it had. Equal fused scores keep first-seen order: lexical
/// list first, then vector.
pub fn fuse(lexical_hits: &[SearchHit], vector_hits: &[SearchHit], k: usize) -> Vec<SearchHit> {
    let lexical_ranks = rank_map(lexical_hits);
    let vector_ranks = rank_map(vector_hits);

    let mut merged: Vec<SearchHit> = Vec::new();
    let mut position: HashMap<String, usize> = HashMap::new();

    for hit in lexical_hits.iter().chain(vector_hits) {
        match position.get(hit.id()) {
            Some(&idx) => {
                let existing = &mut merged[idx];
                existing.lexical_score = existing.lexical_score.or(hit.lexical_score);
                existing.vector_distance = existing.vector_distance.or(hit.vector_distance);
            }
            None => {
                position.insert(hit.id().to_string(), merged.len());
                merged.push(hit.clone());
            }
        }
    }

    for hit in &mut merged {
        let rank_of = |ranks: &HashMap<&str, usize>| {
            ranks
                .get(hit.id())
                .map_or(ABSENT_RANK, |&r| r as f64)
        };
        let fused = reciprocal_rank(rank_of(&lexical_ranks)) + reciprocal_rank(rank_of(&vector_ranks));
        hit.fused_score = Some(fused);
    }

    // Stable: ties stay in first-seen order.
    merged.sort_by(|a, b| {
        b.fused_score
            .unwrap_or(0.0)
            .total_cmp(&a.fused_score.unwrap_or(0.0))
    });
    merged.truncate(k);
    merged
}
