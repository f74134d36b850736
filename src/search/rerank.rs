//! Precision reranking of merged candidates with a cross-encoder.

use crate::llm::cross_encoder::CrossEncoder;
use crate::models::{RankedHit, SearchHit};

use super::hybrid::best_score;

pub struct RerankOutput {
    pub hits: Vec<RankedHit>,
    /// True when the scorer was unavailable and the merge ordering was
    /// used instead.
    pub fell_back: bool,
}

/// Rerank candidates against the question and keep the top `final_top_k`.
///
/// Candidates arrive in merge order. Score ties break toward multi-signal
/// provenance, then document order, so output is deterministic for a
/// fixed corpus. If the scorer fails the candidates pass through in merge
/// order; retrieval degrades rather than erroring.
pub async fn rerank(
    scorer: &dyn CrossEncoder,
    question: &str,
    candidates: Vec<SearchHit>,
    final_top_k: usize,
) -> RerankOutput {
    if candidates.is_empty() {
        return RerankOutput {
            hits: Vec::new(),
            fell_back: false,
        };
    }

    let passages: Vec<String> = candidates.iter().map(|h| h.text.clone()).collect();

    let scores = match scorer.score(question, &passages).await {
        Ok(scores) if scores.len() == candidates.len() => scores,
        Ok(scores) => {
            tracing::warn!(
                "Reranker returned {} scores for {} passages, falling back to merge order",
                scores.len(),
                candidates.len()
            );
            return RerankOutput {
                hits: fallback_ranking(candidates, final_top_k),
                fell_back: true,
            };
        }
        Err(e) => {
            tracing::warn!("Reranker unavailable, falling back to merge order: {e:#}");
            return RerankOutput {
                hits: fallback_ranking(candidates, final_top_k),
                fell_back: true,
            };
        }
    };

    let mut scored: Vec<(SearchHit, f32)> = candidates.into_iter().zip(scores).collect();
    scored.sort_by(|(a, sa), (b, sb)| {
        sb.partial_cmp(sa)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.provenance.multi_signal().cmp(&a.provenance.multi_signal()))
            .then_with(|| a.doc_id.cmp(&b.doc_id))
            .then_with(|| a.seq.cmp(&b.seq))
    });
    scored.truncate(final_top_k);

    let hits = scored
        .into_iter()
        .enumerate()
        .map(|(i, (hit, score))| RankedHit {
            hit,
            score,
            rank: i + 1,
        })
        .collect();

    RerankOutput {
        hits,
        fell_back: false,
    }
}

/// Pass candidates through in merge order, carrying the best per-signal
/// score as the rank score.
fn fallback_ranking(candidates: Vec<SearchHit>, final_top_k: usize) -> Vec<RankedHit> {
    candidates
        .into_iter()
        .take(final_top_k)
        .enumerate()
        .map(|(i, hit)| {
            let score = best_score(&hit);
            RankedHit {
                hit,
                score,
                rank: i + 1,
            }
        })
        .collect()
}
