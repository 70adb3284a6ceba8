use tracing::info;

use shopmate_core::domain::product::Product;
use shopmate_core::domain::selection::SimilarityMatch;
use shopmate_core::text::extract_keywords;
use shopmate_core::AdvisorError;

use crate::retrieval::CandidateStore;

/// Discards spurious similarity matches before they reach the language
/// model: a score floor plus a keyword-overlap guard against off-topic hits
/// that happen to sit close in embedding space.
#[derive(Clone, Copy, Debug)]
pub struct RelevanceFilter {
    pub min_score: f64,
    pub top_k: usize,
}

impl RelevanceFilter {
    pub fn new(min_score: f64, top_k: usize) -> Self {
        Self { min_score, top_k }
    }

    /// Queries wider than `top_k` so the guard has something to discard.
    fn fetch_width(&self) -> usize {
        self.top_k.saturating_add(4).max(8)
    }

    fn surviving_ids(&self, matches: &[SimilarityMatch]) -> Vec<String> {
        matches
            .iter()
            .filter(|m| m.score.is_some_and(|score| score >= self.min_score))
            .map(|m| m.id.clone())
            .collect()
    }

    /// Empty output is a signal ("re-query unfiltered" or "not available"),
    /// never an error.
    pub async fn filter(
        &self,
        store: &CandidateStore,
        query: &str,
    ) -> Result<Vec<Product>, AdvisorError> {
        let matches = store.raw_matches(query, self.fetch_width()).await?;
        let ids = self.surviving_ids(&matches);
        info!(
            query,
            min_score = self.min_score,
            ?ids,
            scores = ?matches.iter().map(|m| m.score).collect::<Vec<_>>(),
            "relevance.prefetch"
        );
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let products = store.by_ids(&ids).await?;
        let keywords = extract_keywords(query);
        let relevant: Vec<Product> = products
            .into_iter()
            .filter(|product| is_relevant(product, &keywords))
            .take(self.top_k)
            .collect();
        info!(kept = ?relevant.iter().map(|p| p.id.0.as_str()).collect::<Vec<_>>(), "relevance.final");
        Ok(relevant)
    }
}

fn is_relevant(product: &Product, keywords: &[String]) -> bool {
    if keywords.is_empty() {
        return true;
    }
    let text = product.searchable_text();
    keywords.iter().any(|keyword| text.contains(keyword.as_str()))
}
