use std::sync::Arc;

use tracing::info;

use shopmate_core::domain::product::Product;
use shopmate_core::domain::selection::SimilarityMatch;
use shopmate_core::AdvisorError;
use shopmate_db::repositories::ProductRepository;

use crate::search::VectorIndex;

/// Candidate store adapter: joins the vector index with the product catalog
/// so callers always receive full records in similarity-rank order.
#[derive(Clone)]
pub struct CandidateStore {
    index: Arc<dyn VectorIndex>,
    products: Arc<dyn ProductRepository>,
}

impl CandidateStore {
    pub fn new(index: Arc<dyn VectorIndex>, products: Arc<dyn ProductRepository>) -> Self {
        Self { index, products }
    }

    /// Full records for the given ids, ordered like the input; unknown ids
    /// are dropped silently.
    pub async fn by_ids(&self, ids: &[String]) -> Result<Vec<Product>, AdvisorError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.products.fetch_by_ids(ids).await?)
    }

    /// Raw scored matches straight from the index, for callers that apply
    /// their own filtering before fetching records.
    pub async fn raw_matches(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<SimilarityMatch>, AdvisorError> {
        Ok(self.index.query_by_text(query, top_k).await?)
    }

    /// Unfiltered top-k: query the index and resolve the full records.
    pub async fn top_by_query(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<Product>, AdvisorError> {
        let matches = self.index.query_by_text(query, top_k).await?;
        let ids: Vec<String> = matches.into_iter().map(|m| m.id).collect();
        info!(query, ?ids, "retrieval.top_by_query");
        self.by_ids(&ids).await
    }
}
