//! Client for the semantic search service. The service owns embedding and
//! index state; this adapter is text-in, scored-ids-out.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use shopmate_core::config::SearchConfig;
use shopmate_core::domain::selection::SimilarityMatch;
use shopmate_core::AdvisorError;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("search returned status {status}: {body}")]
    Status { status: u16, body: String },
}

impl From<SearchError> for AdvisorError {
    fn from(error: SearchError) -> Self {
        Self::Search(error.to_string())
    }
}

/// Seam to the vector index: scored candidate ids for a text query, ordered
/// by descending relevance.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn query_by_text(
        &self,
        text: &str,
        top_k: usize,
    ) -> Result<Vec<SimilarityMatch>, SearchError>;
}

pub struct HttpVectorIndex {
    client: Client,
    endpoint: String,
    api_key: Option<SecretString>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<SimilarityMatch>,
}

impl HttpVectorIndex {
    pub fn new(endpoint: impl Into<String>, api_key: Option<SecretString>) -> Self {
        Self { client: Client::new(), endpoint: endpoint.into(), api_key }
    }

    pub fn from_config(config: &SearchConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();

        Self { client, endpoint: config.endpoint.clone(), api_key: config.api_key.clone() }
    }
}

#[async_trait]
impl VectorIndex for HttpVectorIndex {
    async fn query_by_text(
        &self,
        text: &str,
        top_k: usize,
    ) -> Result<Vec<SimilarityMatch>, SearchError> {
        let url = format!("{}/query", self.endpoint.trim_end_matches('/'));
        let mut request = self.client.post(url).json(&json!({
            "text": text,
            "top_k": top_k,
        }));
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Status { status: status.as_u16(), body });
        }

        let decoded: QueryResponse = response.json().await?;
        Ok(decoded.matches)
    }
}
