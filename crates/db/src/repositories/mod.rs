use async_trait::async_trait;
use thiserror::Error;

use shopmate_core::domain::conversation::{ConversationTurn, NewTurn, Role};
use shopmate_core::domain::product::{Product, ProductId};

pub mod conversation;
pub mod memory;
pub mod product;

pub use conversation::SqlConversationRepository;
pub use memory::{InMemoryConversationRepository, InMemoryProductRepository};
pub use product::SqlProductRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for shopmate_core::AdvisorError {
    fn from(error: RepositoryError) -> Self {
        Self::Repository(error.to_string())
    }
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError>;

    /// Fetches products for the given ids, ordered exactly like the input
    /// (similarity rank, not storage order); unknown ids are silently
    /// dropped.
    async fn fetch_by_ids(&self, ids: &[String]) -> Result<Vec<Product>, RepositoryError>;

    async fn insert(&self, product: &Product) -> Result<(), RepositoryError>;
}

/// Append-only conversation log plus the derived lookups the advisor needs.
/// Turns are immutable once written; insertion order is the only ordering.
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    async fn append_turn(&self, turn: NewTurn) -> Result<ConversationTurn, RepositoryError>;

    async fn list_turns(&self) -> Result<Vec<ConversationTurn>, RepositoryError>;

    async fn clear_turns(&self) -> Result<(), RepositoryError>;

    /// Product attached to the most recent assistant turn that carries one.
    async fn last_assistant_product(&self) -> Result<Option<Product>, RepositoryError>;

    /// Candidate ids from the most recent assistant turn that stored a
    /// candidate set. A recomputation cache, never existence ground truth.
    async fn last_assistant_candidate_ids(&self)
        -> Result<Option<Vec<String>>, RepositoryError>;

    /// Most recent turns, oldest-first, bounded by `limit`.
    async fn recent_turns(&self, limit: usize) -> Result<Vec<(Role, String)>, RepositoryError>;
}
