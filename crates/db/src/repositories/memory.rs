use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use shopmate_core::domain::conversation::{ConversationTurn, NewTurn, Role};
use shopmate_core::domain::product::{Product, ProductId};

use super::{ConversationRepository, ProductRepository, RepositoryError};

/// Test double mirroring SqlProductRepository's ordering contract.
#[derive(Default)]
pub struct InMemoryProductRepository {
    products: RwLock<HashMap<String, Product>>,
}

impl InMemoryProductRepository {
    pub async fn with_products(products: Vec<Product>) -> Self {
        let repository = Self::default();
        for product in products {
            repository.insert(&product).await.expect("in-memory insert is infallible");
        }
        repository
    }
}

#[async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let products = self.products.read().await;
        Ok(products.get(&id.0).cloned())
    }

    async fn fetch_by_ids(&self, ids: &[String]) -> Result<Vec<Product>, RepositoryError> {
        let products = self.products.read().await;
        Ok(ids.iter().filter_map(|id| products.get(id).cloned()).collect())
    }

    async fn insert(&self, product: &Product) -> Result<(), RepositoryError> {
        let mut products = self.products.write().await;
        products.insert(product.id.0.clone(), product.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryConversationRepository {
    turns: RwLock<Vec<ConversationTurn>>,
}

#[async_trait]
impl ConversationRepository for InMemoryConversationRepository {
    async fn append_turn(&self, turn: NewTurn) -> Result<ConversationTurn, RepositoryError> {
        let mut turns = self.turns.write().await;
        let stored = ConversationTurn {
            id: turns.len() as i64 + 1,
            role: turn.role,
            content: turn.content,
            product: turn.product,
            candidates: turn.candidates,
            mode: turn.mode,
            created_at: Utc::now(),
        };
        turns.push(stored.clone());
        Ok(stored)
    }

    async fn list_turns(&self) -> Result<Vec<ConversationTurn>, RepositoryError> {
        Ok(self.turns.read().await.clone())
    }

    async fn clear_turns(&self) -> Result<(), RepositoryError> {
        self.turns.write().await.clear();
        Ok(())
    }

    async fn last_assistant_product(&self) -> Result<Option<Product>, RepositoryError> {
        let turns = self.turns.read().await;
        Ok(turns
            .iter()
            .rev()
            .find(|turn| turn.role == Role::Assistant && turn.product.is_some())
            .and_then(|turn| turn.product.clone()))
    }

    async fn last_assistant_candidate_ids(
        &self,
    ) -> Result<Option<Vec<String>>, RepositoryError> {
        let turns = self.turns.read().await;
        Ok(turns
            .iter()
            .rev()
            .find(|turn| turn.role == Role::Assistant && turn.candidates.is_some())
            .and_then(|turn| turn.candidates.as_ref())
            .map(|candidates| candidates.iter().map(|c| c.id.0.clone()).collect()))
    }

    async fn recent_turns(&self, limit: usize) -> Result<Vec<(Role, String)>, RepositoryError> {
        let turns = self.turns.read().await;
        let skip = turns.len().saturating_sub(limit);
        Ok(turns.iter().skip(skip).map(|turn| (turn.role, turn.content.clone())).collect())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use shopmate_core::domain::conversation::{NewTurn, Role};
    use shopmate_core::domain::product::{Product, ProductId};

    use super::{InMemoryConversationRepository, InMemoryProductRepository};
    use crate::repositories::{ConversationRepository, ProductRepository};

    fn product(id: &str) -> Product {
        Product {
            id: ProductId(id.to_owned()),
            brand: "Relaxo".to_owned(),
            name: format!("Product {id}"),
            price: Decimal::new(1999, 2),
            category: "Healthtech and Wellness".to_owned(),
            description: "demo".to_owned(),
        }
    }

    #[tokio::test]
    async fn fetch_by_ids_follows_any_permutation() {
        let repository = InMemoryProductRepository::with_products(vec![
            product("a"),
            product("b"),
            product("c"),
        ])
        .await;

        for permutation in
            [["a", "b", "c"], ["c", "a", "b"], ["b", "c", "a"], ["c", "b", "a"]]
        {
            let ids: Vec<String> = permutation.iter().map(|id| (*id).to_owned()).collect();
            let fetched = repository.fetch_by_ids(&ids).await.expect("fetch");
            let fetched_ids: Vec<&str> = fetched.iter().map(|p| p.id.0.as_str()).collect();
            assert_eq!(fetched_ids, permutation);
        }
    }

    #[tokio::test]
    async fn conversation_log_mirrors_sql_contract() {
        let repository = InMemoryConversationRepository::default();

        repository.append_turn(NewTurn::user("hello")).await.expect("append");
        repository
            .append_turn(NewTurn::assistant("hi!").with_candidates(vec![product("a")]))
            .await
            .expect("append");

        let ids = repository.last_assistant_candidate_ids().await.expect("query").expect("ids");
        assert_eq!(ids, vec!["a"]);

        let recent = repository.recent_turns(1).await.expect("query");
        assert_eq!(recent, vec![(Role::Assistant, "hi!".to_owned())]);
    }
}
