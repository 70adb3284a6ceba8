use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use shopmate_core::domain::conversation::{ConversationTurn, FlowMode, NewTurn, Role};
use shopmate_core::domain::product::Product;

use super::{ConversationRepository, RepositoryError};
use crate::DbPool;

pub struct SqlConversationRepository {
    pool: DbPool,
}

impl SqlConversationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|err| RepositoryError::Decode(format!("invalid timestamp `{raw}`: {err}")))
}

fn decode_turn(row: &SqliteRow) -> Result<ConversationTurn, RepositoryError> {
    let role_raw: String = row.get("role");
    let role = Role::from_str(&role_raw).map_err(RepositoryError::Decode)?;

    let product = row
        .get::<Option<String>, _>("product")
        .map(|json| serde_json::from_str::<Product>(&json))
        .transpose()
        .map_err(|err| RepositoryError::Decode(format!("invalid product json: {err}")))?;

    // Candidate sets were historically persisted either as full product rows
    // or as bare id arrays; only full rows are surfaced here, id extraction
    // lives in last_assistant_candidate_ids.
    let candidates = row
        .get::<Option<String>, _>("candidates")
        .and_then(|json| serde_json::from_str::<Vec<Product>>(&json).ok());

    let mode = row
        .get::<Option<String>, _>("mode")
        .and_then(|raw| FlowMode::from_str(&raw).ok());

    let created_raw: String = row.get("created_at");

    Ok(ConversationTurn {
        id: row.get("id"),
        role,
        content: row.get("content"),
        product,
        candidates,
        mode,
        created_at: parse_timestamp(&created_raw)?,
    })
}

fn candidate_ids_from_json(json: &str) -> Option<Vec<String>> {
    let value: serde_json::Value = serde_json::from_str(json).ok()?;
    let items = value.as_array()?;
    if items.is_empty() {
        return None;
    }

    if items.iter().all(|item| item.is_string()) {
        return Some(items.iter().filter_map(|item| item.as_str().map(str::to_owned)).collect());
    }

    let ids: Vec<String> = items
        .iter()
        .filter_map(|item| item.get("id").and_then(|id| id.as_str()).map(str::to_owned))
        .collect();
    (!ids.is_empty()).then_some(ids)
}

#[async_trait]
impl ConversationRepository for SqlConversationRepository {
    async fn append_turn(&self, turn: NewTurn) -> Result<ConversationTurn, RepositoryError> {
        let product_json = turn
            .product
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|err| RepositoryError::Decode(format!("product encode failed: {err}")))?;
        let candidates_json = turn
            .candidates
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|err| RepositoryError::Decode(format!("candidates encode failed: {err}")))?;

        let created_at = Utc::now();
        let row = sqlx::query(
            "INSERT INTO messages (role, content, product, candidates, mode, created_at) \
             VALUES (?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(turn.role.as_str())
        .bind(&turn.content)
        .bind(&product_json)
        .bind(&candidates_json)
        .bind(turn.mode.map(|mode| mode.as_str()))
        .bind(created_at.to_rfc3339())
        .fetch_one(&self.pool)
        .await?;

        Ok(ConversationTurn {
            id: row.get("id"),
            role: turn.role,
            content: turn.content,
            product: turn.product,
            candidates: turn.candidates,
            mode: turn.mode,
            created_at,
        })
    }

    async fn list_turns(&self) -> Result<Vec<ConversationTurn>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, role, content, product, candidates, mode, created_at \
             FROM messages ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(decode_turn).collect()
    }

    async fn clear_turns(&self) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM messages").execute(&self.pool).await?;
        Ok(())
    }

    async fn last_assistant_product(&self) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query(
            "SELECT product FROM messages \
             WHERE role = 'assistant' AND product IS NOT NULL \
             ORDER BY id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        row.and_then(|row| row.get::<Option<String>, _>("product"))
            .map(|json| {
                serde_json::from_str(&json).map_err(|err| {
                    RepositoryError::Decode(format!("invalid stored product: {err}"))
                })
            })
            .transpose()
    }

    async fn last_assistant_candidate_ids(
        &self,
    ) -> Result<Option<Vec<String>>, RepositoryError> {
        let row = sqlx::query(
            "SELECT candidates FROM messages \
             WHERE role = 'assistant' AND candidates IS NOT NULL \
             ORDER BY id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row
            .and_then(|row| row.get::<Option<String>, _>("candidates"))
            .and_then(|json| candidate_ids_from_json(&json)))
    }

    async fn recent_turns(&self, limit: usize) -> Result<Vec<(Role, String)>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT role, content FROM messages ORDER BY id DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut turns = Vec::with_capacity(rows.len());
        for row in rows.iter().rev() {
            let role_raw: String = row.get("role");
            let role = Role::from_str(&role_raw).map_err(RepositoryError::Decode)?;
            turns.push((role, row.get("content")));
        }
        Ok(turns)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use shopmate_core::domain::conversation::{FlowMode, NewTurn, Role};
    use shopmate_core::domain::product::{Product, ProductId};

    use super::SqlConversationRepository;
    use crate::repositories::ConversationRepository;
    use crate::{connect_with_settings, migrations};

    fn product(id: &str) -> Product {
        Product {
            id: ProductId(id.to_owned()),
            brand: "Relaxo".to_owned(),
            name: "Neck Massager".to_owned(),
            price: Decimal::new(4999, 2),
            category: "Healthtech and Wellness".to_owned(),
            description: "Shiatsu neck and shoulder massager".to_owned(),
        }
    }

    async fn repository() -> SqlConversationRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlConversationRepository::new(pool)
    }

    #[tokio::test]
    async fn turns_are_ordered_by_insertion() {
        let repository = repository().await;

        repository.append_turn(NewTurn::user("hi")).await.expect("append");
        repository.append_turn(NewTurn::assistant("hello!")).await.expect("append");
        repository.append_turn(NewTurn::user("I need a massager")).await.expect("append");

        let turns = repository.list_turns().await.expect("list");
        assert_eq!(turns.len(), 3);
        assert!(turns.windows(2).all(|pair| pair[0].id < pair[1].id));
        assert_eq!(turns[0].content, "hi");
        assert_eq!(turns[2].content, "I need a massager");
    }

    #[tokio::test]
    async fn last_assistant_product_skips_user_turns_and_bare_replies() {
        let repository = repository().await;

        repository.append_turn(NewTurn::user("I need a massager")).await.expect("append");
        repository
            .append_turn(
                NewTurn::assistant("try this one")
                    .with_product(product("p1"))
                    .with_mode(FlowMode::NewProduct),
            )
            .await
            .expect("append");
        repository.append_turn(NewTurn::assistant("anything else?")).await.expect("append");

        let last = repository.last_assistant_product().await.expect("query").expect("product");
        assert_eq!(last.id.0, "p1");
    }

    #[tokio::test]
    async fn candidate_ids_come_from_stored_product_rows() {
        let repository = repository().await;

        repository
            .append_turn(
                NewTurn::assistant("a few options")
                    .with_candidates(vec![product("a"), product("b"), product("c")]),
            )
            .await
            .expect("append");

        let ids = repository.last_assistant_candidate_ids().await.expect("query").expect("ids");
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn candidate_ids_tolerate_bare_id_arrays() {
        let repository = repository().await;

        // Older rows persisted ids only; write one through raw SQL.
        sqlx::query(
            "INSERT INTO messages (role, content, candidates, created_at) \
             VALUES ('assistant', 'legacy', '[\"x\",\"y\"]', '2024-01-01 00:00:00')",
        )
        .execute(&repository.pool)
        .await
        .expect("raw insert");

        let ids = repository.last_assistant_candidate_ids().await.expect("query").expect("ids");
        assert_eq!(ids, vec!["x", "y"]);
    }

    #[tokio::test]
    async fn recent_turns_are_bounded_and_oldest_first() {
        let repository = repository().await;

        for index in 0..5 {
            repository.append_turn(NewTurn::user(format!("turn {index}"))).await.expect("append");
        }

        let recent = repository.recent_turns(3).await.expect("query");
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0], (Role::User, "turn 2".to_owned()));
        assert_eq!(recent[2], (Role::User, "turn 4".to_owned()));
    }

    #[tokio::test]
    async fn clear_turns_empties_the_log() {
        let repository = repository().await;

        repository.append_turn(NewTurn::user("hi")).await.expect("append");
        repository.clear_turns().await.expect("clear");

        assert!(repository.list_turns().await.expect("list").is_empty());
        assert!(repository.last_assistant_product().await.expect("query").is_none());
    }
}
