use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

/// Number of migrations compiled into this binary.
pub fn known_count() -> usize {
    MIGRATOR.iter().count()
}

/// Number of migrations recorded as applied in the target database; zero
/// when the bookkeeping table does not exist yet.
pub async fn applied_count(pool: &DbPool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::run_pending;
    use crate::connect_with_settings;

    const MANAGED_SCHEMA_OBJECTS: &[&str] = &[
        "products",
        "messages",
        "idx_products_category",
        "idx_messages_role_product",
        "idx_messages_role_candidates",
    ];

    #[tokio::test]
    async fn migrations_create_the_managed_schema() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool");
        run_pending(&pool).await.expect("migrations should apply");

        let rows = sqlx::query(
            "SELECT name FROM sqlite_master WHERE type IN ('table', 'index') ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .expect("schema query");

        let names: Vec<String> = rows.iter().map(|row| row.get::<String, _>("name")).collect();
        for object in MANAGED_SCHEMA_OBJECTS {
            assert!(names.iter().any(|name| name == object), "missing schema object `{object}`");
        }
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool");
        run_pending(&pool).await.expect("first run");
        run_pending(&pool).await.expect("second run should be a no-op");
    }

    #[tokio::test]
    async fn applied_count_tracks_the_compiled_in_set() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool");
        assert_eq!(super::applied_count(&pool).await, 0, "fresh database has no bookkeeping");

        run_pending(&pool).await.expect("migrations should apply");
        assert_eq!(super::applied_count(&pool).await, super::known_count() as i64);
    }
}
