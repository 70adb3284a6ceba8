use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row};

use shopmate_core::domain::product::{Product, ProductId};

use super::{ProductRepository, RepositoryError};
use crate::DbPool;

pub struct SqlProductRepository {
    pool: DbPool,
}

impl SqlProductRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn decode_product(row: &SqliteRow) -> Result<Product, RepositoryError> {
    let price_raw: String = row.get("price");
    let price = Decimal::from_str(&price_raw)
        .map_err(|err| RepositoryError::Decode(format!("invalid product price: {err}")))?;

    Ok(Product {
        id: ProductId(row.get("id")),
        brand: row.get("brand"),
        name: row.get("name"),
        price,
        category: row.get("category"),
        description: row.get("description"),
    })
}

#[async_trait]
impl ProductRepository for SqlProductRepository {
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, brand, name, price, category, description \
             FROM products WHERE id = ? LIMIT 1",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(decode_product).transpose()
    }

    async fn fetch_by_ids(&self, ids: &[String]) -> Result<Vec<Product>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = QueryBuilder::new(
            "SELECT id, brand, name, price, category, description FROM products WHERE id IN (",
        );
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(")");

        let rows = builder.build().fetch_all(&self.pool).await?;

        // The IN query returns storage order; re-rank to the caller's order.
        let mut by_id: HashMap<String, Product> = HashMap::with_capacity(rows.len());
        for row in &rows {
            let product = decode_product(row)?;
            by_id.insert(product.id.0.clone(), product);
        }

        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn insert(&self, product: &Product) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO products (id, brand, name, price, category, description) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET \
                 brand = excluded.brand, \
                 name = excluded.name, \
                 price = excluded.price, \
                 category = excluded.category, \
                 description = excluded.description",
        )
        .bind(&product.id.0)
        .bind(&product.brand)
        .bind(&product.name)
        .bind(product.price.to_string())
        .bind(&product.category)
        .bind(&product.description)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
