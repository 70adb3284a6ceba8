use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductId(pub String);

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A catalog product, used both as a stored record and as a semantic-search
/// candidate handed to the language model for ranking.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub brand: String,
    pub name: String,
    pub price: Decimal,
    pub category: String,
    pub description: String,
}

impl Product {
    /// Concatenated searchable text, lower-cased, for keyword-overlap checks.
    pub fn searchable_text(&self) -> String {
        format!("{} {} {} {}", self.brand, self.name, self.category, self.description)
            .to_lowercase()
    }
}
