use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One scored hit from the semantic search service. Ephemeral: produced per
/// query and consumed once by the relevance filter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimilarityMatch {
    pub id: String,
    pub score: Option<f64>,
}

/// A forced pick among a non-empty candidate set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub product_id: String,
    pub rationale: String,
    #[serde(default)]
    pub rejected_reasons: BTreeMap<String, String>,
}

/// Outcome of the veto pass: either a pick or an explicit refusal. Exactly
/// one variant, never silence.
#[derive(Clone, Debug, PartialEq)]
pub enum SelectionVerdict {
    Picked { product_id: String, rationale: String },
    NotAvailable { reason: String },
}

impl SelectionVerdict {
    pub fn is_not_available(&self) -> bool {
        matches!(self, Self::NotAvailable { .. })
    }
}
