use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::product::Product;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            other => Err(format!("unknown role `{other}`")),
        }
    }
}

/// The five conversational intents the flow classifier decides between.
/// `NotAvailable` is part of the closed enum but in practice is assigned by
/// retrieval/selection failure downstream rather than predicted up front.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowMode {
    SmallTalk,
    FollowupQa,
    MoreProducts,
    NewProduct,
    NotAvailable,
}

impl FlowMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SmallTalk => "SMALL_TALK",
            Self::FollowupQa => "FOLLOWUP_QA",
            Self::MoreProducts => "MORE_PRODUCTS",
            Self::NewProduct => "NEW_PRODUCT",
            Self::NotAvailable => "NOT_AVAILABLE",
        }
    }
}

impl std::str::FromStr for FlowMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "SMALL_TALK" => Ok(Self::SmallTalk),
            "FOLLOWUP_QA" => Ok(Self::FollowupQa),
            "MORE_PRODUCTS" => Ok(Self::MoreProducts),
            "NEW_PRODUCT" => Ok(Self::NewProduct),
            "NOT_AVAILABLE" => Ok(Self::NotAvailable),
            other => Err(format!("unrecognized flow mode `{other}`")),
        }
    }
}

/// One persisted message in the conversation log. Append-only; `id` is the
/// monotonic insertion sequence and the sole ordering invariant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub id: i64,
    pub role: Role,
    pub content: String,
    pub product: Option<Product>,
    pub candidates: Option<Vec<Product>>,
    pub mode: Option<FlowMode>,
    pub created_at: DateTime<Utc>,
}

/// A turn about to be appended; the store assigns `id` and `created_at`.
#[derive(Clone, Debug)]
pub struct NewTurn {
    pub role: Role,
    pub content: String,
    pub product: Option<Product>,
    pub candidates: Option<Vec<Product>>,
    pub mode: Option<FlowMode>,
}

impl NewTurn {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into(), product: None, candidates: None, mode: None }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn with_product(mut self, product: Product) -> Self {
        self.product = Some(product);
        self
    }

    pub fn with_candidates(mut self, candidates: Vec<Product>) -> Self {
        self.candidates = Some(candidates);
        self
    }

    pub fn with_mode(mut self, mode: FlowMode) -> Self {
        self.mode = Some(mode);
        self
    }
}

/// Derived per-request view of the turn log. Computed fresh on every advise
/// call; nothing here persists across requests beyond the log itself.
#[derive(Clone, Debug, Default)]
pub struct ConversationContext {
    pub last_product: Option<Product>,
    pub last_candidate_ids: Option<Vec<String>>,
    /// Bounded window, oldest-first.
    pub recent_turns: Vec<(Role, String)>,
}

impl ConversationContext {
    pub fn has_last_product(&self) -> bool {
        self.last_product.is_some()
    }

    pub fn has_last_candidates(&self) -> bool {
        self.last_candidate_ids.as_ref().is_some_and(|ids| !ids.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::FlowMode;

    #[test]
    fn flow_mode_round_trips_through_wire_names() {
        for mode in [
            FlowMode::SmallTalk,
            FlowMode::FollowupQa,
            FlowMode::MoreProducts,
            FlowMode::NewProduct,
            FlowMode::NotAvailable,
        ] {
            assert_eq!(FlowMode::from_str(mode.as_str()), Ok(mode));
        }
    }

    #[test]
    fn unknown_mode_is_rejected_not_defaulted() {
        assert!(FlowMode::from_str("BROWSE").is_err());
        assert!(FlowMode::from_str("").is_err());
    }
}
