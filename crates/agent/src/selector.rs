use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::json;
use tracing::info;

use shopmate_core::domain::product::Product;
use shopmate_core::domain::selection::{Selection, SelectionVerdict};
use shopmate_core::text::extract_json;
use shopmate_core::AdvisorError;

use crate::llm::{ChatMessage, ChatModel};

const SELECT_BEST_SYSTEM: &str = "You are a product selection agent. From provided candidates \
    (id + description), select exactly one best_product_id for the user's query. Return strict \
    JSON: {best_product_id, rationale, rejected_reasons}.";

const VETO_SYSTEM: &str = "You are a strict product selector. From candidates, choose the single \
    best product ONLY if it truly matches the user request. If none match, return NOT AVAILABLE \
    instead of forcing a pick. Return STRICT JSON ONLY in one of the two shapes: \
    {\"best_product_id\":\"...\",\"rationale\":\"...\"} OR {\"not_available\":true,\"reason\":\"...\"}";

/// Model-driven candidate ranking. `select_best` forces a pick and faults on
/// malformed output; `select_or_reject` is the veto pass and degrades to an
/// explicit NotAvailable verdict instead.
pub struct Selector {
    model: Arc<dyn ChatModel>,
}

fn candidate_payload(candidates: &[Product]) -> serde_json::Value {
    json!(candidates
        .iter()
        .map(|c| {
            json!({
                "id": c.id.0,
                "brand": c.brand,
                "product_name": c.name,
                "price": c.price,
                "category": c.category,
                "description": c.description,
            })
        })
        .collect::<Vec<_>>())
}

impl Selector {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    pub async fn select_best(
        &self,
        query: &str,
        candidates: &[Product],
    ) -> Result<Selection, AdvisorError> {
        let payload = json!({
            "query": query,
            "candidates": candidate_payload(candidates),
            "instruction": "Pick the single best candidate. Keep rationale concise (<= 120 words).",
        });
        let messages =
            [ChatMessage::system(SELECT_BEST_SYSTEM), ChatMessage::user(payload.to_string())];

        let raw = self.model.complete(&messages, 0.0).await?;
        let value = extract_json(&raw).ok_or_else(|| AdvisorError::MalformedModelOutput {
            context: "forced selection",
            detail: format!("no JSON object in model output: {raw}"),
        })?;

        let product_id = value
            .get("best_product_id")
            .and_then(|id| id.as_str())
            .filter(|id| !id.is_empty());
        let rationale = value
            .get("rationale")
            .and_then(|rationale| rationale.as_str())
            .filter(|rationale| !rationale.is_empty());

        let (Some(product_id), Some(rationale)) = (product_id, rationale) else {
            return Err(AdvisorError::MalformedModelOutput {
                context: "forced selection",
                detail: "missing best_product_id or rationale".to_owned(),
            });
        };

        let rejected_reasons: BTreeMap<String, String> = value
            .get("rejected_reasons")
            .and_then(|reasons| reasons.as_object())
            .map(|reasons| {
                reasons
                    .iter()
                    .filter_map(|(id, reason)| {
                        reason.as_str().map(|reason| (id.clone(), reason.to_owned()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let selection = Selection {
            product_id: product_id.to_owned(),
            rationale: rationale.to_owned(),
            rejected_reasons,
        };
        info!(product_id = %selection.product_id, "selector.best");
        Ok(selection)
    }

    /// The veto pass. Malformed output is not a fault here: the designed
    /// fallback is `NotAvailable { reason: "no valid selection" }`.
    pub async fn select_or_reject(
        &self,
        query: &str,
        candidates: &[Product],
    ) -> Result<SelectionVerdict, AdvisorError> {
        let payload = json!({
            "query": query,
            "candidates": candidate_payload(candidates),
        });
        let messages = [ChatMessage::system(VETO_SYSTEM), ChatMessage::user(payload.to_string())];

        let raw = self.model.complete(&messages, 0.0).await?;
        let verdict = parse_verdict(&raw);
        match &verdict {
            SelectionVerdict::Picked { product_id, .. } => {
                info!(product_id = %product_id, "selector.veto.picked");
            }
            SelectionVerdict::NotAvailable { reason } => {
                info!(reason = %reason, "selector.veto.not_available");
            }
        }
        Ok(verdict)
    }
}

fn parse_verdict(raw: &str) -> SelectionVerdict {
    let Some(value) = extract_json(raw) else {
        return SelectionVerdict::NotAvailable { reason: "no valid selection".to_owned() };
    };

    if value.get("not_available").and_then(|flag| flag.as_bool()) == Some(true) {
        let reason = value
            .get("reason")
            .and_then(|reason| reason.as_str())
            .filter(|reason| !reason.is_empty())
            .unwrap_or("not suitable");
        return SelectionVerdict::NotAvailable { reason: reason.to_owned() };
    }

    if let Some(product_id) =
        value.get("best_product_id").and_then(|id| id.as_str()).filter(|id| !id.is_empty())
    {
        let rationale = value
            .get("rationale")
            .and_then(|rationale| rationale.as_str())
            .unwrap_or_default();
        return SelectionVerdict::Picked {
            product_id: product_id.to_owned(),
            rationale: rationale.to_owned(),
        };
    }

    SelectionVerdict::NotAvailable { reason: "no valid selection".to_owned() }
}
