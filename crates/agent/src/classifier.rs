use std::str::FromStr;
use std::sync::Arc;

use serde_json::json;
use tracing::info;

use shopmate_core::domain::conversation::{ConversationContext, FlowMode};
use shopmate_core::text::extract_json;
use shopmate_core::AdvisorError;

use crate::llm::{ChatMessage, ChatModel};

const CLASSIFIER_SYSTEM: &str = "You are a supervisor agent deciding conversation flow for a \
    product advisor. Pick EXACTLY one: SMALL_TALK | FOLLOWUP_QA | MORE_PRODUCTS | NEW_PRODUCT | \
    NOT_AVAILABLE. Definitions: \
    - SMALL_TALK: greetings/thanks/chit-chat; respond politely and ask what product the user is looking for. \
    - FOLLOWUP_QA: user asks about the SAME last recommended product (price/specs/features/details about 'it'/'this'/'that product'). \
    - MORE_PRODUCTS: user asks for more/similar/alternatives/better options of the SAME product type/category as the last recommendation. \
    - NEW_PRODUCT: user asks for a DIFFERENT product type/category/use case than the last recommended product, OR mentions a specific different product name/brand, OR asks for a product for a different body part/purpose. \
    - NOT_AVAILABLE: requested product/category is not available in the catalog. \
    IMPORTANT RULES: \
    - If last product was a 'neck massager' and user asks for 'leg massager' -> NEW_PRODUCT (different body part) \
    - If last product was an 'ECG device' and user asks for 'massager' -> NEW_PRODUCT (completely different category) \
    - If last product was a 'massager' and user asks for 'better massager' -> MORE_PRODUCTS (same category) \
    - If user asks for product for different body part/purpose than last product -> NEW_PRODUCT \
    Return JSON only: {\"mode\":\"...\",\"reason\":\"...\"}";

/// Few-shot flow classifier. Decides which of the five conversation branches
/// the current query belongs to, given a compact summary of the turn log.
pub struct FlowClassifier {
    model: Arc<dyn ChatModel>,
}

impl FlowClassifier {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    pub async fn classify(
        &self,
        user_query: &str,
        context: &ConversationContext,
    ) -> Result<FlowMode, AdvisorError> {
        let mut input = json!({
            "user_query": user_query,
            "has_last_product": context.has_last_product(),
            "has_last_candidates": context.has_last_candidates(),
        });
        if let Some(product) = &context.last_product {
            input["last_product"] = json!({
                "category": product.category,
                "product_name": product.name,
            });
        }
        if !context.recent_turns.is_empty() {
            input["recent_messages"] = json!(context
                .recent_turns
                .iter()
                .map(|(role, content)| json!({"role": role.as_str(), "content": content}))
                .collect::<Vec<_>>());
        }

        let mut messages = few_shot_prelude();
        messages.push(ChatMessage::user(input.to_string()));

        let raw = self.model.complete(&messages, 0.0).await?;
        let value = extract_json(&raw).ok_or_else(|| AdvisorError::MalformedModelOutput {
            context: "flow classification",
            detail: format!("no JSON object in model output: {raw}"),
        })?;

        let mode_text = value.get("mode").and_then(|mode| mode.as_str()).ok_or_else(|| {
            AdvisorError::MalformedModelOutput {
                context: "flow classification",
                detail: "missing mode field".to_owned(),
            }
        })?;
        let mode = FlowMode::from_str(mode_text).map_err(|detail| {
            AdvisorError::MalformedModelOutput { context: "flow classification", detail }
        })?;

        let reason = value.get("reason").and_then(|reason| reason.as_str()).unwrap_or_default();
        info!(mode = mode.as_str(), reason, "classifier.decision");
        Ok(mode)
    }
}

/// System prompt plus seven worked examples, ending just before the live
/// input. The examples pin down the body-part and category distinctions the
/// model tends to get wrong otherwise.
fn few_shot_prelude() -> Vec<ChatMessage> {
    let example = |query: &str, has_product: bool, has_candidates: bool, last: Option<(&str, &str)>| {
        let mut input = json!({
            "user_query": query,
            "has_last_product": has_product,
            "has_last_candidates": has_candidates,
        });
        if let Some((category, name)) = last {
            input["last_product"] = json!({"category": category, "product_name": name});
        }
        ChatMessage::user(input.to_string())
    };
    let wellness = "Healthtech and Wellness";

    vec![
        ChatMessage::system(CLASSIFIER_SYSTEM),
        example("hi", false, false, None),
        ChatMessage::assistant(r#"{"mode":"SMALL_TALK","reason":"greeting"}"#),
        example("is there something better?", true, true, Some((wellness, "Neck Massager"))),
        ChatMessage::assistant(
            r#"{"mode":"MORE_PRODUCTS","reason":"asking for better alternatives of same product type"}"#,
        ),
        example("and a leg massager?", true, true, Some((wellness, "Neck Massager"))),
        ChatMessage::assistant(
            r#"{"mode":"NEW_PRODUCT","reason":"asking for different body part massager - leg vs neck"}"#,
        ),
        example("a massager for leg", true, true, Some((wellness, "Portable ECG Device"))),
        ChatMessage::assistant(
            r#"{"mode":"NEW_PRODUCT","reason":"asking for massager when last product was ECG device - different product category"}"#,
        ),
        example("what is the price?", true, false, None),
        ChatMessage::assistant(
            r#"{"mode":"FOLLOWUP_QA","reason":"asking about price of last recommended product"}"#,
        ),
        example("I need a foot massager", false, false, None),
        ChatMessage::assistant(r#"{"mode":"NEW_PRODUCT","reason":"new product request"}"#),
        example("And a neck massager?", true, true, Some((wellness, "Revive Foot & Leg Massager"))),
        ChatMessage::assistant(
            r#"{"mode":"NEW_PRODUCT","reason":"asking for different body part massager - neck vs foot/leg"}"#,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use rust_decimal::Decimal;

    use shopmate_core::domain::conversation::{ConversationContext, FlowMode, Role};
    use shopmate_core::domain::product::{Product, ProductId};
    use shopmate_core::AdvisorError;

    use super::FlowClassifier;
    use crate::llm::{ChatMessage, ChatModel, LlmError, TokenStream};

    /// Replays a canned response and records the final user message it saw.
    struct RecordingModel {
        response: String,
        last_input: Mutex<Option<String>>,
    }

    impl RecordingModel {
        fn new(response: &str) -> Self {
            Self { response: response.to_owned(), last_input: Mutex::new(None) }
        }
    }

    #[async_trait]
    impl ChatModel for RecordingModel {
        async fn complete(
            &self,
            messages: &[ChatMessage],
            _temperature: f32,
        ) -> Result<String, LlmError> {
            let last = messages.last().map(|message| message.content.clone());
            *self.last_input.lock().unwrap() = last;
            Ok(self.response.clone())
        }

        async fn stream(
            &self,
            _messages: &[ChatMessage],
            _temperature: f32,
        ) -> Result<TokenStream, LlmError> {
            unimplemented!("classifier never streams")
        }
    }

    fn context_with_product() -> ConversationContext {
        ConversationContext {
            last_product: Some(Product {
                id: ProductId("prod-neck-massager".to_owned()),
                brand: "Relaxo".to_owned(),
                name: "Neck Massager".to_owned(),
                price: Decimal::new(6999, 2),
                category: "Healthtech and Wellness".to_owned(),
                description: "Shiatsu neck massager".to_owned(),
            }),
            last_candidate_ids: Some(vec!["a".to_owned(), "b".to_owned()]),
            recent_turns: vec![
                (Role::User, "I need a neck massager".to_owned()),
                (Role::Assistant, "I recommend the Neck Massager.".to_owned()),
            ],
        }
    }

    #[test]
    fn prelude_pins_the_body_part_and_same_category_examples() {
        let prelude = super::few_shot_prelude();
        assert_eq!(prelude[0].role, "system");

        fn pair_for<'a>(prelude: &'a [ChatMessage], query: &str) -> &'a str {
            let position = prelude
                .iter()
                .position(|message| message.role == "user" && message.content.contains(query))
                .unwrap_or_else(|| panic!("no worked example for {query:?}"));
            &prelude[position + 1].content
        }

        // Leg after a neck massager is a different body part, not a variant.
        let leg = pair_for(&prelude, "and a leg massager?");
        assert!(leg.contains("NEW_PRODUCT"), "got {leg}");
        // "Better" stays within the same category.
        let better = pair_for(&prelude, "is there something better?");
        assert!(better.contains("MORE_PRODUCTS"), "got {better}");
    }

    #[tokio::test]
    async fn parses_mode_from_wrapped_json() {
        let model = Arc::new(RecordingModel::new(
            r#"Sure: {"mode":"MORE_PRODUCTS","reason":"alternatives"} done"#,
        ));
        let classifier = FlowClassifier::new(model);
        let mode = classifier
            .classify("is there something better?", &context_with_product())
            .await
            .expect("mode");
        assert_eq!(mode, FlowMode::MoreProducts);
    }

    #[tokio::test]
    async fn live_input_carries_context_flags_and_history() {
        let model = Arc::new(RecordingModel::new(r#"{"mode":"FOLLOWUP_QA","reason":"price"}"#));
        let classifier = FlowClassifier::new(Arc::clone(&model) as Arc<dyn ChatModel>);
        classifier.classify("what is the price?", &context_with_product()).await.expect("mode");

        let raw = model.last_input.lock().unwrap().clone().expect("input recorded");
        let input: serde_json::Value = serde_json::from_str(&raw).expect("input is JSON");
        assert_eq!(input["user_query"], "what is the price?");
        assert_eq!(input["has_last_product"], true);
        assert_eq!(input["has_last_candidates"], true);
        assert_eq!(input["last_product"]["product_name"], "Neck Massager");
        assert_eq!(input["recent_messages"][0]["role"], "user");
    }

    #[tokio::test]
    async fn fresh_context_omits_the_optional_fields() {
        let model = Arc::new(RecordingModel::new(r#"{"mode":"NEW_PRODUCT","reason":"new"}"#));
        let classifier = FlowClassifier::new(Arc::clone(&model) as Arc<dyn ChatModel>);
        classifier
            .classify("I need a foot massager", &ConversationContext::default())
            .await
            .expect("mode");

        let raw = model.last_input.lock().unwrap().clone().expect("input recorded");
        let input: serde_json::Value = serde_json::from_str(&raw).expect("input is JSON");
        assert_eq!(input["has_last_product"], false);
        assert!(input.get("last_product").is_none());
        assert!(input.get("recent_messages").is_none());
    }

    #[tokio::test]
    async fn unrecognized_mode_is_a_malformed_output_fault() {
        let model = Arc::new(RecordingModel::new(r#"{"mode":"BROWSE","reason":"?"}"#));
        let classifier = FlowClassifier::new(model);
        let error = classifier
            .classify("show me stuff", &ConversationContext::default())
            .await
            .err()
            .expect("unknown mode must fault");
        assert!(matches!(error, AdvisorError::MalformedModelOutput { .. }));
    }

    #[tokio::test]
    async fn missing_mode_field_is_a_malformed_output_fault() {
        let model = Arc::new(RecordingModel::new(r#"{"reason":"forgot the mode"}"#));
        let classifier = FlowClassifier::new(model);
        let error = classifier
            .classify("hi", &ConversationContext::default())
            .await
            .err()
            .expect("missing mode must fault");
        assert!(matches!(
            error,
            AdvisorError::MalformedModelOutput { context: "flow classification", .. }
        ));
    }
}
