use std::sync::Arc;

use futures::StreamExt;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{error, info};

use shopmate_core::config::AdvisorConfig;
use shopmate_core::domain::advice::{AdviceEvent, Stage};
use shopmate_core::domain::conversation::{ConversationContext, FlowMode, NewTurn};
use shopmate_core::AdvisorError;
use shopmate_db::repositories::ConversationRepository;

use crate::classifier::FlowClassifier;
use crate::llm::{ChatMessage, ChatModel};
use crate::relevance::RelevanceFilter;
use crate::retrieval::CandidateStore;
use crate::selector::Selector;

const SMALL_TALK_SYSTEM: &str =
    "You are a friendly assistant. Keep it brief. Ask what product the user is looking for.";
const FOLLOWUP_SYSTEM: &str = "Answer ONLY using provided selected_product fields. If unknown, \
    say you are not sure. Be concise.";
const COMPARE_SYSTEM: &str =
    "Briefly compare these alternatives to the previously suggested product. Be concise.";
const NOT_AVAILABLE_SYSTEM: &str = "Politely tell the user the requested product is not \
    available right now, and that it will be added soon. Ask if they want suggestions from \
    related categories.";
const RATIONALE_SYSTEM: &str =
    "Provide a concise rationale for why this product fits the user request.";

/// Outbound event channel for one advise call. Sends after the receiver is
/// dropped are deliberately ignored: a disconnected client does not abort
/// the pipeline, and the assistant turn is still persisted.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::Sender<AdviceEvent>,
}

impl EventSink {
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<AdviceEvent>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }

    pub async fn send(&self, event: AdviceEvent) {
        let _ = self.tx.send(event).await;
    }
}

/// The conversation flow controller. One `advise` call per incoming query;
/// every call terminates the sink with exactly one `Final` or `Error` event.
pub struct Advisor {
    model: Arc<dyn ChatModel>,
    store: CandidateStore,
    conversation: Arc<dyn ConversationRepository>,
    classifier: FlowClassifier,
    selector: Selector,
    filter: RelevanceFilter,
    recent_turns: usize,
}

impl Advisor {
    pub fn new(
        model: Arc<dyn ChatModel>,
        store: CandidateStore,
        conversation: Arc<dyn ConversationRepository>,
        config: &AdvisorConfig,
    ) -> Self {
        Self {
            classifier: FlowClassifier::new(Arc::clone(&model)),
            selector: Selector::new(Arc::clone(&model)),
            filter: RelevanceFilter::new(config.min_score, config.top_k),
            model,
            store,
            conversation,
            recent_turns: config.recent_turns,
        }
    }

    /// Drives one query and reports every fault as a single terminal Error
    /// event; the sink always receives a terminal event.
    pub async fn advise(&self, query: &str, sink: &EventSink) {
        if let Err(fault) = self.run(query, sink).await {
            error!(error = %fault, "advice.error");
            sink.send(AdviceEvent::Error { message: fault.user_message() }).await;
        }
    }

    /// Spawned variant for callers that consume a receiver (SSE handler,
    /// CLI). The task owns the advisor for its whole run.
    pub fn advise_stream(self: Arc<Self>, query: String) -> mpsc::Receiver<AdviceEvent> {
        let (sink, rx) = EventSink::channel(32);
        tokio::spawn(async move {
            self.advise(&query, &sink).await;
        });
        rx
    }

    async fn run(&self, query: &str, sink: &EventSink) -> Result<(), AdvisorError> {
        self.conversation.append_turn(NewTurn::user(query)).await?;
        let context = self.load_context().await?;
        info!(
            query,
            has_last_product = context.has_last_product(),
            has_last_candidates = context.has_last_candidates(),
            "advice.context"
        );

        let mut mode = self.classifier.classify(query, &context).await?;
        // The classifier is advisory: context-dependent modes without the
        // context they need fall through to NEW_PRODUCT.
        if matches!(mode, FlowMode::FollowupQa | FlowMode::MoreProducts)
            && !context.has_last_product()
        {
            info!(requested = mode.as_str(), "advice.reroute");
            mode = FlowMode::NewProduct;
        }
        info!(mode = mode.as_str(), "advice.mode");
        sink.send(AdviceEvent::progress_with_mode(Stage::Retrieving, mode)).await;

        match mode {
            FlowMode::SmallTalk => self.small_talk(query, sink).await,
            FlowMode::FollowupQa => self.followup(query, &context, sink).await,
            FlowMode::MoreProducts => self.more_products(&context, sink).await,
            FlowMode::NewProduct => self.new_product(query, sink).await,
            FlowMode::NotAvailable => self.not_available(query, sink).await,
        }
    }

    async fn load_context(&self) -> Result<ConversationContext, AdvisorError> {
        Ok(ConversationContext {
            last_product: self.conversation.last_assistant_product().await?,
            last_candidate_ids: self.conversation.last_assistant_candidate_ids().await?,
            recent_turns: self.conversation.recent_turns(self.recent_turns).await?,
        })
    }

    async fn small_talk(&self, query: &str, sink: &EventSink) -> Result<(), AdvisorError> {
        sink.send(AdviceEvent::progress(Stage::Reasoning)).await;
        let reply = self
            .stream_reply(
                &[ChatMessage::system(SMALL_TALK_SYSTEM), ChatMessage::user(query)],
                0.7,
                sink,
            )
            .await?;
        self.conversation.append_turn(NewTurn::assistant(&reply)).await?;
        sink.send(AdviceEvent::Final { rationale: reply, product: None, candidates: None }).await;
        Ok(())
    }

    async fn followup(
        &self,
        query: &str,
        context: &ConversationContext,
        sink: &EventSink,
    ) -> Result<(), AdvisorError> {
        let product = context
            .last_product
            .clone()
            .ok_or(AdvisorError::MissingPrecondition { mode: FlowMode::FollowupQa })?;

        sink.send(AdviceEvent::progress(Stage::Reasoning)).await;
        let payload = json!({
            "user_query": query,
            "selected_product": product,
            "recent_messages": context
                .recent_turns
                .iter()
                .map(|(role, content)| json!({"role": role.as_str(), "content": content}))
                .collect::<Vec<_>>(),
        });
        let reply = self
            .stream_reply(
                &[ChatMessage::system(FOLLOWUP_SYSTEM), ChatMessage::user(payload.to_string())],
                0.0,
                sink,
            )
            .await?;
        // The recommendation is unchanged, so the product carries forward.
        self.conversation
            .append_turn(NewTurn::assistant(&reply).with_product(product.clone()))
            .await?;
        sink.send(AdviceEvent::Final {
            rationale: reply,
            product: Some(product),
            candidates: None,
        })
        .await;
        Ok(())
    }

    async fn more_products(
        &self,
        context: &ConversationContext,
        sink: &EventSink,
    ) -> Result<(), AdvisorError> {
        let last_product = context
            .last_product
            .clone()
            .ok_or(AdvisorError::MissingPrecondition { mode: FlowMode::MoreProducts })?;

        // Stored candidate ids are a cache of the previous retrieval; only
        // recompute when the cache is empty.
        let base_ids = match &context.last_candidate_ids {
            Some(ids) if !ids.is_empty() => ids.clone(),
            _ => {
                let scoped = format!("{} {}", last_product.category, last_product.name);
                self.store
                    .top_by_query(&scoped, 3)
                    .await?
                    .into_iter()
                    .map(|product| product.id.0)
                    .collect()
            }
        };
        let remaining_ids: Vec<String> =
            base_ids.into_iter().filter(|id| *id != last_product.id.0).take(2).collect();
        let candidates = self.store.by_ids(&remaining_ids).await?;
        info!(ids = ?remaining_ids, "advice.more_products.candidates");

        sink.send(AdviceEvent::progress(Stage::Reasoning)).await;
        let payload = json!({ "previous_product": last_product, "candidates": candidates });
        let rationale = self
            .stream_reply(
                &[ChatMessage::system(COMPARE_SYSTEM), ChatMessage::user(payload.to_string())],
                0.0,
                sink,
            )
            .await?;
        self.conversation
            .append_turn(NewTurn::assistant(&rationale).with_candidates(candidates.clone()))
            .await?;
        sink.send(AdviceEvent::Final {
            rationale,
            product: None,
            candidates: Some(candidates),
        })
        .await;
        Ok(())
    }

    async fn new_product(&self, query: &str, sink: &EventSink) -> Result<(), AdvisorError> {
        sink.send(AdviceEvent::progress(Stage::FetchingProduct)).await;

        let mut candidates = self.filter.filter(&self.store, query).await?;
        if candidates.is_empty() {
            candidates = self.store.top_by_query(query, self.filter.top_k).await?;
        }
        if candidates.is_empty() {
            return self.not_available(query, sink).await;
        }

        let verdict = self.selector.select_or_reject(query, &candidates).await?;
        if verdict.is_not_available() {
            return self.not_available(query, sink).await;
        }
        // The veto confirmed the set; the recommendation is the top-ranked
        // survivor.
        let product = candidates[0].clone();
        info!(product_id = %product.id.0, "advice.new_product.pick");

        sink.send(AdviceEvent::progress(Stage::Reasoning)).await;
        let payload = json!({ "user_query": query, "selected_product": product });
        let rationale = self
            .stream_reply(
                &[ChatMessage::system(RATIONALE_SYSTEM), ChatMessage::user(payload.to_string())],
                0.0,
                sink,
            )
            .await?;
        self.conversation
            .append_turn(
                NewTurn::assistant(&rationale)
                    .with_product(product.clone())
                    .with_candidates(candidates.clone()),
            )
            .await?;
        sink.send(AdviceEvent::Final {
            rationale,
            product: Some(product),
            candidates: Some(candidates),
        })
        .await;
        Ok(())
    }

    async fn not_available(&self, query: &str, sink: &EventSink) -> Result<(), AdvisorError> {
        sink.send(AdviceEvent::progress(Stage::Reasoning)).await;
        let reply = self
            .stream_reply(
                &[ChatMessage::system(NOT_AVAILABLE_SYSTEM), ChatMessage::user(query)],
                0.7,
                sink,
            )
            .await?;
        self.conversation.append_turn(NewTurn::assistant(&reply)).await?;
        sink.send(AdviceEvent::Final { rationale: reply, product: None, candidates: None }).await;
        Ok(())
    }

    /// Streams one completion to the sink as Token events while accumulating
    /// the full text for persistence.
    async fn stream_reply(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        sink: &EventSink,
    ) -> Result<String, AdvisorError> {
        let mut stream = self.model.stream(messages, temperature).await?;
        let mut reply = String::new();
        while let Some(chunk) = stream.next().await {
            let token = chunk?;
            if token.is_empty() {
                continue;
            }
            reply.push_str(&token);
            sink.send(AdviceEvent::Token { token }).await;
        }
        Ok(reply)
    }
}
