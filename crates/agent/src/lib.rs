//! Conversation flow controller for the product advisor.
//!
//! This crate is the "brain" of shopmate. Given a shopping query and the
//! persisted conversation log, it:
//! - classifies intent into one of five flow modes (`classifier`)
//! - retrieves and filters semantic-search candidates (`retrieval`,
//!   `relevance`)
//! - asks the language model to pick or veto a best match (`selector`)
//! - streams a rationale back to the caller and persists the turn
//!   (`advisor`)
//!
//! # Key Types
//!
//! - `Advisor` - the orchestrator; one `advise` call per incoming query
//! - `ChatModel` - pluggable LLM seam (OpenAI-compatible HTTP in `openai`)
//! - `VectorIndex` - pluggable semantic-search seam (`search`)
//!
//! # Design Principle
//!
//! The language model classifies and ranks; it never invents products. Every
//! recommended product id is resolved against the catalog before it reaches
//! the client, and malformed model output fails loudly instead of being
//! papered over with defaults.

pub mod advisor;
pub mod classifier;
pub mod llm;
pub mod openai;
pub mod relevance;
pub mod retrieval;
pub mod search;
pub mod selector;

pub use advisor::{Advisor, EventSink};
pub use classifier::FlowClassifier;
pub use llm::{ChatMessage, ChatModel, LlmError, TokenStream};
pub use openai::OpenAiChatModel;
pub use relevance::RelevanceFilter;
pub use retrieval::CandidateStore;
pub use search::{HttpVectorIndex, SearchError, VectorIndex};
pub use selector::Selector;
