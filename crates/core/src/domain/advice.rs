use serde::{Deserialize, Serialize};

use crate::domain::conversation::FlowMode;
use crate::domain::product::Product;

/// Progress checkpoints emitted while a request moves through the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Retrieving,
    FetchingProduct,
    Reasoning,
}

/// Events streamed back to the client for one advise call. Every stream
/// carries exactly one terminal event (`Final` or `Error`) and then closes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AdviceEvent {
    Progress {
        stage: Stage,
        #[serde(skip_serializing_if = "Option::is_none")]
        mode: Option<FlowMode>,
    },
    Token {
        token: String,
    },
    Final {
        rationale: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        product: Option<Product>,
        #[serde(skip_serializing_if = "Option::is_none")]
        candidates: Option<Vec<Product>>,
    },
    Error {
        message: String,
    },
}

impl AdviceEvent {
    pub fn progress(stage: Stage) -> Self {
        Self::Progress { stage, mode: None }
    }

    pub fn progress_with_mode(stage: Stage, mode: FlowMode) -> Self {
        Self::Progress { stage, mode: Some(mode) }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Final { .. } | Self::Error { .. })
    }

    /// SSE event name on the wire, matching the client contract.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::Progress { .. } => "progress",
            Self::Token { .. } => "tokens",
            Self::Final { .. } => "final",
            Self::Error { .. } => "error",
        }
    }
}
