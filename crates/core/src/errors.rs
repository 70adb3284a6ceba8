use thiserror::Error;

use crate::domain::conversation::FlowMode;

/// Faults that can surface while driving one advise request.
///
/// `MissingPrecondition` is recovered internally (silent re-route to
/// NEW_PRODUCT); everything else escapes the branch and is converted into a
/// single terminal error event by the top-level handler. Nothing here is
/// retried transparently.
#[derive(Debug, Error)]
pub enum AdvisorError {
    #[error("malformed model output during {context}: {detail}")]
    MalformedModelOutput { context: &'static str, detail: String },
    #[error("mode {mode:?} requires a prior recommendation")]
    MissingPrecondition { mode: FlowMode },
    #[error("language model call failed: {0}")]
    Llm(String),
    #[error("semantic search call failed: {0}")]
    Search(String),
    #[error("conversation store failure: {0}")]
    Repository(String),
}

impl AdvisorError {
    /// Message safe to send to the client in a terminal error event; internal
    /// detail stays in the logs.
    pub fn user_message(&self) -> String {
        match self {
            Self::MalformedModelOutput { .. } => {
                "The advisor could not interpret the model output.".to_owned()
            }
            Self::MissingPrecondition { .. } => {
                "The request could not be processed in its current context.".to_owned()
            }
            Self::Llm(_) | Self::Search(_) | Self::Repository(_) => {
                "A backend service is temporarily unavailable. Please retry shortly.".to_owned()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::AdvisorError;
    use crate::domain::conversation::FlowMode;

    #[test]
    fn malformed_output_names_the_call_site() {
        let error = AdvisorError::MalformedModelOutput {
            context: "flow classification",
            detail: "missing mode field".to_owned(),
        };
        assert!(error.to_string().contains("flow classification"));
        assert!(error.to_string().contains("missing mode field"));
    }

    #[test]
    fn user_messages_do_not_leak_internal_detail() {
        let error = AdvisorError::Repository("sqlite disk I/O error at offset 4096".to_owned());
        assert!(!error.user_message().contains("sqlite"));

        let precondition = AdvisorError::MissingPrecondition { mode: FlowMode::FollowupQa };
        assert!(!precondition.user_message().contains("FOLLOWUP"));
    }
}
