pub mod config;
pub mod domain;
pub mod errors;
pub mod text;

pub use domain::advice::{AdviceEvent, Stage};
pub use domain::conversation::{
    ConversationContext, ConversationTurn, FlowMode, NewTurn, Role,
};
pub use domain::product::{Product, ProductId};
pub use domain::selection::{Selection, SelectionVerdict, SimilarityMatch};
pub use errors::AdvisorError;
