//! Conversation core: context assembly, the turn state machine, and the
//! ownership-scoped chat lifecycle. Storage and the language model are reached
//! through the [`store::ChatStore`] and [`model::ModelGateway`] seams.

pub mod context;
pub mod error;
pub mod model;
pub mod service;
pub mod store;
pub mod turn;

#[cfg(test)]
mod testing;

pub use error::{ChatError, ModelError};
pub use service::ChatService;
pub use turn::TurnOrchestrator;
