//! Conversation session orchestration.
//!
//! # Modules
//!
//! - [`state`] — [`SessionState`] enum, [`AssistantState`] and
//!   [`SharedAssistant`].
//! - [`controller`] — [`SessionController`], the async loop that owns the
//!   connection, microphone and greeting logic.

pub mod controller;
pub mod state;

pub use controller::{SessionCommand, SessionController};
pub use state::{new_shared_assistant, AssistantState, SessionState, SharedAssistant};
