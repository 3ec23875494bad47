//! Conversation log shown in the assistant view.
//!
//! [`ChatLog`] is a small reducer over [`ChatEvent`]s.  It keeps an explicit
//! "model turn open" flag so streaming transcript fragments of the same turn
//! concatenate onto the trailing model message, while a new turn (after a
//! user utterance, a notice or `turnComplete`) starts a fresh bubble.
//!
//! ```text
//! UserUtterance ──▶ push user msg, close turn
//! ModelTranscript ─▶ turn open?  append to last model msg
//!                    otherwise   push model msg, open turn
//! Notice ─────────▶ push model msg, close turn
//! TurnComplete ───▶ close turn
//! ```

use chrono::{DateTime, Local};

// ---------------------------------------------------------------------------
// ChatMessage
// ---------------------------------------------------------------------------

/// Who produced a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

/// One bubble in the conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    /// Monotonic within a [`ChatLog`].
    pub id: u64,
    pub role: Role,
    pub text: String,
    pub created_at: DateTime<Local>,
}

// ---------------------------------------------------------------------------
// ChatEvent
// ---------------------------------------------------------------------------

/// Input to [`ChatLog::apply`].
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    /// Something the customer typed or tapped.
    UserUtterance(String),
    /// A partial output transcript of the model's speech.
    ModelTranscript(String),
    /// A complete, application-generated model message (e.g. order saved).
    Notice(String),
    /// The remote side finished its turn.
    TurnComplete,
}

// ---------------------------------------------------------------------------
// ChatLog
// ---------------------------------------------------------------------------

/// Ordered message log with turn boundaries.
#[derive(Debug, Default)]
pub struct ChatLog {
    messages: Vec<ChatMessage>,
    model_turn_open: bool,
    next_id: u64,
}

impl ChatLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// `true` while transcript fragments still extend the last message.
    pub fn model_turn_open(&self) -> bool {
        self.model_turn_open
    }

    pub fn apply(&mut self, event: ChatEvent) {
        match event {
            ChatEvent::UserUtterance(text) => {
                self.model_turn_open = false;
                self.push(Role::User, text);
            }
            ChatEvent::ModelTranscript(fragment) => {
                if fragment.is_empty() {
                    return;
                }
                match self.messages.last_mut() {
                    Some(last) if self.model_turn_open && last.role == Role::Model => {
                        last.text.push_str(&fragment);
                    }
                    _ => {
                        self.push(Role::Model, fragment);
                        self.model_turn_open = true;
                    }
                }
            }
            ChatEvent::Notice(text) => {
                self.model_turn_open = false;
                self.push(Role::Model, text);
            }
            ChatEvent::TurnComplete => {
                self.model_turn_open = false;
            }
        }
    }

    fn push(&mut self, role: Role, text: String) {
        self.messages.push(ChatMessage {
            id: self.next_id,
            role,
            text,
            created_at: Local::now(),
        });
        self.next_id += 1;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
