//! Session state machine and the state shared with the assistant view.
//!
//! [`SessionState`] drives the controller's state machine.  The UI reads it
//! via [`SharedAssistant`] to render the call button.
//!
//! [`AssistantState`] is the single source of truth for everything the
//! assistant view needs besides the store: session phase, chat log, the last
//! confirmed order and a one-line notice.
//!
//! [`SharedAssistant`] is a type alias for `Arc<Mutex<AssistantState>>`.

use std::sync::{Arc, Mutex};

use crate::chat::ChatLog;
use crate::store::Order;

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Phases of a conversation session.
///
/// ```text
/// Idle ──open──▶ Connecting ──setupComplete──▶ Active
///                    │                           │
///                    ├──connect/setup failure────┼──▶ Idle
///                    │                           │
///                    └──────close / timeout──────┴──▶ Closing ──▶ Idle
/// Active ──channel closed──▶ Idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No connection.
    #[default]
    Idle,
    /// Handshake or setup in progress.
    Connecting,
    /// Setup acknowledged; input and output are flowing.
    Active,
    /// A close has been requested and is being carried out.
    Closing,
}

impl SessionState {
    /// Returns `true` from the moment a session is requested until it is
    /// fully torn down.
    ///
    /// ```
    /// use zamzami_assistant::session::SessionState;
    ///
    /// assert!(!SessionState::Idle.is_busy());
    /// assert!(SessionState::Connecting.is_busy());
    /// assert!(SessionState::Active.is_busy());
    /// assert!(SessionState::Closing.is_busy());
    /// ```
    pub fn is_busy(&self) -> bool {
        !matches!(self, SessionState::Idle)
    }

    /// Short Arabic label for the status line.
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Idle => "غير متصل",
            SessionState::Connecting => "جاري الاتصال...",
            SessionState::Active => "متصل",
            SessionState::Closing => "جاري إنهاء المحادثة...",
        }
    }
}

// ---------------------------------------------------------------------------
// AssistantState
// ---------------------------------------------------------------------------

/// State read by the assistant view every frame.
#[derive(Debug, Default)]
pub struct AssistantState {
    pub session: SessionState,
    pub chat: ChatLog,
    /// The order captured most recently in this session, shown as a card.
    pub last_order: Option<Order>,
    /// `true` while microphone frames are being streamed.
    pub capturing: bool,
    /// Transient status text (connection problems, timeouts).
    pub notice: Option<String>,
}

impl AssistantState {
    pub fn new() -> Self {
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// SharedAssistant
// ---------------------------------------------------------------------------

/// Thread-safe handle to [`AssistantState`].
///
/// Lock for a short critical section; do **not** hold the lock across
/// `.await` points.
pub type SharedAssistant = Arc<Mutex<AssistantState>>;

pub fn new_shared_assistant() -> SharedAssistant {
    Arc::new(Mutex::new(AssistantState::new()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
