//! Client for the hosted realtime conversational endpoint.
//!
//! - [`protocol`] — client message builders and the server frame parser.
//! - [`tools`] — the `recordOrder` function declaration.
//! - [`transport`] — the [`LiveConnector`] / [`LiveSink`] seam and the
//!   WebSocket implementation.

pub mod protocol;
pub mod tools;
pub mod transport;

pub use protocol::{parse_server_message, FunctionCall, ServerEvent};
pub use tools::{RECORD_ORDER, RECORD_ORDER_RESULT};
pub use transport::{Inbound, LiveConnection, LiveConnector, LiveError, LiveSink, WsConnector};
