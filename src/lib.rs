//! Zamzami ordering assistant.
//!
//! A desktop voice/text agent for a medical-supplies retailer, backed by a
//! hosted realtime conversational model, plus a back-office dashboard for
//! the orders it records.
//!
//! ```text
//!  microphone ─▶ audio::capture ─▶ session::controller ◀─▶ live (WebSocket)
//!                                        │      │
//!  speakers  ◀─ audio::playback ◀────────┘      └─▶ store (orders, settings)
//!                                                        ▲
//!  app (egui) ── SessionCommand ─▶ controller            │
//!       └──────────── admin dashboard / invoice ─────────┘
//! ```

pub mod app;
pub mod audio;
pub mod chat;
pub mod config;
pub mod fonts;
pub mod invoice;
pub mod live;
pub mod order;
pub mod session;
pub mod store;
