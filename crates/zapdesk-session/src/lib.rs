//! Zapdesk Session: lifecycle of the outbound WhatsApp client.
//!
//! This crate provides:
//! - **transport**: the `MessagingClient` / `ClientFactory` seam over the underlying client
//! - **manager**: `SessionManager`: connect → pair → ready → disconnect state machine
//! - **global**: the process-wide session slot
//! - **addressing**: destination normalization into WhatsApp chat ids
//! - **bridge**: WebSocket client for the Node.js WhatsApp Web bridge (feature `bridge`)

pub mod addressing;
pub mod error;
pub mod events;
pub mod global;
pub mod manager;
pub mod transport;

#[cfg(feature = "bridge")]
pub mod bridge;

pub use error::{SessionError, TransportError};
pub use events::SessionEvent;
pub use manager::{HandlerId, MessageHandlerFn, SessionManager, SessionSettings};
pub use transport::{ClientFactory, ClientOptions, EventSender, MessagingClient, TransportEvent};
