//! Manager-level events, re-emitted for in-process observers.

use zapdesk_core::types::InboundMessage;

/// Events broadcast by the session manager after it has applied a transport event.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    PairingCode(String),
    Authenticated,
    Ready,
    AuthFailure(String),
    Disconnected(String),
    Message(InboundMessage),
}

impl SessionEvent {
    /// Short event name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::PairingCode(_) => "pairing_code",
            Self::Authenticated => "authenticated",
            Self::Ready => "ready",
            Self::AuthFailure(_) => "auth_failure",
            Self::Disconnected(_) => "disconnected",
            Self::Message(_) => "message",
        }
    }
}
