//! Process-wide session registry.
//!
//! Exactly one WhatsApp session exists per process, shared by every caller
//! (HTTP handlers, CLI commands). The first caller decides how it is built.

use std::sync::OnceLock;

use tracing::debug;

use crate::manager::SessionManager;

/// Name under which the shared session is registered.
pub const GLOBAL_SESSION_KEY: &str = "whatsapp-session";

static GLOBAL_SESSION: OnceLock<SessionManager> = OnceLock::new();

/// Return the process-wide session, building it with `init` on first use.
///
/// Later calls ignore `init` and return a clone of the same manager.
pub fn session_or_init<F>(init: F) -> SessionManager
where
    F: FnOnce() -> SessionManager,
{
    GLOBAL_SESSION
        .get_or_init(|| {
            debug!(key = GLOBAL_SESSION_KEY, "creating global session manager");
            init()
        })
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::error::TransportError;
    use crate::manager::SessionSettings;
    use crate::transport::{ClientFactory, ClientOptions, EventSender, MessagingClient};

    struct NoopFactory;

    impl ClientFactory for NoopFactory {
        fn create(
            &self,
            _options: &ClientOptions,
            _events: EventSender,
        ) -> Result<Arc<dyn MessagingClient>, TransportError> {
            Err(TransportError::NotStarted)
        }
    }

    fn build(country_code: &str) -> SessionManager {
        SessionManager::new(
            Arc::new(NoopFactory),
            ClientOptions::default(),
            SessionSettings {
                default_country_code: country_code.to_string(),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_single_instance_per_process() {
        let first = session_or_init(|| build("55"));
        let second = session_or_init(|| build("351"));

        assert_eq!(second.settings().default_country_code, "55");
        assert_eq!(
            first.settings().default_country_code,
            second.settings().default_country_code
        );
    }
}
