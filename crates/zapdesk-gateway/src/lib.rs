//! Zapdesk Gateway: HTTP facade over the WhatsApp session.
//!
//! This crate provides:
//! - **routes**: the `/api/whatsapp` axum router
//! - **qr**: pairing code rendering (SVG data URLs and terminal art)
//! - **error**: `ApiError`, mapped to `{"error": ...}` JSON responses

pub mod error;
pub mod qr;
pub mod routes;

use std::future::Future;

use tokio::net::TcpListener;
use tracing::info;

use zapdesk_session::SessionManager;

pub use error::ApiError;
pub use routes::{router, AppState, API_PREFIX};

/// Serve the API on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, session: SessionManager, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(AppState::new(session));

    if let Ok(addr) = listener.local_addr() {
        info!(addr = %addr, prefix = API_PREFIX, "whatsapp api listening");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
