//! `zapdesk serve`: runs the HTTP API over the shared WhatsApp session.
//!
//! Startup sequence:
//! 1. Load config
//! 2. Create the global session (bridge-backed, not yet connected)
//! 3. Register an inbound-message logger
//! 4. Serve `/api/whatsapp` until Ctrl+C
//! 5. Disconnect the session on the way out

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;

use zapdesk_core::config::load_config;
use zapdesk_core::types::InboundMessage;

use crate::helpers;

/// Run the API server.
pub async fn run() -> Result<()> {
    helpers::print_banner("Gateway");

    // 1. Load config
    let config = load_config(None);

    // 2. Shared session; clients connect through GET /api/whatsapp/connect
    let session = helpers::build_session(&config);

    // 3. Inbound messages are only logged here
    session.register_message_handler(Arc::new(|msg: &InboundMessage| -> anyhow::Result<()> {
        info!(
            from = %msg.sender_number(),
            message_id = %msg.id,
            received_at = ?msg.received_at().map(|at| at.to_rfc3339()),
            kind = %msg.kind,
            is_group = msg.is_group,
            "whatsapp message received"
        );
        Ok(())
    }));

    // 4. Bind and serve
    let addr = config.gateway.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    println!("  Bridge:    {}", config.whatsapp.bridge_url);
    println!("  API:       http://{addr}{}", zapdesk_gateway::API_PREFIX);
    println!();
    println!("  Ctrl+C to stop");
    println!();

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        println!();
        println!("  Shutting down...");
    };

    zapdesk_gateway::serve(listener, session.clone(), shutdown)
        .await
        .context("api server failed")?;

    // 5. Release the browser session
    session.disconnect().await;

    println!("  Gateway stopped. Goodbye!");
    Ok(())
}
