//! `zapdesk send`: send one message with stored credentials, then disconnect.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use colored::Colorize;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info};

use zapdesk_core::config::load_config;
use zapdesk_session::SessionEvent;

use crate::helpers;

/// Run the send command.
pub async fn run(to: &str, message: &str, wait_secs: u64) -> Result<()> {
    let config = load_config(None);
    let session = helpers::build_session(&config);

    let mut events = session.subscribe();
    session
        .connect()
        .await
        .context("failed to start whatsapp client")?;

    let ready = tokio::time::timeout(Duration::from_secs(wait_secs), wait_until_ready(&mut events)).await;

    let result = match ready {
        Ok(Ok(())) => session
            .send_message(to, message)
            .await
            .map_err(anyhow::Error::from),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(anyhow!("whatsapp session not ready after {wait_secs}s")),
    };

    session.disconnect().await;

    let sent = result.context("failed to send whatsapp message")?;
    info!(message_id = %sent.id, "message sent from cli");
    println!("{} sent {}", "✓".green(), sent.id.dimmed());
    Ok(())
}

/// Wait for `Ready`; a pairing request means there are no stored credentials.
async fn wait_until_ready(events: &mut broadcast::Receiver<SessionEvent>) -> Result<()> {
    loop {
        match events.recv().await {
            Ok(SessionEvent::Ready) => return Ok(()),
            Ok(SessionEvent::PairingCode(_)) => {
                bail!("this machine is not paired; run `zapdesk login` first")
            }
            Ok(SessionEvent::AuthFailure(reason)) => bail!("authentication failed: {reason}"),
            Ok(SessionEvent::Disconnected(reason)) => bail!("whatsapp disconnected: {reason}"),
            Ok(event) => debug!(event = event.name(), "waiting for ready"),
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => bail!("session event stream closed"),
        }
    }
}
