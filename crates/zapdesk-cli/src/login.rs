//! `zapdesk login`: pair with WhatsApp from the terminal.
//!
//! Prints every pairing code as a QR code until the phone scans one. The
//! bridge stores the credentials under `authDir`, so later `serve` / `send`
//! runs reconnect without pairing again.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

use zapdesk_core::config::load_config;
use zapdesk_core::utils::timestamp;
use zapdesk_gateway::qr::render_pairing_terminal;
use zapdesk_session::SessionEvent;

use crate::helpers;

/// Run the login command.
pub async fn run() -> Result<()> {
    helpers::print_banner("Login");

    let config = load_config(None);
    let session = helpers::build_session(&config);

    let mut events = session.subscribe();
    session
        .connect()
        .await
        .context("failed to start whatsapp client")?;

    println!("  {}", "Waiting for WhatsApp...".dimmed());

    let outcome = tokio::select! {
        outcome = wait_for_pairing(&mut events) => outcome,
        _ = tokio::signal::ctrl_c() => Err(anyhow::anyhow!("login cancelled")),
    };

    session.disconnect().await;

    outcome?;
    println!();
    println!(
        "  {} paired at {}. Credentials saved in {}",
        "✓".green(),
        timestamp(),
        config.whatsapp.auth_dir
    );
    println!();
    Ok(())
}

/// Print pairing codes until the session is ready or pairing fails.
async fn wait_for_pairing(events: &mut broadcast::Receiver<SessionEvent>) -> Result<()> {
    loop {
        match events.recv().await {
            Ok(SessionEvent::PairingCode(code)) => {
                let art = render_pairing_terminal(&code)?;
                println!();
                println!("{art}");
                println!(
                    "  {}",
                    "Scan with WhatsApp → Linked devices → Link a device".bold()
                );
            }
            Ok(SessionEvent::Authenticated) => {
                println!("  {} authenticated, syncing...", "✓".green());
            }
            Ok(SessionEvent::Ready) => return Ok(()),
            Ok(SessionEvent::AuthFailure(reason)) => bail!("authentication failed: {reason}"),
            Ok(SessionEvent::Disconnected(reason)) => {
                bail!("whatsapp disconnected before pairing finished: {reason}")
            }
            Ok(SessionEvent::Message(_)) => {}
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "missed session events");
            }
            Err(RecvError::Closed) => bail!("session event stream closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pairing_succeeds_on_ready() {
        let (tx, mut rx) = broadcast::channel(8);
        tx.send(SessionEvent::PairingCode("1@2,ABCxyz==".into())).unwrap();
        tx.send(SessionEvent::Authenticated).unwrap();
        tx.send(SessionEvent::Ready).unwrap();
        assert!(wait_for_pairing(&mut rx).await.is_ok());
    }

    #[tokio::test]
    async fn pairing_fails_on_auth_failure() {
        let (tx, mut rx) = broadcast::channel(8);
        tx.send(SessionEvent::AuthFailure("invalid session".into()))
            .unwrap();
        let err = wait_for_pairing(&mut rx).await.unwrap_err();
        assert!(err.to_string().contains("invalid session"));
    }

    #[tokio::test]
    async fn pairing_fails_when_stream_closes() {
        let (tx, mut rx) = broadcast::channel::<SessionEvent>(8);
        drop(tx);
        assert!(wait_for_pairing(&mut rx).await.is_err());
    }
}
