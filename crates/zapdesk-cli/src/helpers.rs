//! Shared CLI helpers: session construction, banner, status marks.

use std::sync::Arc;

use colored::Colorize;

use zapdesk_core::config::Config;
use zapdesk_session::bridge::BridgeFactory;
use zapdesk_session::global::session_or_init;
use zapdesk_session::SessionManager;

/// The process-wide session, backed by the configured bridge.
pub fn build_session(config: &Config) -> SessionManager {
    session_or_init(|| {
        let factory = Arc::new(BridgeFactory::from_config(&config.whatsapp));
        SessionManager::from_config(factory, &config.whatsapp)
    })
}

/// Print the startup banner.
pub fn print_banner(mode: &str) {
    let version = env!("CARGO_PKG_VERSION");
    println!();
    println!("{}  v{}", "📱 Zapdesk".green().bold(), version.dimmed());
    println!("  Mode: {mode}");
    println!();
}

/// `✓` when a path exists, `(not found)` otherwise.
pub fn existence_mark(exists: bool) -> String {
    if exists {
        "✓".green().to_string()
    } else {
        "(not found)".red().to_string()
    }
}
