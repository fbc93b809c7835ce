//! Configuration schema.
//!
//! Hierarchy: `Config` → `WhatsAppConfig`, `GatewayConfig`.
//!
//! JSON on disk uses **camelCase** keys; Rust uses snake_case.
//! We use `#[serde(rename_all = "camelCase")]` to handle the conversion.

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────
// Root Config
// ─────────────────────────────────────────────

/// Root configuration: loaded from `~/.zapdesk/config.json` + env vars.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub whatsapp: WhatsAppConfig,
    pub gateway: GatewayConfig,
}

// ─────────────────────────────────────────────
// WhatsApp session
// ─────────────────────────────────────────────

/// WhatsApp session configuration.
///
/// The session talks to a Node.js bridge that drives a headless WhatsApp Web
/// client; pairing credentials are persisted by the bridge under `auth_dir`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WhatsAppConfig {
    /// Bridge WebSocket URL.
    pub bridge_url: String,
    /// Client id used by the bridge to namespace stored credentials.
    pub client_id: String,
    /// Directory where the bridge persists pairing credentials (`~` expanded).
    pub auth_dir: String,
    /// Country code prefixed to destinations that lack it.
    pub default_country_code: String,
    /// Run the browser without a visible window.
    pub headless: bool,
    /// Keep the browser sandbox enabled.
    pub sandbox: bool,
    /// Per-request timeout enforced by the bridge transport.
    pub request_timeout_secs: u64,
    /// Maximum chats returned by a chat listing.
    pub max_chats: usize,
    /// Maximum messages fetched from one chat's history.
    pub max_messages: usize,
    /// Characters kept in a chat's last-message preview.
    pub preview_chars: usize,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            bridge_url: "ws://localhost:3001".to_string(),
            client_id: "zapdesk".to_string(),
            auth_dir: "~/.zapdesk/whatsapp-auth".to_string(),
            default_country_code: "55".to_string(),
            headless: true,
            sandbox: true,
            request_timeout_secs: 30,
            max_chats: 20,
            max_messages: 50,
            preview_chars: 100,
        }
    }
}

// ─────────────────────────────────────────────
// Gateway
// ─────────────────────────────────────────────

/// HTTP gateway configuration (admin dashboard polling endpoints).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewayConfig {
    /// Listen address.
    pub host: String,
    /// Listen port.
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl GatewayConfig {
    /// `host:port` string suitable for binding a listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
