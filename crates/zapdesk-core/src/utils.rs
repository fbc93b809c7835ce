//! Utility helpers: path resolution and string manipulation.

use std::path::PathBuf;

/// Get the Zapdesk data directory (e.g. `~/.zapdesk/`).
pub fn get_data_path() -> PathBuf {
    let home = home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".zapdesk")
}

/// Default directory for persisted WhatsApp pairing credentials.
pub fn get_default_auth_path() -> PathBuf {
    get_data_path().join("whatsapp-auth")
}

/// Get current ISO 8601 timestamp.
pub fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Keep the first `max_chars` characters of `s`. Unicode-safe, no ellipsis.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Expand `~` to the home directory in a path string.
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        return home_dir().unwrap_or_else(|| PathBuf::from("."));
    }
    match path.strip_prefix("~/") {
        Some(rest) => home_dir().unwrap_or_else(|| PathBuf::from(".")).join(rest),
        None => PathBuf::from(path),
    }
}

fn home_dir() -> Option<PathBuf> {
    dirs_next::home_dir()
}
