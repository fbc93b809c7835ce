//! `zapdesk onboard`: initialize configuration and the credentials directory.
//!
//! - Creates `~/.zapdesk/config.json` with defaults
//! - Creates the WhatsApp auth directory the bridge stores credentials in

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;

use zapdesk_core::config::{get_config_path, load_config, save_config};
use zapdesk_core::utils::expand_home;

/// Run the onboard command.
pub fn run() -> Result<()> {
    println!();
    println!("{}", "📱 Zapdesk — Setup".green().bold());
    println!();

    // 1. Config
    let config_path = get_config_path();
    if write_default_config(&config_path)? {
        println!(
            "  {} created config at {}",
            "✓".green(),
            config_path.display()
        );
    } else {
        println!(
            "  {} config already exists at {}",
            "✓".green(),
            config_path.display()
        );
    }

    // 2. Auth dir, from the config as it now stands (env overrides included)
    let config = load_config(Some(&config_path));
    let auth_dir = expand_home(&config.whatsapp.auth_dir);
    std::fs::create_dir_all(&auth_dir)
        .with_context(|| format!("failed to create auth dir: {}", auth_dir.display()))?;
    println!("  {} auth dir at {}", "✓".green(), auth_dir.display());

    println!();
    println!(
        "{}",
        "  Setup complete! Start the bridge, then run `zapdesk login`.".green()
    );
    println!();

    Ok(())
}

/// Write a default config unless one exists. Returns whether it was written.
fn write_default_config(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    let config = load_config(Some(path)); // defaults + env
    save_config(&config, Some(path))
        .with_context(|| format!("failed to write config: {}", path.display()))?;
    Ok(true)
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
