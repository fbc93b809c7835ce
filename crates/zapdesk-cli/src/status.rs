//! `zapdesk status`: show configuration.
//!
//! Only reads config and the filesystem; it does not contact the bridge.

use anyhow::Result;
use colored::Colorize;

use zapdesk_core::config::{get_config_path, load_config};
use zapdesk_core::utils::expand_home;

use crate::helpers::existence_mark;

/// Run the status command.
pub fn run() -> Result<()> {
    let config = load_config(None);
    let config_path = get_config_path();
    let wa = &config.whatsapp;

    println!();
    println!("{}", "📱 Zapdesk Status".green().bold());
    println!();

    println!(
        "  {:<18} {} {}",
        "Config:".bold(),
        config_path.display(),
        existence_mark(config_path.exists())
    );

    let auth_dir = expand_home(&wa.auth_dir);
    println!(
        "  {:<18} {} {}",
        "Auth dir:".bold(),
        auth_dir.display(),
        existence_mark(auth_dir.exists())
    );

    println!("  {:<18} {}", "Bridge:".bold(), wa.bridge_url);
    println!("  {:<18} {}", "Client id:".bold(), wa.client_id);
    println!(
        "  {:<18} +{}",
        "Country code:".bold(),
        wa.default_country_code
    );
    println!(
        "  {:<18} {} | sandbox: {}",
        "Browser:".bold(),
        format!("headless: {}", wa.headless).dimmed(),
        format!("{}", wa.sandbox).dimmed(),
    );
    println!(
        "  {:<18} {}",
        "Request timeout:".bold(),
        format!("{}s", wa.request_timeout_secs).dimmed()
    );

    println!();
    println!(
        "  {:<18} http://{}{}",
        "API:".bold(),
        config.gateway.bind_addr(),
        zapdesk_gateway::API_PREFIX
    );
    println!();

    Ok(())
}
