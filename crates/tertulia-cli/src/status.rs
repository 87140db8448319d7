//! `tertulia status`: show configuration, database and credential status.
//!
//! Secrets are only ever printed masked.

use anyhow::Result;
use colored::Colorize;

use tertulia_core::config::{get_config_path, load_config, Config};
use tertulia_core::utils::mask_secret;
use tertulia_providers::PROVIDERS;

/// Run the status command.
pub fn run() -> Result<()> {
    let config = load_config(None);
    let config_path = get_config_path();

    println!();
    println!("{}", "Tertulia Status".cyan().bold());
    println!();

    println!(
        "  {:<18} {} {}",
        "Config:".bold(),
        config_path.display(),
        if config_path.exists() {
            "✓".green().to_string()
        } else {
            "(not found, using defaults)".red().to_string()
        }
    );

    println!(
        "  {:<18} {}:{}",
        "Gateway:".bold(),
        config.gateway.host,
        config.gateway.port
    );
    println!(
        "  {:<18} {}",
        "Origins:".bold(),
        config.gateway.allowed_origins.join(", ").dimmed()
    );
    println!(
        "  {:<18} {}s",
        "Timeout:".bold(),
        config.gateway.request_timeout_secs
    );

    println!();
    println!("  {:<18} {}", "Database:".bold(), database_line(&config));

    println!();
    println!("  {}", "Provider credentials:".bold());
    for (name, line) in credential_lines(&config) {
        println!("    {:<20} {}", name, line);
    }
    println!(
        "    {}",
        "Providers without a credential borrow OpenRouter's.".dimmed()
    );
    println!();

    Ok(())
}

fn database_line(config: &Config) -> String {
    let db = &config.database;
    if db.is_configured() {
        format!(
            "{} {} (key {}, bucket {})",
            "✓".green(),
            db.url,
            mask_secret(&db.key),
            db.images_bucket
        )
    } else {
        format!("{}", "· not configured (serve needs --in-memory)".dimmed())
    }
}

/// One line per provider in the detection table; Anthropic has no
/// environment slot and relies on stored keys.
fn credential_lines(config: &Config) -> Vec<(&'static str, String)> {
    PROVIDERS
        .iter()
        .map(|spec| {
            let line = match config.providers.get_by_name(spec.kind.as_str()) {
                Some(p) if p.is_configured() => {
                    format!("{} {}", "✓".green(), mask_secret(&p.api_key))
                }
                Some(_) => format!("{}", "· not configured".dimmed()),
                None => format!("{}", "· stored keys only".dimmed()),
            };
            (spec.display_name, line)
        })
        .collect()
}
