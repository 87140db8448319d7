//! `tertulia onboard`: write a default configuration file.
//!
//! Never overwrites an existing config.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;

use tertulia_core::config::{get_config_path, save_config, Config};

/// Run the onboard command.
pub fn run() -> Result<()> {
    println!();
    println!("{}", "Tertulia Setup".cyan().bold());
    println!();

    let config_path = get_config_path();
    if write_default_config(&config_path)? {
        println!("  {} created config at {}", "✓".green(), config_path.display());
    } else {
        println!(
            "  {} config already exists at {}",
            "✓".green(),
            config_path.display()
        );
    }

    println!();
    println!("  Next steps:");
    println!("    1. Add provider keys (or set OPENROUTER_API_KEY, GROQ_API_KEY, GEMINI_API_KEY)");
    println!("    2. Add the database URL and key (or set SUPABASE_URL, SUPABASE_KEY)");
    println!("    3. Run `tertulia serve`");
    println!();

    Ok(())
}

/// Write `Config::default()` to `path` unless a file is already there.
///
/// Returns whether a file was written. Defaults are written as-is, without
/// environment overrides, so no secret from the environment lands on disk.
fn write_default_config(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    save_config(&Config::default(), Some(path))
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_defaults_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        assert!(write_default_config(&path).unwrap());
        let written: Config =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written.gateway.port, 3000);
        assert_eq!(written.database.images_bucket, "personajes");

        assert!(!write_default_config(&path).unwrap());
    }

    #[test]
    fn test_existing_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{\"gateway\":{\"port\":9999}}").unwrap();

        assert!(!write_default_config(&path).unwrap());
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "{\"gateway\":{\"port\":9999}}"
        );
    }
}
