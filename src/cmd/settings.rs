//! Stored GitHub token: `sitewright settings`.

use anyhow::{Context, Result};
use console::style;

use sitewright::config::SiteConfig;
use sitewright::hosting::is_valid_github_token;
use sitewright::models::Settings;
use sitewright::store::{LocalStore, SETTINGS_KEY};

use super::super::SettingsCommands;
use super::open_store;

/// Settings from the store, falling back to `GITHUB_TOKEN` when no token has
/// been saved.
pub(crate) fn effective_settings(store: &LocalStore) -> Settings {
    let mut settings: Settings = store.get(SETTINGS_KEY, Settings::default());
    if !settings.has_token()
        && let Some(token) = SiteConfig::env_github_token()
    {
        tracing::debug!("using GITHUB_TOKEN from the environment");
        settings.github_token = token;
    }
    settings
}

fn masked(token: &str) -> String {
    let visible: String = token.chars().take(4).collect();
    format!("{visible}{}", "*".repeat(token.chars().count().saturating_sub(4).min(12)))
}

pub fn cmd_settings(config: &SiteConfig, command: Option<SettingsCommands>) -> Result<()> {
    let store = open_store(config)?;

    match command {
        None | Some(SettingsCommands::Show) => {
            let stored: Settings = store.get(SETTINGS_KEY, Settings::default());
            println!();
            if stored.has_token() {
                println!("GitHub token: {}", masked(&stored.github_token));
            } else if let Some(token) = SiteConfig::env_github_token() {
                println!(
                    "GitHub token: {} {}",
                    masked(&token),
                    style("(from GITHUB_TOKEN)").dim()
                );
            } else {
                println!("GitHub token: {}", style("not set").yellow());
                println!();
                println!("Create a token with the `public_repo` scope, then run:");
                println!("  sitewright settings set-token <TOKEN>");
            }
            println!();
        }
        Some(SettingsCommands::SetToken { token }) => {
            let token = token.trim().to_string();
            if token.is_empty() {
                anyhow::bail!("Token must not be empty");
            }
            if !is_valid_github_token(&token) {
                println!(
                    "{} This does not look like a GitHub token (expected a ghp_ or github_pat_ prefix). Saving anyway.",
                    style("Warning:").yellow().bold()
                );
            }
            store
                .set(SETTINGS_KEY, &Settings {
                    github_token: token,
                })
                .context("Failed to save settings")?;
            println!("Token saved.");
        }
        Some(SettingsCommands::Clear) => {
            store
                .set(SETTINGS_KEY, &Settings::default())
                .context("Failed to save settings")?;
            println!("Token cleared.");
        }
    }

    Ok(())
}
