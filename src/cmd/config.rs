//! Configuration view and validation commands: `sitewright config`.

use anyhow::{Context, Result};

use sitewright::config::{SiteConfig, SiteToml};

use super::super::ConfigCommands;

fn print_toml(toml: &SiteToml) {
    println!("[generation]");
    println!("  model = \"{}\"", toml.generation.model);
    println!("  api_base = \"{}\"", toml.generation.api_base);
    println!();
    println!("[hosting]");
    println!("  api_base = \"{}\"", toml.hosting.api_base);
    println!("  raw_base = \"{}\"", toml.hosting.raw_base);
    println!("  branch = \"{}\"", toml.hosting.branch);
    println!("  ready_attempts = {}", toml.hosting.ready_attempts);
    println!("  ready_interval_ms = {}", toml.hosting.ready_interval_ms);
    println!("  cleanup_on_failure = {}", toml.hosting.cleanup_on_failure);
    println!("  repo_description = \"{}\"", toml.hosting.repo_description);
    println!();
    println!("[http]");
    println!("  timeout_secs = {}", toml.http.timeout_secs);
    println!();
}

pub fn cmd_config(config: &SiteConfig, command: Option<ConfigCommands>) -> Result<()> {
    let config_path = config.config_path();

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Sitewright Configuration");
            println!("========================");
            println!();
            println!("Data directory: {}", config.data_dir.display());

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No sitewright.toml found at {}", config_path.display());
                println!("Using default configuration.");
            }
            println!();

            // Effective values already include env overrides
            print_toml(&config.toml);

            println!("Environment:");
            println!(
                "  API key = {}",
                if config.api_key.is_some() {
                    "set"
                } else {
                    "not set (GEMINI_API_KEY)"
                }
            );
            println!(
                "  GITHUB_TOKEN = {}",
                if SiteConfig::env_github_token().is_some() {
                    "set"
                } else {
                    "not set"
                }
            );
            println!();
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No sitewright.toml found. Using defaults (valid).");
            }

            let mut warnings = config.validate();
            if config.api_key.is_none() {
                warnings.push("GEMINI_API_KEY is not set: sites cannot be generated".to_string());
            }

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("sitewright.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            std::fs::create_dir_all(&config.data_dir).with_context(|| {
                format!("Failed to create {}", config.data_dir.display())
            })?;

            let toml = SiteToml::default();
            toml.save(&config_path)?;

            println!("Created sitewright.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [generation] model, api_base");
            println!("  - [hosting] branch, ready_attempts, cleanup_on_failure");
            println!("  - [http] timeout_secs");
            println!();
        }
    }

    Ok(())
}
