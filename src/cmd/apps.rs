//! Working with created sites: list, show, revise, remove.

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use console::style;
use dialoguer::Confirm;

use sitewright::config::SiteConfig;
use sitewright::errors::RegistryError;
use sitewright::generation::{GeminiClient, Revision, SiteGenerator};
use sitewright::models::{ChatMessage, ChatRole, ENTRY_POINT};
use sitewright::registry::AppRegistry;
use sitewright::store::APPS_KEY;
use sitewright::ui::icons::{CHAT, FILE, GLOBE, REPO, TRASH, WARN};
use sitewright::ui::spinner;

use super::open_store;

fn load_registry(config: &SiteConfig) -> Result<AppRegistry> {
    Ok(AppRegistry::load(open_store(config)?))
}

pub fn cmd_list(config: &SiteConfig) -> Result<()> {
    let registry = load_registry(config)?;

    if registry.is_unreadable() {
        println!();
        println!(
            "{}{}.json could not be read. It will be saved as {}.json.bak before the next change.",
            WARN, APPS_KEY, APPS_KEY
        );
    }

    if registry.is_empty() {
        println!();
        println!("No sites yet. Run 'sitewright create' to make one.");
        println!();
        return Ok(());
    }

    println!();
    println!("{:<32} {:<17} Site", "ID", "Created");
    println!("{:<32} {:<17} ----", "-".repeat(32), "-".repeat(17));
    for app in registry.sorted_by_created_desc() {
        println!(
            "{:<32} {:<17} {}",
            app.id,
            app.created_at
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M"),
            app.public_url
                .as_deref()
                .map(|u| style(u).cyan().to_string())
                .unwrap_or_else(|| style("not published").dim().to_string())
        );
    }
    println!();
    println!("{} site(s)", registry.len());
    println!();
    Ok(())
}

pub fn cmd_show(config: &SiteConfig, id: &str, show_files: bool, open_site: bool) -> Result<()> {
    let registry = load_registry(config)?;
    let app = registry
        .find_by_id(id)
        .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
    let plan = app.plan_or_prompt();

    println!();
    println!("{}", style(&plan.name).bold().cyan());
    println!("{}", style(&app.id).dim());
    println!();
    for line in textwrap::wrap(&plan.description, 76) {
        println!("  {}", line);
    }
    println!();
    println!(
        "  Created: {}",
        app.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
    );
    if let Some(url) = &app.github_repo_url {
        println!("  {}Repository: {}", REPO, url);
    }
    if let Some(url) = &app.public_url {
        println!("  {}Site:       {}", GLOBE, url);
    }
    println!();

    println!("Files:");
    for file in &app.files {
        println!("  {}{} ({} bytes)", FILE, file.name, file.content.len());
    }
    println!();

    if !app.chat_history.is_empty() {
        println!("Chat:");
        for msg in &app.chat_history {
            let who = match msg.sender {
                ChatRole::User => style("you").yellow(),
                ChatRole::Assistant => style("ai").green(),
            };
            println!("  {}{}: {}", CHAT, who, msg.text);
        }
        println!();
    }

    if show_files {
        for file in &app.files {
            println!("{}", style(format!("── {} ──", file.name)).bold());
            println!("{}", file.content);
            println!();
        }
    }

    if open_site {
        match &app.public_url {
            Some(url) => {
                open::that(url).with_context(|| format!("Failed to open {}", url))?;
            }
            None => println!("{} has no public URL.", app.id),
        }
    }

    Ok(())
}

pub async fn cmd_revise(config: &SiteConfig, id: &str, message: &str) -> Result<()> {
    if message.trim().is_empty() {
        anyhow::bail!("Say what you want changed");
    }
    let mut registry = load_registry(config)?;
    let app = registry
        .find_by_id(id)
        .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
    let current = app
        .entry_point()
        .ok_or_else(|| RegistryError::FileNotFound {
            id: id.to_string(),
            file: ENTRY_POINT.to_string(),
        })?
        .content
        .clone();
    let plan = app.plan_or_prompt();
    let mut history = app.chat_history.clone();
    let now = Utc::now();
    history.push(ChatMessage::new(ChatRole::User, message, now));

    let generator = GeminiClient::from_config(config)?;
    let pb = spinner("Thinking...");
    let result = generator.revise_files(&plan, &current, &history).await;
    pb.finish_and_clear();
    let revision = result.context("Could not revise the site")?;

    let updated = registry.apply_revision(id, message, &revision, now)?;
    match &revision {
        Revision::Document { .. } => {
            println!("{}{}", CHAT, sitewright::registry::DOCUMENT_UPDATED_REPLY);
            println!(
                "  {}",
                style(format!(
                    "{} now has {} bytes. The change is saved locally; the published site is unchanged.",
                    ENTRY_POINT,
                    updated.entry_point().map(|f| f.content.len()).unwrap_or(0)
                ))
                .dim()
            );
        }
        Revision::Message { text } => {
            println!("{}{}", CHAT, text);
        }
    }
    Ok(())
}

pub fn cmd_remove(config: &SiteConfig, id: &str, force: bool) -> Result<()> {
    let mut registry = load_registry(config)?;
    if registry.find_by_id(id).is_none() {
        return Err(RegistryError::NotFound(id.to_string()).into());
    }

    if !force {
        let confirm = Confirm::new()
            .with_prompt(format!(
                "Forget '{}'? Its GitHub repository is not deleted.",
                id
            ))
            .default(false)
            .interact()
            .unwrap_or(false);

        if !confirm {
            println!("Remove cancelled");
            return Ok(());
        }
    }

    let removed = registry.remove(id)?;
    println!("{}Removed {}", TRASH, removed.id);
    if let Some(url) = removed.github_repo_url {
        println!("  The repository is still at {}", url);
    }
    Ok(())
}
