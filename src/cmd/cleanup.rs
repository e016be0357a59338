//! Deleting repositories of failed deploys: `sitewright cleanup`.

use anyhow::{Context, Result};
use console::style;
use dialoguer::Confirm;

use sitewright::config::SiteConfig;
use sitewright::errors::WorkflowError;
use sitewright::hosting::GitHubClient;
use sitewright::ui::icons::{CROSS, TRASH};
use sitewright::workflow::{cleanup_candidates, cleanup_orphans};

use super::open_store;
use super::settings::effective_settings;

pub async fn cmd_cleanup(config: &SiteConfig, force: bool) -> Result<()> {
    let store = open_store(config)?;
    let candidates = cleanup_candidates(&store);

    if candidates.is_empty() {
        println!("Nothing to clean up.");
        return Ok(());
    }

    println!();
    println!("Repositories left by unfinished deployments:");
    for repo in &candidates {
        println!("  {}{}", TRASH, repo.html_url);
    }
    println!();

    let settings = effective_settings(&store);
    if !settings.has_token() {
        return Err(WorkflowError::NeedsSettings.into());
    }

    if !force {
        let confirm = Confirm::new()
            .with_prompt(format!(
                "Permanently delete {} repository(ies) from GitHub?",
                candidates.len()
            ))
            .default(false)
            .interact()
            .unwrap_or(false);

        if !confirm {
            println!("Cleanup cancelled");
            return Ok(());
        }
    }

    let hosting = GitHubClient::from_config(config)?;
    let report = cleanup_orphans(&hosting, &store, settings.github_token.trim())
        .await
        .context("Failed to update local state during cleanup")?;

    println!(
        "Deleted {} repository(ies).",
        style(report.deleted.len()).green()
    );
    for (repo, error) in &report.failed {
        println!("  {}{}: {}", CROSS, repo.name, error);
    }
    if !report.failed.is_empty() {
        println!(
            "  {}",
            style("These are kept and will be retried on the next cleanup.").dim()
        );
    }
    Ok(())
}
