//! Planning and deployment: `sitewright create` and `sitewright plan`.

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, theme::ColorfulTheme};
use std::sync::Arc;

use sitewright::config::SiteConfig;
use sitewright::errors::{ValidationError, WorkflowError};
use sitewright::generation::{GeminiClient, SiteGenerator};
use sitewright::hosting::GitHubClient;
use sitewright::models::AppPlan;
use sitewright::registry::AppRegistry;
use sitewright::ui::icons::{CROSS, GLOBE, REPO, SPARKLE, WARN};
use sitewright::ui::{DeployUI, spinner};
use sitewright::workflow::{CreationWorkflow, WorkflowOptions};

use super::open_store;
use super::settings::effective_settings;

fn print_plan(plan: &AppPlan) {
    println!();
    println!("  {} {}", style("Name:").bold(), style(&plan.name).cyan());
    println!("  {}", style("Description:").bold());
    for line in textwrap::wrap(&plan.description, 72) {
        println!("    {}", line);
    }
    println!();
}

/// Let the user adjust the draft. Returns false if they declined to deploy.
fn review_plan(workflow: &mut CreationWorkflow) -> Result<bool> {
    let Some(draft) = workflow.draft().cloned() else {
        return Ok(false);
    };
    let theme = ColorfulTheme::default();

    let name: String = Input::with_theme(&theme)
        .with_prompt("Site name")
        .with_initial_text(draft.name)
        .interact_text()?;
    let description: String = Input::with_theme(&theme)
        .with_prompt("Description")
        .with_initial_text(draft.description)
        .interact_text()?;
    workflow.edit_plan(name, description)?;

    Ok(Confirm::with_theme(&theme)
        .with_prompt("Create the repository and publish this site?")
        .default(true)
        .interact()?)
}

pub async fn cmd_create(
    config: &SiteConfig,
    prompt: Option<&str>,
    name: Option<&str>,
    description: Option<&str>,
    yes: bool,
) -> Result<()> {
    let store = open_store(config)?;
    let settings = effective_settings(&store);
    if !settings.has_token() {
        return Err(WorkflowError::NeedsSettings.into());
    }

    let generator = Arc::new(GeminiClient::from_config(config)?);
    let hosting = Arc::new(GitHubClient::from_config(config)?);
    let mut registry = AppRegistry::load(store.clone());
    let ui = Arc::new(DeployUI::new(config.verbose));
    let mut workflow = CreationWorkflow::new(
        generator,
        hosting,
        store,
        WorkflowOptions::from(&config.toml.hosting),
    )
    .with_observer(ui.clone());

    // A failed deploy left a checkpoint: offer to pick it up
    let mut resumed = false;
    if let Some(cp) = workflow.checkpoint().cloned()
        && prompt.is_none_or(|p| p == cp.prompt)
    {
        let step = cp
            .failed_step
            .map(|s| s.to_string())
            .unwrap_or_else(|| "an unknown step".to_string());
        println!(
            "{}A deployment of \"{}\" stopped at: {}",
            WARN, cp.plan.name, step
        );
        let resume = yes
            || Confirm::with_theme(&ColorfulTheme::default())
                .with_prompt("Resume it?")
                .default(true)
                .interact()?;
        if resume {
            workflow.use_plan(&cp.prompt, cp.plan)?;
            resumed = true;
        }
    }

    if !resumed {
        let prompt = match prompt {
            Some(p) => p.to_string(),
            None => Input::<String>::with_theme(&ColorfulTheme::default())
                .with_prompt("Describe the website you want")
                .interact_text()?,
        };

        match (name, description) {
            (Some(name), Some(description)) => {
                workflow.use_plan(
                    &prompt,
                    AppPlan {
                        name: name.to_string(),
                        description: description.to_string(),
                    },
                )?;
            }
            _ => {
                let pb = spinner("Planning your site...");
                let result = workflow.request_plan(&prompt).await.map(|_| ());
                pb.finish_and_clear();
                result.context("Could not generate a plan")?;

                if let Some(draft) = workflow.draft().cloned() {
                    workflow.edit_plan(
                        name.map(str::to_string).unwrap_or(draft.name),
                        description.map(str::to_string).unwrap_or(draft.description),
                    )?;
                }
            }
        }

        if let Some(plan) = workflow.draft() {
            println!("{}Here is the plan:", SPARKLE);
            print_plan(plan);
        }

        if !yes && !review_plan(&mut workflow)? {
            println!("Cancelled. Nothing was created.");
            return Ok(());
        }
    }

    let result = workflow.confirm_and_deploy(&settings, &mut registry).await;
    ui.finish();

    match result {
        Ok(record) => {
            println!();
            println!(
                "{} {}",
                style("Published").green().bold(),
                style(&record.id).cyan()
            );
            if let Some(url) = &record.github_repo_url {
                println!("  {}Repository: {}", REPO, url);
            }
            if let Some(url) = &record.public_url {
                println!("  {}Site:       {}", GLOBE, url);
                println!(
                    "  {}",
                    style("GitHub Pages can take a minute before the site responds.").dim()
                );
            }
            println!();
            Ok(())
        }
        Err(e) => {
            println!();
            println!("{}{}", CROSS, style("Deployment failed").red().bold());
            if e.is_transient() {
                println!("  This looks temporary.");
            }
            if workflow.checkpoint().is_some_and(|cp| cp.repository.is_some()) {
                println!("  Run `sitewright create` again to resume where it stopped,");
                println!("  or `sitewright cleanup` to delete the partial repository.");
            } else {
                println!("  Run `sitewright create` again to retry.");
            }
            println!();
            Err(e.into())
        }
    }
}

pub async fn cmd_plan(config: &SiteConfig, prompt: &str) -> Result<()> {
    if prompt.trim().is_empty() {
        return Err(ValidationError::EmptyPrompt.into());
    }
    let generator = GeminiClient::from_config(config)?;

    let pb = spinner(format!("Asking {}...", generator.model()));
    let result = generator.generate_plan(prompt).await;
    pb.finish_and_clear();
    let plan = result.context("Could not generate a plan")?;

    print_plan(&plan);
    println!(
        "{}",
        style("Run `sitewright create` with --name/--description to deploy this plan.").dim()
    );
    Ok(())
}
