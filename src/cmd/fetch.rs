//! Rendered site retrieval: `sitewright fetch`.

use anyhow::{Context, Result};
use std::path::Path;

use sitewright::config::SiteConfig;
use sitewright::hosting::GitHubClient;

pub async fn cmd_fetch(
    config: &SiteConfig,
    owner: &str,
    repo: &str,
    path: &str,
    out: Option<&Path>,
) -> Result<()> {
    let client = GitHubClient::from_config(config)?;
    let html = client
        .fetch_site(owner, repo, path)
        .await
        .with_context(|| format!("Failed to fetch {} from {}/{}", path, owner, repo))?;

    match out {
        Some(out) => {
            std::fs::write(out, &html)
                .with_context(|| format!("Failed to write {}", out.display()))?;
            eprintln!("Wrote {} ({} bytes)", out.display(), html.len());
        }
        None => print!("{}", html),
    }
    Ok(())
}
