//! Progress of an unfinished deployment, and repositories left behind by
//! abandoned ones.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::DeployStep;
use crate::errors::StoreError;
use crate::hosting::{CreatedRepository, HostingProvider};
use crate::models::{AppPlan, NamedFile};
use crate::store::LocalStore;

/// Store key of the checkpoint for the last failed deploy.
pub const PENDING_KEY: &str = "pending-deployment";
/// Store key of repositories no checkpoint refers to any more.
pub const ORPHANS_KEY: &str = "orphaned-repositories";

/// Which deploy steps have already succeeded, so a retry can resume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployCheckpoint {
    pub plan: AppPlan,
    pub prompt: String,
    /// Files returned by the generator, before the README is added.
    #[serde(default)]
    pub generated: Option<Vec<NamedFile>>,
    #[serde(default)]
    pub repository: Option<CreatedRepository>,
    /// Names of files already written to `repository`.
    #[serde(default)]
    pub uploaded: Vec<String>,
    /// Set once public hosting is enabled. A retry then only registers.
    #[serde(default)]
    pub public_url: Option<String>,
    #[serde(default)]
    pub failed_step: Option<DeployStep>,
    pub started_at: DateTime<Utc>,
}

impl DeployCheckpoint {
    pub fn new(plan: AppPlan, prompt: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            plan,
            prompt: prompt.into(),
            generated: None,
            repository: None,
            uploaded: Vec::new(),
            public_url: None,
            failed_step: None,
            started_at,
        }
    }

    /// Forget the remote repository after it has been deleted. Generated
    /// files are kept so a retry does not regenerate them.
    pub fn forget_repository(&mut self) {
        self.repository = None;
        self.uploaded.clear();
        self.public_url = None;
    }

    pub fn load(store: &LocalStore) -> Option<Self> {
        store.get(PENDING_KEY, None)
    }

    pub fn save(&self, store: &LocalStore) -> Result<(), StoreError> {
        store.set(PENDING_KEY, self)
    }

    pub fn clear(store: &LocalStore) -> Result<(), StoreError> {
        store.remove(PENDING_KEY)
    }
}

/// A repository created by a deploy that was abandoned before finishing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrphanedRepository {
    pub owner: String,
    pub name: String,
    pub html_url: String,
    pub abandoned_at: DateTime<Utc>,
}

impl OrphanedRepository {
    pub fn from_created(repo: &CreatedRepository, abandoned_at: DateTime<Utc>) -> Self {
        Self {
            owner: repo.owner.clone(),
            name: repo.name.clone(),
            html_url: repo.html_url.clone(),
            abandoned_at,
        }
    }
}

pub fn load_orphans(store: &LocalStore) -> Vec<OrphanedRepository> {
    store.get(ORPHANS_KEY, Vec::new())
}

/// Remember an orphaned repository so `sitewright cleanup` can delete it.
pub fn record_orphan(store: &LocalStore, orphan: OrphanedRepository) -> Result<(), StoreError> {
    let mut orphans = load_orphans(store);
    if !orphans
        .iter()
        .any(|o| o.owner == orphan.owner && o.name == orphan.name)
    {
        tracing::warn!(
            repo = %format!("{}/{}", orphan.owner, orphan.name),
            "leaving repository from an abandoned deployment; run `sitewright cleanup` to delete it"
        );
        orphans.push(orphan);
    }
    store.set(ORPHANS_KEY, &orphans)
}

/// Every repository `cleanup_orphans` would delete: recorded orphans plus the
/// repository of a pending checkpoint.
pub fn cleanup_candidates(store: &LocalStore) -> Vec<OrphanedRepository> {
    let mut candidates = load_orphans(store);
    if let Some(checkpoint) = DeployCheckpoint::load(store)
        && let Some(repo) = &checkpoint.repository
    {
        candidates.push(OrphanedRepository::from_created(repo, checkpoint.started_at));
    }
    candidates
}

/// Outcome of a cleanup pass.
#[derive(Debug, Default)]
pub struct CleanupReport {
    pub deleted: Vec<OrphanedRepository>,
    pub failed: Vec<(OrphanedRepository, String)>,
}

/// Delete orphaned repositories and the pending checkpoint's repository.
/// Entries that fail to delete are kept for a later attempt.
pub async fn cleanup_orphans(
    hosting: &dyn HostingProvider,
    store: &LocalStore,
    token: &str,
) -> Result<CleanupReport, StoreError> {
    let mut report = CleanupReport::default();
    let mut remaining = Vec::new();

    for orphan in load_orphans(store) {
        match hosting
            .delete_repository(&orphan.owner, &orphan.name, token)
            .await
        {
            Ok(()) => report.deleted.push(orphan),
            Err(e) => {
                tracing::warn!(repo = %orphan.name, error = %e, "could not delete orphaned repository");
                report.failed.push((orphan.clone(), e.to_string()));
                remaining.push(orphan);
            }
        }
    }
    store.set(ORPHANS_KEY, &remaining)?;

    if let Some(mut checkpoint) = DeployCheckpoint::load(store)
        && let Some(repo) = checkpoint.repository.clone()
    {
        let entry = OrphanedRepository::from_created(&repo, checkpoint.started_at);
        match hosting
            .delete_repository(&repo.owner, &repo.name, token)
            .await
        {
            Ok(()) => {
                checkpoint.forget_repository();
                checkpoint.save(store)?;
                report.deleted.push(entry);
            }
            Err(e) => {
                tracing::warn!(repo = %repo.name, error = %e, "could not delete pending repository");
                report.failed.push((entry, e.to_string()));
            }
        }
    }

    Ok(report)
}
