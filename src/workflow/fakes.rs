//! In-memory collaborators for workflow tests.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use crate::errors::{GenerationError, HostingError};
use crate::generation::{Revision, SiteGenerator};
use crate::hosting::{CreatedRepository, HostingProvider, PublicSite};
use crate::models::{AppPlan, ChatMessage, NamedFile};

/// Generator returning canned replies, in order, for each operation.
#[derive(Default)]
pub struct FakeGenerator {
    plans: Mutex<VecDeque<Result<AppPlan, GenerationError>>>,
    files: Mutex<VecDeque<Result<Vec<NamedFile>, GenerationError>>>,
    file_prompts: Mutex<Vec<String>>,
}

impl FakeGenerator {
    pub fn push_plan(&self, plan: Result<AppPlan, GenerationError>) {
        self.plans.lock().unwrap().push_back(plan);
    }

    pub fn push_files(&self, files: Result<Vec<NamedFile>, GenerationError>) {
        self.files.lock().unwrap().push_back(files);
    }

    /// Prompts `generate_files` was called with.
    pub fn file_prompts(&self) -> Vec<String> {
        self.file_prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl SiteGenerator for FakeGenerator {
    async fn generate_plan(&self, _prompt: &str) -> Result<AppPlan, GenerationError> {
        self.plans
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GenerationError::MalformedResponse("no plan queued".into())))
    }

    async fn generate_files(&self, prompt: &str) -> Result<Vec<NamedFile>, GenerationError> {
        self.file_prompts.lock().unwrap().push(prompt.to_string());
        self.files
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GenerationError::MalformedResponse("no files queued".into())))
    }

    async fn revise_files(
        &self,
        _plan: &AppPlan,
        _current_content: &str,
        _history: &[ChatMessage],
    ) -> Result<Revision, GenerationError> {
        Ok(Revision::Message {
            text: "ok".into(),
        })
    }
}

/// Hosting service that records every call and can be told to fail.
pub struct FakeHosting {
    pub owner: String,
    calls: Mutex<Vec<String>>,
    uploaded: Mutex<Vec<NamedFile>>,
    deleted: Mutex<Vec<String>>,
    fail_upload_once: Mutex<HashSet<String>>,
    fail_create: Mutex<Option<HostingError>>,
    fail_delete: Mutex<HashSet<String>>,
    /// Number of readiness checks answering "not yet" before "ready".
    not_ready_for: Mutex<u32>,
    pages_status: Mutex<Option<u16>>,
    repos: Mutex<HashMap<String, CreatedRepository>>,
}

impl Default for FakeHosting {
    fn default() -> Self {
        Self {
            owner: "u".to_string(),
            calls: Mutex::default(),
            uploaded: Mutex::default(),
            deleted: Mutex::default(),
            fail_upload_once: Mutex::default(),
            fail_create: Mutex::default(),
            fail_delete: Mutex::default(),
            not_ready_for: Mutex::new(0),
            pages_status: Mutex::default(),
            repos: Mutex::default(),
        }
    }
}

impl FakeHosting {
    pub fn fail_upload_of(&self, file: &str) {
        self.fail_upload_once.lock().unwrap().insert(file.to_string());
    }

    pub fn fail_create_with(&self, err: HostingError) {
        *self.fail_create.lock().unwrap() = Some(err);
    }

    pub fn fail_delete_of(&self, repo: &str) {
        self.fail_delete.lock().unwrap().insert(repo.to_string());
    }

    pub fn not_ready_for(&self, checks: u32) {
        *self.not_ready_for.lock().unwrap() = checks;
    }

    pub fn pages_status(&self, status: u16) {
        *self.pages_status.lock().unwrap() = Some(status);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn uploaded(&self) -> Vec<NamedFile> {
        self.uploaded.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl HostingProvider for FakeHosting {
    async fn create_repository(
        &self,
        name: &str,
        _token: &str,
    ) -> Result<CreatedRepository, HostingError> {
        self.record(format!("create {name}"));
        if let Some(err) = self.fail_create.lock().unwrap().take() {
            return Err(err);
        }
        let repo = CreatedRepository {
            owner: self.owner.clone(),
            name: name.to_string(),
            html_url: format!("https://github.com/{}/{}", self.owner, name),
        };
        self.repos
            .lock()
            .unwrap()
            .insert(name.to_string(), repo.clone());
        Ok(repo)
    }

    async fn upload_file(
        &self,
        _owner: &str,
        repo: &str,
        file: &NamedFile,
        _token: &str,
    ) -> Result<(), HostingError> {
        self.record(format!("upload {repo}/{}", file.name));
        if self.fail_upload_once.lock().unwrap().remove(&file.name) {
            return Err(HostingError::Upload {
                file: file.name.clone(),
                status: 500,
                message: "Server Error".into(),
            });
        }
        self.uploaded.lock().unwrap().push(file.clone());
        Ok(())
    }

    async fn repository_ready(
        &self,
        _owner: &str,
        repo: &str,
        _token: &str,
    ) -> Result<bool, HostingError> {
        self.record(format!("ready {repo}"));
        let mut remaining = self.not_ready_for.lock().unwrap();
        if *remaining > 0 {
            *remaining -= 1;
            return Ok(false);
        }
        Ok(true)
    }

    async fn enable_public_hosting(
        &self,
        owner: &str,
        repo: &str,
        _token: &str,
    ) -> Result<PublicSite, HostingError> {
        self.record(format!("pages {repo}"));
        let status = self.pages_status.lock().unwrap().unwrap_or(201);
        if status != 201 {
            return Err(HostingError::UnexpectedStatus {
                expected: 201,
                status,
                message: "GitHub Pages is already enabled.".into(),
            });
        }
        Ok(PublicSite {
            public_url: format!("https://{owner}.github.io/{repo}/"),
        })
    }

    async fn delete_repository(
        &self,
        _owner: &str,
        repo: &str,
        _token: &str,
    ) -> Result<(), HostingError> {
        self.record(format!("delete {repo}"));
        if self.fail_delete.lock().unwrap().contains(repo) {
            return Err(HostingError::Api {
                status: 403,
                message: "Must have admin rights to Repository.".into(),
            });
        }
        self.deleted.lock().unwrap().push(repo.to_string());
        self.repos.lock().unwrap().remove(repo);
        Ok(())
    }
}
