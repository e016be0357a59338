//! The create-a-site workflow.
//!
//! ```text
//!   Idle ──request_plan──▶ PlanPending ──ok──▶ PlanReady ──confirm_and_deploy──▶ Deploying ──ok──▶ Done
//!    ▲                         │                  ▲  │ edit_plan                     │
//!    └─────────── error ───────┘                  │  └──────┘                        │
//!                                                 └──────────────── error ───────────┘
//! ```
//!
//! Deploying runs the [`DeployStep`]s in order. Progress is written to a
//! [`DeployCheckpoint`] after every step, so confirming the same plan again
//! after a failure resumes where it stopped instead of creating another
//! repository.

pub mod checkpoint;
#[cfg(test)]
pub(crate) mod fakes;

pub use checkpoint::{
    CleanupReport, DeployCheckpoint, OrphanedRepository, cleanup_candidates, cleanup_orphans,
    load_orphans, record_orphan,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::HostingSection;
use crate::errors::{GenerationError, HostingError, ValidationError, WorkflowError};
use crate::generation::SiteGenerator;
use crate::hosting::{CreatedRepository, HostingProvider};
use crate::models::{AppPlan, AppRecord, NamedFile, README, Settings, has_entry_point};
use crate::registry::AppRegistry;
use crate::store::LocalStore;
use crate::util::slugify;

/// Longest slug used in a repository name, leaving room for the suffix.
const MAX_SLUG_LEN: usize = 90;

/// One step of a deployment, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeployStep {
    GenerateFiles,
    CreateRepository,
    UploadFiles,
    WaitForRepository,
    EnablePublicHosting,
    Register,
}

impl DeployStep {
    pub const ALL: [DeployStep; 6] = [
        DeployStep::GenerateFiles,
        DeployStep::CreateRepository,
        DeployStep::UploadFiles,
        DeployStep::WaitForRepository,
        DeployStep::EnablePublicHosting,
        DeployStep::Register,
    ];
}

impl fmt::Display for DeployStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DeployStep::GenerateFiles => "Generate files",
            DeployStep::CreateRepository => "Create repository",
            DeployStep::UploadFiles => "Upload files",
            DeployStep::WaitForRepository => "Wait for repository",
            DeployStep::EnablePublicHosting => "Enable public hosting",
            DeployStep::Register => "Save app",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Idle,
    PlanPending,
    PlanReady,
    Deploying,
    Done,
}

impl WorkflowState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowState::Idle => "idle",
            WorkflowState::PlanPending => "waiting for a plan",
            WorkflowState::PlanReady => "ready to deploy",
            WorkflowState::Deploying => "deploying",
            WorkflowState::Done => "done",
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives deploy progress. All methods default to doing nothing.
pub trait WorkflowObserver: Send + Sync {
    fn step_started(&self, _step: DeployStep) {}
    fn step_finished(&self, _step: DeployStep) {}
    fn message(&self, _text: &str) {}
    fn failed(&self, _step: DeployStep, _error: &str) {}
}

pub struct NoopObserver;

impl WorkflowObserver for NoopObserver {}

/// Tunables for a deploy.
#[derive(Debug, Clone)]
pub struct WorkflowOptions {
    /// Readiness checks before giving up. Zero skips the wait.
    pub ready_attempts: u32,
    pub ready_interval: Duration,
    /// Delete the repository when a deploy fails.
    pub cleanup_on_failure: bool,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self::from(&HostingSection::default())
    }
}

impl From<&HostingSection> for WorkflowOptions {
    fn from(hosting: &HostingSection) -> Self {
        Self {
            ready_attempts: hosting.ready_attempts,
            ready_interval: hosting.ready_interval(),
            cleanup_on_failure: hosting.cleanup_on_failure,
        }
    }
}

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// `<slug>-<NNNN>`, the suffix being the low four digits of `now` in
/// milliseconds.
pub fn derive_repo_name(name: &str, now: DateTime<Utc>) -> String {
    let mut slug = slugify(name, MAX_SLUG_LEN);
    if slug.is_empty() {
        slug = "site".to_string();
    }
    format!("{}-{:04}", slug, now.timestamp_millis().rem_euclid(10_000))
}

/// Generated files plus a README built from the plan. A generated README is
/// replaced.
pub fn assemble_files(generated: &[NamedFile], plan: &AppPlan) -> Vec<NamedFile> {
    let mut files: Vec<NamedFile> = generated
        .iter()
        .filter(|f| f.name != README)
        .cloned()
        .collect();
    files.push(NamedFile::new(
        README,
        format!("# {}\n\n{}\n", plan.name, plan.description),
    ));
    files
}

pub struct CreationWorkflow {
    generator: Arc<dyn SiteGenerator>,
    hosting: Arc<dyn HostingProvider>,
    store: LocalStore,
    options: WorkflowOptions,
    clock: Clock,
    observer: Arc<dyn WorkflowObserver>,
    state: WorkflowState,
    prompt: String,
    draft: Option<AppPlan>,
    last_error: Option<String>,
    checkpoint: Option<DeployCheckpoint>,
}

impl CreationWorkflow {
    /// A workflow in `Idle`. A checkpoint left by an earlier failed deploy is
    /// picked up from `store`.
    pub fn new(
        generator: Arc<dyn SiteGenerator>,
        hosting: Arc<dyn HostingProvider>,
        store: LocalStore,
        options: WorkflowOptions,
    ) -> Self {
        let checkpoint = DeployCheckpoint::load(&store);
        if let Some(cp) = &checkpoint {
            tracing::debug!(plan = %cp.plan.name, failed_step = ?cp.failed_step, "found pending deployment");
        }
        Self {
            generator,
            hosting,
            store,
            options,
            clock: Arc::new(Utc::now),
            observer: Arc::new(NoopObserver),
            state: WorkflowState::Idle,
            prompt: String::new(),
            draft: None,
            last_error: None,
            checkpoint,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn WorkflowObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// The plan being edited, present from `PlanReady` on.
    pub fn draft(&self) -> Option<&AppPlan> {
        self.draft.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn checkpoint(&self) -> Option<&DeployCheckpoint> {
        self.checkpoint.as_ref()
    }

    fn require(&self, expected: WorkflowState) -> Result<(), ValidationError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(ValidationError::InvalidState {
                expected: expected.as_str(),
                actual: self.state.as_str(),
            })
        }
    }

    /// Ask the generator for a plan. Any earlier draft is discarded.
    pub async fn request_plan(&mut self, prompt: &str) -> Result<&AppPlan, WorkflowError> {
        if prompt.trim().is_empty() {
            let err = ValidationError::EmptyPrompt;
            self.last_error = Some(err.to_string());
            return Err(err.into());
        }

        self.state = WorkflowState::PlanPending;
        self.prompt = prompt.to_string();
        self.draft = None;
        self.last_error = None;

        match self.generator.generate_plan(prompt).await {
            Ok(plan) => {
                tracing::info!(name = %plan.name, "plan ready");
                self.state = WorkflowState::PlanReady;
                Ok(&*self.draft.insert(plan))
            }
            Err(e) => {
                tracing::warn!(error = %e, "plan generation failed");
                self.state = WorkflowState::Idle;
                self.last_error = Some(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Skip plan generation and start from a plan supplied by the user.
    pub fn use_plan(&mut self, prompt: &str, plan: AppPlan) -> Result<(), ValidationError> {
        if prompt.trim().is_empty() {
            return Err(ValidationError::EmptyPrompt);
        }
        self.prompt = prompt.to_string();
        self.draft = Some(plan);
        self.last_error = None;
        self.state = WorkflowState::PlanReady;
        Ok(())
    }

    /// Replace the draft's fields. Emptiness is checked at deploy time.
    pub fn edit_plan(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<(), ValidationError> {
        self.require(WorkflowState::PlanReady)?;
        self.draft = Some(AppPlan {
            name: name.into(),
            description: description.into(),
        });
        Ok(())
    }

    /// Go back to `Idle`, dropping the draft. A pending checkpoint is kept.
    pub fn reset(&mut self) {
        self.state = WorkflowState::Idle;
        self.draft = None;
        self.last_error = None;
    }

    /// Deploy the draft plan and register the result.
    ///
    /// On failure the workflow returns to `PlanReady` with the draft intact
    /// and the error is available from [`last_error`](Self::last_error).
    pub async fn confirm_and_deploy(
        &mut self,
        settings: &Settings,
        registry: &mut AppRegistry,
    ) -> Result<AppRecord, WorkflowError> {
        self.require(WorkflowState::PlanReady)?;
        let Some(plan) = self.draft.clone() else {
            return Err(ValidationError::EmptyName.into());
        };

        if let Err(e) = validate_plan(&plan) {
            self.last_error = Some(e.to_string());
            return Err(e.into());
        }
        if !settings.has_token() {
            let err = WorkflowError::NeedsSettings;
            self.last_error = Some(err.to_string());
            return Err(err);
        }
        let token = settings.github_token.trim().to_string();

        let mut checkpoint = match self.resume_or_start(&plan) {
            Ok(cp) => cp,
            Err(e) => {
                self.last_error = Some(e.to_string());
                return Err(e);
            }
        };
        self.state = WorkflowState::Deploying;
        self.last_error = None;
        let result = self.run_steps(&mut checkpoint, &token, registry).await;

        match result {
            Ok(record) => {
                if let Err(e) = DeployCheckpoint::clear(&self.store) {
                    tracing::warn!(error = %e, "could not clear deployment checkpoint");
                }
                self.checkpoint = None;
                self.state = WorkflowState::Done;
                tracing::info!(id = %record.id, url = ?record.public_url, "site deployed");
                Ok(record)
            }
            Err(err) => {
                if let Some(step) = err.step() {
                    checkpoint.failed_step = Some(step);
                    self.observer.failed(step, &err.to_string());
                }
                tracing::error!(error = %err, "deployment failed");
                if self.options.cleanup_on_failure {
                    self.delete_failed_repository(&mut checkpoint, &token).await;
                }
                if let Err(e) = checkpoint.save(&self.store) {
                    tracing::warn!(error = %e, "could not save deployment checkpoint");
                }
                self.checkpoint = Some(checkpoint);
                self.state = WorkflowState::PlanReady;
                self.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Reuse the pending checkpoint if it was for this exact plan. Otherwise
    /// its repository becomes an orphan and a fresh checkpoint starts.
    fn resume_or_start(&mut self, plan: &AppPlan) -> Result<DeployCheckpoint, WorkflowError> {
        let now = (self.clock)();
        match self.checkpoint.take() {
            Some(cp) if cp.plan == *plan => {
                tracing::info!(
                    failed_step = ?cp.failed_step,
                    uploaded = cp.uploaded.len(),
                    "resuming previous deployment"
                );
                self.observer.message("Resuming previous deployment");
                Ok(cp)
            }
            Some(stale) => {
                if let Some(repo) = &stale.repository {
                    record_orphan(&self.store, OrphanedRepository::from_created(repo, now))?;
                    self.observer.message(&format!(
                        "Left {} from an earlier attempt; run `sitewright cleanup` to delete it",
                        repo.html_url
                    ));
                }
                Ok(DeployCheckpoint::new(plan.clone(), self.prompt.clone(), now))
            }
            None => Ok(DeployCheckpoint::new(plan.clone(), self.prompt.clone(), now)),
        }
    }

    async fn run_steps(
        &self,
        cp: &mut DeployCheckpoint,
        token: &str,
        registry: &mut AppRegistry,
    ) -> Result<AppRecord, WorkflowError> {
        let plan = cp.plan.clone();

        let generated = match cp.generated.clone() {
            Some(files) => files,
            None => {
                let files = self
                    .step(DeployStep::GenerateFiles, self.generate_files(&plan))
                    .await?;
                cp.generated = Some(files.clone());
                self.save(cp);
                files
            }
        };

        let repo = match cp.repository.clone() {
            Some(repo) => repo,
            None => {
                let name = derive_repo_name(&plan.name, (self.clock)());
                tracing::info!(repo = %name, "creating repository");
                let repo = self
                    .step(DeployStep::CreateRepository, async {
                        Ok::<_, WorkflowError>(self.hosting.create_repository(&name, token).await?)
                    })
                    .await?;
                cp.repository = Some(repo.clone());
                cp.uploaded.clear();
                self.save(cp);
                repo
            }
        };

        let files = assemble_files(&generated, &plan);
        let public_url = match cp.public_url.clone() {
            Some(url) => url,
            None => {
                self.step(
                    DeployStep::UploadFiles,
                    self.upload_remaining(&repo, &files, cp, token),
                )
                .await?;

                self.step(
                    DeployStep::WaitForRepository,
                    self.await_ready(&repo, token),
                )
                .await?;

                let site = self
                    .step(DeployStep::EnablePublicHosting, async {
                        Ok::<_, WorkflowError>(self
                            .hosting
                            .enable_public_hosting(&repo.owner, &repo.name, token)
                            .await?)
                    })
                    .await?;
                cp.public_url = Some(site.public_url.clone());
                self.save(cp);
                site.public_url
            }
        };

        let record = AppRecord {
            id: repo.name.clone(),
            prompt: cp.prompt.clone(),
            plan: Some(plan),
            files,
            created_at: (self.clock)(),
            github_repo_url: Some(repo.html_url.clone()),
            public_url: Some(public_url),
            chat_history: Vec::new(),
        };
        self.step(DeployStep::Register, async {
            registry.add(record.clone())?;
            Ok::<_, WorkflowError>(())
        })
        .await?;

        Ok(record)
    }

    /// Run `fut` as `step`, reporting to the observer and tagging errors.
    async fn step<T>(
        &self,
        step: DeployStep,
        fut: impl Future<Output = Result<T, WorkflowError>>,
    ) -> Result<T, WorkflowError> {
        self.observer.step_started(step);
        tracing::debug!(%step, "step started");
        match fut.await {
            Ok(value) => {
                self.observer.step_finished(step);
                Ok(value)
            }
            Err(source) => Err(WorkflowError::Step {
                step,
                source: Box::new(source),
            }),
        }
    }

    async fn generate_files(&self, plan: &AppPlan) -> Result<Vec<NamedFile>, WorkflowError> {
        let files = self.generator.generate_files(&plan.description).await?;
        if !has_entry_point(&files) {
            return Err(GenerationError::MissingEntryPoint(
                crate::models::ENTRY_POINT.to_string(),
            )
            .into());
        }
        tracing::info!(count = files.len(), "files generated");
        Ok(files)
    }

    /// Upload files not yet recorded in the checkpoint, saving after each.
    async fn upload_remaining(
        &self,
        repo: &CreatedRepository,
        files: &[NamedFile],
        cp: &mut DeployCheckpoint,
        token: &str,
    ) -> Result<(), WorkflowError> {
        for file in files {
            if cp.uploaded.contains(&file.name) {
                tracing::debug!(file = %file.name, "already uploaded");
                continue;
            }
            self.observer.message(&format!("Uploading {}", file.name));
            self.hosting
                .upload_file(&repo.owner, &repo.name, file, token)
                .await?;
            cp.uploaded.push(file.name.clone());
            self.save(cp);
        }
        Ok(())
    }

    async fn await_ready(&self, repo: &CreatedRepository, token: &str) -> Result<(), WorkflowError> {
        let attempts = self.options.ready_attempts;
        if attempts == 0 {
            return Ok(());
        }
        for attempt in 1..=attempts {
            if self
                .hosting
                .repository_ready(&repo.owner, &repo.name, token)
                .await?
            {
                tracing::debug!(attempt, "repository ready");
                return Ok(());
            }
            if attempt < attempts {
                tokio::time::sleep(self.options.ready_interval).await;
            }
        }
        Err(HostingError::NotReady { attempts }.into())
    }

    /// Delete the repository of a failed deploy, unless its site is
    /// already live.
    async fn delete_failed_repository(&self, cp: &mut DeployCheckpoint, token: &str) {
        let Some(repo) = cp.repository.clone() else {
            return;
        };
        if cp.public_url.is_some() {
            tracing::info!(repo = %repo.name, "keeping repository of failed deployment: site is live");
            return;
        }
        match self
            .hosting
            .delete_repository(&repo.owner, &repo.name, token)
            .await
        {
            Ok(()) => {
                tracing::info!(repo = %repo.name, "deleted repository of failed deployment");
                self.observer
                    .message(&format!("Deleted {} after the failure", repo.html_url));
                cp.forget_repository();
            }
            Err(e) => {
                tracing::warn!(repo = %repo.name, error = %e, "could not delete repository of failed deployment");
            }
        }
    }

    fn save(&self, cp: &DeployCheckpoint) {
        if let Err(e) = cp.save(&self.store) {
            tracing::warn!(error = %e, "could not save deployment checkpoint");
        }
    }
}

fn validate_plan(plan: &AppPlan) -> Result<(), ValidationError> {
    if plan.name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if plan.description.trim().is_empty() {
        return Err(ValidationError::EmptyDescription);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ENTRY_POINT;
    use chrono::TimeZone;
    use crate::workflow::fakes::{FakeGenerator, FakeHosting};
    use std::sync::Mutex;
    use tempfile::{TempDir, tempdir};

    struct Harness {
        _dir: TempDir,
        store: LocalStore,
        generator: Arc<FakeGenerator>,
        hosting: Arc<FakeHosting>,
    }

    impl Harness {
        fn new() -> Self {
            let dir = tempdir().unwrap();
            let store = LocalStore::open(dir.path()).unwrap();
            Self {
                _dir: dir,
                store,
                generator: Arc::new(FakeGenerator::default()),
                hosting: Arc::new(FakeHosting::default()),
            }
        }

        fn workflow(&self, options: WorkflowOptions) -> CreationWorkflow {
            CreationWorkflow::new(
                self.generator.clone(),
                self.hosting.clone(),
                self.store.clone(),
                options,
            )
            .with_clock(fixed_clock())
        }

        fn registry(&self) -> AppRegistry {
            AppRegistry::load(self.store.clone())
        }
    }

    /// 1_700_000_001_234 ms: the low four digits are 1234.
    fn fixed_clock() -> Clock {
        Arc::new(|| Utc.timestamp_millis_opt(1_700_000_001_234).unwrap())
    }

    fn options() -> WorkflowOptions {
        WorkflowOptions {
            ready_attempts: 3,
            ready_interval: Duration::ZERO,
            cleanup_on_failure: false,
        }
    }

    fn settings() -> Settings {
        Settings {
            github_token: "ghp_test".into(),
        }
    }

    fn plan(name: &str, description: &str) -> AppPlan {
        AppPlan {
            name: name.into(),
            description: description.into(),
        }
    }

    fn site_files() -> Vec<NamedFile> {
        vec![
            NamedFile::new(ENTRY_POINT, "<h1>Fresh bread</h1>"),
            NamedFile::new("style.css", "h1 { color: brown; }"),
        ]
    }

    #[derive(Default)]
    struct RecordingObserver {
        events: Mutex<Vec<String>>,
    }

    impl WorkflowObserver for RecordingObserver {
        fn step_started(&self, step: DeployStep) {
            self.events.lock().unwrap().push(format!("start {step}"));
        }
        fn step_finished(&self, step: DeployStep) {
            self.events.lock().unwrap().push(format!("done {step}"));
        }
        fn failed(&self, step: DeployStep, _error: &str) {
            self.events.lock().unwrap().push(format!("fail {step}"));
        }
    }

    #[test]
    fn test_derive_repo_name() {
        let now = Utc.timestamp_millis_opt(1_700_000_001_234).unwrap();
        assert_eq!(derive_repo_name("Baker Bio", now), "baker-bio-1234");
        assert_eq!(derive_repo_name("!!!", now), "site-1234");
        let early = Utc.timestamp_millis_opt(1_700_000_000_042).unwrap();
        assert_eq!(derive_repo_name("Baker Bio", early), "baker-bio-0042");
    }

    #[test]
    fn test_assemble_files_replaces_generated_readme() {
        let generated = vec![
            NamedFile::new(ENTRY_POINT, "x"),
            NamedFile::new(README, "generated"),
        ];
        let files = assemble_files(&generated, &plan("Baker Bio", "A bakery."));
        assert_eq!(files.len(), 2);
        assert_eq!(files[1].name, README);
        assert_eq!(files[1].content, "# Baker Bio\n\nA bakery.\n");
    }

    #[test]
    fn test_deploy_step_display() {
        assert_eq!(DeployStep::UploadFiles.to_string(), "Upload files");
        assert_eq!(DeployStep::ALL.len(), 6);
    }

    #[tokio::test]
    async fn test_request_plan_rejects_empty_prompt() {
        let h = Harness::new();
        let mut wf = h.workflow(options());
        let err = wf.request_plan("   ").await.unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::Validation(ValidationError::EmptyPrompt)
        ));
        assert_eq!(wf.state(), WorkflowState::Idle);
        assert!(wf.last_error().is_some());
    }

    #[tokio::test]
    async fn test_plan_failure_returns_to_idle() {
        let h = Harness::new();
        h.generator.push_plan(Err(GenerationError::Api {
            status: 503,
            message: "overloaded".into(),
        }));
        let mut wf = h.workflow(options());
        assert!(wf.request_plan("a bakery site").await.is_err());
        assert_eq!(wf.state(), WorkflowState::Idle);
        assert!(wf.last_error().unwrap().contains("overloaded"));
    }

    #[tokio::test]
    async fn test_edit_plan_requires_plan_ready() {
        let h = Harness::new();
        let mut wf = h.workflow(options());
        let err = wf.edit_plan("a", "b").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn test_end_to_end_deploy() {
        let h = Harness::new();
        h.generator
            .push_plan(Ok(plan("Baker Bio", "A portfolio for a baker.")));
        h.generator.push_files(Ok(site_files()));
        let observer = Arc::new(RecordingObserver::default());
        let mut wf = h.workflow(options()).with_observer(observer.clone());
        let mut registry = h.registry();

        wf.request_plan("portfolio for a baker").await.unwrap();
        assert_eq!(wf.state(), WorkflowState::PlanReady);
        let record = wf.confirm_and_deploy(&settings(), &mut registry).await.unwrap();

        assert_eq!(wf.state(), WorkflowState::Done);
        assert_eq!(record.id, "baker-bio-1234");
        assert_eq!(record.prompt, "portfolio for a baker");
        assert_eq!(
            record.github_repo_url.as_deref(),
            Some("https://github.com/u/baker-bio-1234")
        );
        assert_eq!(
            record.public_url.as_deref(),
            Some("https://u.github.io/baker-bio-1234/")
        );
        let names: Vec<&str> = record.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec![ENTRY_POINT, "style.css", README]);
        assert_eq!(
            record.file(README).unwrap().content,
            "# Baker Bio\n\nA portfolio for a baker.\n"
        );

        assert_eq!(h.generator.file_prompts(), vec!["A portfolio for a baker."]);
        assert_eq!(h.hosting.uploaded().len(), 3);
        assert_eq!(registry.find_by_id("baker-bio-1234"), Some(&record));
        assert!(DeployCheckpoint::load(&h.store).is_none());
        assert!(wf.checkpoint().is_none());

        let events = observer.events.lock().unwrap().clone();
        assert_eq!(events.first().map(String::as_str), Some("start Generate files"));
        assert_eq!(events.last().map(String::as_str), Some("done Save app"));
    }

    #[tokio::test]
    async fn test_edited_plan_is_deployed() {
        let h = Harness::new();
        h.generator.push_plan(Ok(plan("Draft", "Draft description")));
        h.generator.push_files(Ok(site_files()));
        let mut wf = h.workflow(options());
        let mut registry = h.registry();

        wf.request_plan("bakery").await.unwrap();
        wf.edit_plan("Crumb & Co", "A bakery in Lyon").unwrap();
        let record = wf.confirm_and_deploy(&settings(), &mut registry).await.unwrap();

        assert_eq!(record.id, "crumb-co-1234");
        assert_eq!(h.generator.file_prompts(), vec!["A bakery in Lyon"]);
    }

    #[tokio::test]
    async fn test_deploy_without_token_needs_settings() {
        let h = Harness::new();
        let mut wf = h.workflow(options());
        wf.use_plan("bakery", plan("Baker", "Bread")).unwrap();
        let err = wf
            .confirm_and_deploy(&Settings::default(), &mut h.registry())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::NeedsSettings));
        assert_eq!(wf.state(), WorkflowState::PlanReady);
        assert!(h.hosting.calls().is_empty());
    }

    #[tokio::test]
    async fn test_deploy_rejects_blank_plan_fields() {
        let h = Harness::new();
        let mut wf = h.workflow(options());
        wf.use_plan("bakery", plan("Baker", "Bread")).unwrap();
        wf.edit_plan("  ", "Bread").unwrap();
        let err = wf
            .confirm_and_deploy(&settings(), &mut h.registry())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::Validation(ValidationError::EmptyName)
        ));
        assert_eq!(wf.state(), WorkflowState::PlanReady);
    }

    #[tokio::test]
    async fn test_upload_failure_keeps_draft_and_resumes() {
        let h = Harness::new();
        h.generator.push_files(Ok(site_files()));
        h.hosting.fail_upload_of("style.css");
        let mut wf = h.workflow(options());
        let mut registry = h.registry();
        wf.use_plan("bakery", plan("Baker Bio", "Bread")).unwrap();

        let err = wf.confirm_and_deploy(&settings(), &mut registry).await.unwrap_err();
        assert_eq!(err.step(), Some(DeployStep::UploadFiles));
        assert!(err.to_string().starts_with("Upload files failed"));
        assert_eq!(wf.state(), WorkflowState::PlanReady);
        assert_eq!(wf.draft(), Some(&plan("Baker Bio", "Bread")));
        assert!(registry.is_empty());

        let cp = DeployCheckpoint::load(&h.store).unwrap();
        assert_eq!(cp.uploaded, vec![ENTRY_POINT.to_string()]);
        assert_eq!(cp.failed_step, Some(DeployStep::UploadFiles));

        // Retry: no second repository, no re-generation, index.html not re-sent
        let record = wf.confirm_and_deploy(&settings(), &mut registry).await.unwrap();
        assert_eq!(record.id, "baker-bio-1234");
        let creates = h
            .hosting
            .calls()
            .iter()
            .filter(|c| c.starts_with("create"))
            .count();
        assert_eq!(creates, 1);
        assert_eq!(h.generator.file_prompts().len(), 1);
        let index_uploads = h
            .hosting
            .uploaded()
            .iter()
            .filter(|f| f.name == ENTRY_POINT)
            .count();
        assert_eq!(index_uploads, 1);
        assert!(DeployCheckpoint::load(&h.store).is_none());
    }

    #[tokio::test]
    async fn test_checkpoint_survives_new_workflow() {
        let h = Harness::new();
        h.generator.push_files(Ok(site_files()));
        h.hosting.fail_upload_of(README);
        {
            let mut wf = h.workflow(options());
            wf.use_plan("bakery", plan("Baker Bio", "Bread")).unwrap();
            assert!(wf.confirm_and_deploy(&settings(), &mut h.registry()).await.is_err());
        }

        let mut wf = h.workflow(options());
        assert!(wf.checkpoint().is_some());
        wf.use_plan("bakery", plan("Baker Bio", "Bread")).unwrap();
        let record = wf
            .confirm_and_deploy(&settings(), &mut h.registry())
            .await
            .unwrap();
        assert_eq!(record.files.len(), 3);
    }

    #[tokio::test]
    async fn test_changed_plan_orphans_old_repository() {
        let h = Harness::new();
        h.generator.push_files(Ok(site_files()));
        h.generator.push_files(Ok(site_files()));
        h.hosting.pages_status(409);
        let mut wf = h.workflow(options());
        let mut registry = h.registry();
        wf.use_plan("bakery", plan("Baker Bio", "Bread")).unwrap();
        let err = wf.confirm_and_deploy(&settings(), &mut registry).await.unwrap_err();
        assert_eq!(err.step(), Some(DeployStep::EnablePublicHosting));

        h.hosting.pages_status(201);
        wf.edit_plan("Baker Bio Deluxe", "Bread and pastries").unwrap();
        wf.confirm_and_deploy(&settings(), &mut registry).await.unwrap();

        let orphans = load_orphans(&h.store);
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].name, "baker-bio-1234");
        assert_eq!(h.generator.file_prompts().len(), 2);
    }

    #[tokio::test]
    async fn test_cleanup_on_failure_deletes_repository() {
        let h = Harness::new();
        h.generator.push_files(Ok(site_files()));
        h.hosting.fail_upload_of(ENTRY_POINT);
        let mut wf = h.workflow(WorkflowOptions {
            cleanup_on_failure: true,
            ..options()
        });
        wf.use_plan("bakery", plan("Baker Bio", "Bread")).unwrap();
        assert!(wf.confirm_and_deploy(&settings(), &mut h.registry()).await.is_err());

        assert_eq!(h.hosting.deleted(), vec!["baker-bio-1234".to_string()]);
        let cp = DeployCheckpoint::load(&h.store).unwrap();
        assert!(cp.repository.is_none());
        assert!(cp.generated.is_some());
    }

    #[tokio::test]
    async fn test_register_failure_keeps_live_site_and_resumes() {
        let h = Harness::new();
        h.generator.push_files(Ok(site_files()));
        let mut registry = h.registry();
        registry
            .add(AppRecord {
                id: "baker-bio-1234".into(),
                prompt: "older".into(),
                plan: None,
                files: vec![],
                created_at: Utc.timestamp_opt(0, 0).unwrap(),
                github_repo_url: None,
                public_url: None,
                chat_history: vec![],
            })
            .unwrap();
        let mut wf = h.workflow(WorkflowOptions {
            cleanup_on_failure: true,
            ..options()
        });
        wf.use_plan("bakery", plan("Baker Bio", "Bread")).unwrap();

        let err = wf.confirm_and_deploy(&settings(), &mut registry).await.unwrap_err();
        assert_eq!(err.step(), Some(DeployStep::Register));
        assert!(h.hosting.deleted().is_empty());
        let cp = DeployCheckpoint::load(&h.store).unwrap();
        assert!(cp.repository.is_some());
        assert_eq!(
            cp.public_url.as_deref(),
            Some("https://u.github.io/baker-bio-1234/")
        );

        // Pages is already on; asking again would conflict
        h.hosting.pages_status(409);
        registry.remove("baker-bio-1234").unwrap();
        let record = wf.confirm_and_deploy(&settings(), &mut registry).await.unwrap();
        assert_eq!(
            record.public_url.as_deref(),
            Some("https://u.github.io/baker-bio-1234/")
        );
        let pages_calls = h
            .hosting
            .calls()
            .iter()
            .filter(|c| c.starts_with("pages"))
            .count();
        assert_eq!(pages_calls, 1);
        assert!(DeployCheckpoint::load(&h.store).is_none());
    }

    #[tokio::test]
    async fn test_create_failure_keeps_generated_files() {
        let h = Harness::new();
        h.generator.push_files(Ok(site_files()));
        h.hosting.fail_create_with(HostingError::Api {
            status: 422,
            message: "name already exists on this account".into(),
        });
        let mut wf = h.workflow(options());
        wf.use_plan("bakery", plan("Baker Bio", "Bread")).unwrap();
        let err = wf
            .confirm_and_deploy(&settings(), &mut h.registry())
            .await
            .unwrap_err();
        assert_eq!(err.step(), Some(DeployStep::CreateRepository));
        assert!(err.to_string().contains("name already exists"));

        let cp = wf.checkpoint().unwrap();
        assert!(cp.repository.is_none());
        assert_eq!(cp.generated.as_ref().map(Vec::len), Some(2));

        // Retry creates the repository without asking for files again
        wf.confirm_and_deploy(&settings(), &mut h.registry())
            .await
            .unwrap();
        assert_eq!(h.generator.file_prompts().len(), 1);
    }

    #[tokio::test]
    async fn test_readiness_polls_until_ready() {
        let h = Harness::new();
        h.generator.push_files(Ok(site_files()));
        h.hosting.not_ready_for(2);
        let mut wf = h.workflow(options());
        wf.use_plan("bakery", plan("Baker Bio", "Bread")).unwrap();
        wf.confirm_and_deploy(&settings(), &mut h.registry())
            .await
            .unwrap();
        let checks = h
            .hosting
            .calls()
            .iter()
            .filter(|c| c.starts_with("ready"))
            .count();
        assert_eq!(checks, 3);
    }

    #[tokio::test]
    async fn test_readiness_gives_up() {
        let h = Harness::new();
        h.generator.push_files(Ok(site_files()));
        h.hosting.not_ready_for(10);
        let mut wf = h.workflow(options());
        wf.use_plan("bakery", plan("Baker Bio", "Bread")).unwrap();
        let err = wf
            .confirm_and_deploy(&settings(), &mut h.registry())
            .await
            .unwrap_err();
        assert_eq!(err.step(), Some(DeployStep::WaitForRepository));
        assert!(err.is_transient());
        assert!(h.hosting.calls().iter().all(|c| !c.starts_with("pages")));
    }

    #[tokio::test]
    async fn test_generated_files_without_entry_point_fail() {
        let h = Harness::new();
        h.generator
            .push_files(Ok(vec![NamedFile::new("style.css", "")]));
        let mut wf = h.workflow(options());
        wf.use_plan("bakery", plan("Baker Bio", "Bread")).unwrap();
        let err = wf
            .confirm_and_deploy(&settings(), &mut h.registry())
            .await
            .unwrap_err();
        assert_eq!(err.step(), Some(DeployStep::GenerateFiles));
        assert!(h.hosting.calls().is_empty());
    }

    #[tokio::test]
    async fn test_upload_files_stops_at_first_failure() {
        let hosting = FakeHosting::default();
        hosting.fail_upload_of("style.css");
        let files = vec![
            NamedFile::new(ENTRY_POINT, "a"),
            NamedFile::new("style.css", "b"),
            NamedFile::new(README, "c"),
        ];
        let err = hosting
            .upload_files("u", "site", &files, "ghp_test")
            .await
            .unwrap_err();
        assert!(matches!(err, HostingError::Upload { ref file, .. } if file == "style.css"));
        let uploaded: Vec<String> = hosting.uploaded().into_iter().map(|f| f.name).collect();
        assert_eq!(uploaded, vec![ENTRY_POINT.to_string()]);
    }

    #[tokio::test]
    async fn test_confirm_from_idle_is_invalid() {
        let h = Harness::new();
        let mut wf = h.workflow(options());
        let err = wf
            .confirm_and_deploy(&settings(), &mut h.registry())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::Validation(ValidationError::InvalidState { .. })
        ));
    }
}
