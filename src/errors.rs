//! Typed error hierarchy for sitewright.
//!
//! One enum per subsystem:
//! - `GenerationError`: generative content service failures
//! - `HostingError`: source-hosting API failures
//! - `ValidationError`: missing or malformed user input
//! - `StoreError` / `RegistryError`: local persistence
//! - `WorkflowError`: everything the creation workflow can surface

use thiserror::Error;

use crate::workflow::DeployStep;

/// Errors from the generative content service.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Could not reach the generation service: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Generation service returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Generation service returned an unexpected response: {0}")]
    MalformedResponse(String),

    #[error("Generated site is missing the entry point file '{0}'")]
    MissingEntryPoint(String),

    #[error("No API key configured for the generation service (set GEMINI_API_KEY)")]
    MissingApiKey,
}

impl GenerationError {
    /// Whether retrying the same request might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            GenerationError::Transport(_) => true,
            GenerationError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Errors from the source-hosting API.
#[derive(Debug, Error)]
pub enum HostingError {
    #[error("Could not reach the hosting service: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Hosting service returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Failed to upload {file} ({status}): {message}")]
    Upload {
        file: String,
        status: u16,
        message: String,
    },

    #[error("Expected status {expected} from hosting service but got {status}: {message}")]
    UnexpectedStatus {
        expected: u16,
        status: u16,
        message: String,
    },

    #[error("Repository was not ready after {attempts} attempts")]
    NotReady { attempts: u32 },

    #[error("Invalid file content: {0}")]
    InvalidContent(String),
}

/// Missing or malformed user input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Describe the website you want before generating a plan")]
    EmptyPrompt,

    #[error("The plan needs a name")]
    EmptyName,

    #[error("The plan needs a description")]
    EmptyDescription,

    #[error("Cannot do that while the workflow is {actual} (expected {expected})")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },
}

/// Errors from the local JSON store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid store key '{0}': use letters, digits, '-' or '_'")]
    InvalidKey(String),

    #[error("Failed to access {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Stored value for key '{key}' could not be read: {source}")]
    Parse {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize value for key '{key}': {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors from the app registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("An app with id '{0}' already exists")]
    DuplicateId(String),

    #[error("App '{0}' not found")]
    NotFound(String),

    #[error("App '{id}' has no file named '{file}'")]
    FileNotFound { id: String, file: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors surfaced by the creation workflow.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("A GitHub token is required to deploy. Run `sitewright settings set-token <TOKEN>`")]
    NeedsSettings,

    #[error("{step} failed: {source}")]
    Step {
        step: DeployStep,
        #[source]
        source: Box<WorkflowError>,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Hosting(#[from] HostingError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl WorkflowError {
    /// The step the error happened in, if it happened while deploying.
    pub fn step(&self) -> Option<DeployStep> {
        match self {
            WorkflowError::Step { step, .. } => Some(*step),
            _ => None,
        }
    }

    /// Whether the underlying failure looks worth retrying as-is.
    pub fn is_transient(&self) -> bool {
        match self {
            WorkflowError::Step { source, .. } => source.is_transient(),
            WorkflowError::Generation(e) => e.is_transient(),
            WorkflowError::Hosting(HostingError::Transport(_))
            | WorkflowError::Hosting(HostingError::NotReady { .. }) => true,
            _ => false,
        }
    }
}
