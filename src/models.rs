//! Domain types shared by the registry, clients and workflow.
//!
//! Field names serialize in camelCase so the registry file keeps the same
//! shape as records written by the browser version of the app.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The file the hosting service serves as the site root.
pub const ENTRY_POINT: &str = "index.html";

/// Name of the README added to every deployed repository.
pub const README: &str = "README.md";

/// A single named text file belonging to a generated site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedFile {
    pub name: String,
    pub content: String,
}

impl NamedFile {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// The plan drafted from the user's prompt. Editable before deploying.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppPlan {
    pub name: String,
    pub description: String,
}

/// Who wrote a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    #[serde(alias = "ai")]
    Assistant,
}

impl std::fmt::Display for ChatRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatRole::User => write!(f, "user"),
            ChatRole::Assistant => write!(f, "assistant"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: ChatRole,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(sender: ChatRole, text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            sender,
            text: text.into(),
            timestamp,
        }
    }
}

/// One generated-and-deployed website.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppRecord {
    /// Registry key and hosting repository name.
    pub id: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<AppPlan>,
    pub files: Vec<NamedFile>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_repo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chat_history: Vec<ChatMessage>,
}

impl AppRecord {
    pub fn file(&self, name: &str) -> Option<&NamedFile> {
        self.files.iter().find(|f| f.name == name)
    }

    pub fn entry_point(&self) -> Option<&NamedFile> {
        self.file(ENTRY_POINT)
    }

    /// The plan used for revisions, falling back to the prompt when the
    /// record predates stored plans.
    pub fn plan_or_prompt(&self) -> AppPlan {
        self.plan.clone().unwrap_or_else(|| AppPlan {
            name: self.id.clone(),
            description: self.prompt.clone(),
        })
    }
}

/// User settings persisted separately from app records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub github_token: String,
}

impl Settings {
    pub fn has_token(&self) -> bool {
        !self.github_token.trim().is_empty()
    }
}

/// True when `files` contains the site entry point.
pub fn has_entry_point(files: &[NamedFile]) -> bool {
    files.iter().any(|f| f.name == ENTRY_POINT)
}
