//! Generative content client.
//!
//! The [`SiteGenerator`] trait is the seam the creation workflow depends on.
//! [`GeminiClient`] is the real implementation; tests use in-memory fakes.
//!
//! Replies are parsed into fixed shapes:
//!
//! | Operation        | Response shape                                  |
//! |------------------|-------------------------------------------------|
//! | `generate_plan`  | `{"name": .., "description": ..}`               |
//! | `generate_files` | `{"files": [{"name": .., "content": ..}]}`      |
//! | `revise_files`   | `{"kind": "document" \| "message", "content": ..}` |

mod gemini;
pub mod prompts;

pub use gemini::GeminiClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::errors::GenerationError;
use crate::models::{AppPlan, ChatMessage, ENTRY_POINT, NamedFile};
use crate::util::extract_json_object;

/// A reply to a revision request: either a full replacement document or a
/// conversational message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Revision {
    Document { content: String },
    Message { text: String },
}

/// Abstraction over the generative content service.
/// Real implementation: `GeminiClient`.
#[async_trait]
pub trait SiteGenerator: Send + Sync {
    /// Draft a `{name, description}` plan from a free-form prompt.
    async fn generate_plan(&self, prompt: &str) -> Result<AppPlan, GenerationError>;

    /// Generate the site files. The result always contains [`ENTRY_POINT`].
    async fn generate_files(&self, prompt: &str) -> Result<Vec<NamedFile>, GenerationError>;

    /// Ask for an improvement to an existing site.
    async fn revise_files(
        &self,
        plan: &AppPlan,
        current_content: &str,
        history: &[ChatMessage],
    ) -> Result<Revision, GenerationError>;
}

/// Deserialize a model reply, tolerating a code fence or chatter around the
/// JSON object.
fn parse_json_reply<T: serde::de::DeserializeOwned>(text: &str) -> Result<T, GenerationError> {
    match serde_json::from_str(text.trim()) {
        Ok(parsed) => Ok(parsed),
        Err(direct_err) => {
            let object = extract_json_object(text).ok_or_else(|| {
                GenerationError::MalformedResponse(format!("reply is not JSON: {direct_err}"))
            })?;
            serde_json::from_str(&object)
                .map_err(|e| GenerationError::MalformedResponse(e.to_string()))
        }
    }
}

/// Parse a plan reply. Both fields must be present and non-empty.
pub fn parse_plan(text: &str) -> Result<AppPlan, GenerationError> {
    let plan: AppPlan = parse_json_reply(text)?;
    if plan.name.trim().is_empty() || plan.description.trim().is_empty() {
        return Err(GenerationError::MalformedResponse(
            "plan is missing a name or description".to_string(),
        ));
    }
    Ok(AppPlan {
        name: plan.name.trim().to_string(),
        description: plan.description.trim().to_string(),
    })
}

#[derive(Deserialize)]
struct FilesReply {
    files: Vec<NamedFile>,
}

/// Parse a files reply and check it can be hosted as a website.
pub fn parse_files(text: &str) -> Result<Vec<NamedFile>, GenerationError> {
    let reply: FilesReply = parse_json_reply(text)?;
    let files: Vec<NamedFile> = reply
        .files
        .into_iter()
        .map(|f| NamedFile {
            name: f.name.trim().trim_start_matches('/').to_string(),
            content: f.content,
        })
        .collect();

    if let Some(bad) = files.iter().find(|f| f.name.is_empty()) {
        return Err(GenerationError::MalformedResponse(format!(
            "file with empty name ({} bytes of content)",
            bad.content.len()
        )));
    }

    {
        let mut seen = HashSet::new();
        for file in &files {
            if !seen.insert(file.name.as_str()) {
                return Err(GenerationError::MalformedResponse(format!(
                    "duplicate file name '{}'",
                    file.name
                )));
            }
        }
    }

    if !files.iter().any(|f| f.name == ENTRY_POINT) {
        return Err(GenerationError::MissingEntryPoint(ENTRY_POINT.to_string()));
    }
    Ok(files)
}

#[derive(Deserialize)]
struct RevisionReply {
    kind: String,
    content: String,
}

/// Parse a revision reply into a tagged [`Revision`].
pub fn parse_revision(text: &str) -> Result<Revision, GenerationError> {
    let reply: RevisionReply = parse_json_reply(text)?;
    match reply.kind.trim().to_lowercase().as_str() {
        "document" => {
            if reply.content.trim().is_empty() {
                return Err(GenerationError::MalformedResponse(
                    "document revision has no content".to_string(),
                ));
            }
            Ok(Revision::Document {
                content: reply.content,
            })
        }
        "message" => Ok(Revision::Message {
            text: reply.content,
        }),
        other => Err(GenerationError::MalformedResponse(format!(
            "unknown revision kind '{other}'"
        ))),
    }
}
