//! Source-hosting client.
//!
//! [`HostingProvider`] is the seam the creation workflow depends on;
//! [`GitHubClient`] talks to the GitHub REST API.

mod github;
pub mod rewrite;

pub use github::{GitHubClient, is_valid_github_token, parse_owner_repo_from_url};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::errors::HostingError;
use crate::models::NamedFile;

/// A repository created for a site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedRepository {
    pub owner: String,
    pub name: String,
    pub html_url: String,
}

/// Result of enabling static hosting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicSite {
    pub public_url: String,
}

/// Abstraction over the source-hosting service. The token is passed per call.
#[async_trait]
pub trait HostingProvider: Send + Sync {
    async fn create_repository(
        &self,
        name: &str,
        token: &str,
    ) -> Result<CreatedRepository, HostingError>;

    /// Write a single file to the default branch.
    async fn upload_file(
        &self,
        owner: &str,
        repo: &str,
        file: &NamedFile,
        token: &str,
    ) -> Result<(), HostingError>;

    /// Write each file in order, stopping at the first failure. Files written
    /// before the failure stay in the repository.
    async fn upload_files(
        &self,
        owner: &str,
        repo: &str,
        files: &[NamedFile],
        token: &str,
    ) -> Result<(), HostingError> {
        for file in files {
            self.upload_file(owner, repo, file, token).await?;
        }
        Ok(())
    }

    /// Whether the repository's default branch exists yet.
    async fn repository_ready(
        &self,
        owner: &str,
        repo: &str,
        token: &str,
    ) -> Result<bool, HostingError>;

    async fn enable_public_hosting(
        &self,
        owner: &str,
        repo: &str,
        token: &str,
    ) -> Result<PublicSite, HostingError>;

    async fn delete_repository(
        &self,
        owner: &str,
        repo: &str,
        token: &str,
    ) -> Result<(), HostingError>;
}

/// Base64-encode the UTF-8 bytes of `content`, as the contents API expects.
pub fn encode_content(content: &str) -> String {
    STANDARD.encode(content.as_bytes())
}

/// Decode base64 content written by [`encode_content`] or returned by the
/// contents API, which wraps lines with `\n`.
pub fn decode_content(encoded: &str) -> Result<String, HostingError> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact)
        .map_err(|e| HostingError::InvalidContent(format!("invalid base64: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|e| HostingError::InvalidContent(format!("content is not UTF-8: {e}")))
}
