use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::rewrite::rewrite_relative_urls;
use super::{CreatedRepository, HostingProvider, PublicSite, encode_content};
use crate::config::SiteConfig;
use crate::errors::HostingError;
use crate::models::NamedFile;

const USER_AGENT: &str = "sitewright";
const GITHUB_ACCEPT: &str = "application/vnd.github+json";

/// A GitHub repository (subset of fields we care about).
#[derive(Debug, Deserialize)]
struct GitHubRepo {
    name: String,
    html_url: String,
    owner: GitHubOwner,
}

#[derive(Debug, Deserialize)]
struct GitHubOwner {
    login: String,
}

#[derive(Debug, Deserialize)]
struct PagesSite {
    html_url: String,
}

#[derive(Debug, Deserialize)]
struct GitHubErrorBody {
    message: String,
}

/// Known GitHub token prefixes.
/// See: https://github.blog/2021-04-05-behind-githubs-new-authentication-token-formats/
const GITHUB_TOKEN_PREFIXES: &[&str] = &[
    "ghp_",        // Personal access tokens (classic)
    "github_pat_", // Fine-grained personal access tokens
    "gho_",        // OAuth access tokens
    "ghu_",        // GitHub App user-to-server tokens
    "ghs_",        // GitHub App server-to-server tokens
    "ghr_",        // GitHub App refresh tokens
];

/// Check that a string looks like a GitHub token based on its prefix.
///
/// Format check only: it does not verify the token is active or has the
/// `public_repo` scope.
pub fn is_valid_github_token(token: &str) -> bool {
    if token.is_empty() {
        return false;
    }
    GITHUB_TOKEN_PREFIXES
        .iter()
        .any(|prefix| token.starts_with(prefix))
}

/// Parse `(owner, repo)` from a GitHub repository URL.
///
/// Handles `https://github.com/owner/repo`, a trailing `.git` and a trailing
/// slash.
pub fn parse_owner_repo_from_url(url: &str) -> Option<(String, String)> {
    let rest = url.strip_prefix("https://")?;
    let repo_path = rest.strip_prefix("github.com/")?;
    let repo_path = repo_path.trim_end_matches('/');
    let repo_path = repo_path.strip_suffix(".git").unwrap_or(repo_path);

    let parts: Vec<&str> = repo_path.split('/').collect();
    if parts.len() == 2 && !parts[0].is_empty() && !parts[1].is_empty() {
        Some((parts[0].to_string(), parts[1].to_string()))
    } else {
        None
    }
}

/// Pull the `message` out of a GitHub error body, falling back to the status
/// reason phrase.
async fn error_message(resp: Response) -> String {
    let status = resp.status();
    let fallback = || {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    };
    match resp.text().await {
        Ok(body) => serde_json::from_str::<GitHubErrorBody>(&body)
            .map(|b| b.message)
            .unwrap_or_else(|_| fallback()),
        Err(_) => fallback(),
    }
}

/// Client for the GitHub REST API and raw file host.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_base: String,
    raw_base: String,
    branch: String,
    repo_description: String,
}

impl GitHubClient {
    pub fn new(
        api_base: impl Into<String>,
        raw_base: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, HostingError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(HostingError::Transport)?;
        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            raw_base: raw_base.into().trim_end_matches('/').to_string(),
            branch: "main".to_string(),
            repo_description: "AI-generated website".to_string(),
        })
    }

    pub fn from_config(config: &SiteConfig) -> Result<Self, HostingError> {
        let hosting = &config.toml.hosting;
        let mut client = Self::new(
            hosting.api_base.clone(),
            hosting.raw_base.clone(),
            config.toml.http.timeout(),
        )?;
        client.branch = hosting.branch.clone();
        client.repo_description = hosting.repo_description.clone();
        Ok(client)
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    fn request(&self, method: Method, path: &str, token: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.api_base, path))
            .header("Authorization", format!("Bearer {}", token))
            .header("Accept", GITHUB_ACCEPT)
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response, HostingError> {
        req.send().await.map_err(HostingError::Transport)
    }

    /// Base URL raw files of `owner/repo` are served from.
    pub fn raw_root(&self, owner: &str, repo: &str) -> String {
        format!("{}/{}/{}/{}/", self.raw_base, owner, repo, self.branch)
    }

    /// Fetch a file of a hosted site and make its relative `href`/`src`
    /// references absolute, so the page renders outside the repository.
    pub async fn fetch_site(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
    ) -> Result<String, HostingError> {
        let root = self.raw_root(owner, repo);
        let url = format!("{}{}", root, path.trim_start_matches('/'));
        tracing::debug!(%url, "fetching raw site file");

        let resp = self.send(self.http.get(&url)).await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            return Err(HostingError::Api {
                status,
                message: error_message(resp).await,
            });
        }
        let body = resp.text().await.map_err(HostingError::Transport)?;
        Ok(rewrite_relative_urls(&body, &root))
    }
}

#[async_trait]
impl HostingProvider for GitHubClient {
    async fn create_repository(
        &self,
        name: &str,
        token: &str,
    ) -> Result<CreatedRepository, HostingError> {
        let req = self
            .request(Method::POST, "/user/repos", token)
            .json(&json!({
                "name": name,
                "description": self.repo_description,
                "private": false,
                "auto_init": false,
            }));
        let resp = self.send(req).await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = error_message(resp).await;
            tracing::warn!(status, %message, repo = name, "repository creation failed");
            return Err(HostingError::Api {
                status,
                message: format!("Repository creation failed: {message}"),
            });
        }

        let repo: GitHubRepo = resp.json().await.map_err(HostingError::Transport)?;
        tracing::info!(owner = %repo.owner.login, repo = %repo.name, "created repository");
        Ok(CreatedRepository {
            owner: repo.owner.login,
            name: repo.name,
            html_url: repo.html_url,
        })
    }

    async fn upload_file(
        &self,
        owner: &str,
        repo: &str,
        file: &NamedFile,
        token: &str,
    ) -> Result<(), HostingError> {
        let path = format!("/repos/{}/{}/contents/{}", owner, repo, file.name);
        let req = self.request(Method::PUT, &path, token).json(&json!({
            "message": format!("feat: add {}", file.name),
            "content": encode_content(&file.content),
            "branch": self.branch,
        }));
        let resp = self.send(req).await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            return Err(HostingError::Upload {
                file: file.name.clone(),
                status,
                message: error_message(resp).await,
            });
        }
        tracing::debug!(file = %file.name, "uploaded file");
        Ok(())
    }

    async fn repository_ready(
        &self,
        owner: &str,
        repo: &str,
        token: &str,
    ) -> Result<bool, HostingError> {
        let path = format!("/repos/{}/{}/branches/{}", owner, repo, self.branch);
        let resp = self.send(self.request(Method::GET, &path, token)).await?;
        match resp.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            s => Err(HostingError::Api {
                status: s.as_u16(),
                message: error_message(resp).await,
            }),
        }
    }

    async fn enable_public_hosting(
        &self,
        owner: &str,
        repo: &str,
        token: &str,
    ) -> Result<PublicSite, HostingError> {
        let path = format!("/repos/{}/{}/pages", owner, repo);
        let req = self.request(Method::POST, &path, token).json(&json!({
            "source": { "branch": self.branch, "path": "/" }
        }));
        let resp = self.send(req).await?;

        // Only 201 Created counts; 409 "already enabled" is a failure too.
        if resp.status() != StatusCode::CREATED {
            let status = resp.status().as_u16();
            return Err(HostingError::UnexpectedStatus {
                expected: 201,
                status,
                message: format!("Failed to enable GitHub Pages: {}", error_message(resp).await),
            });
        }

        let site: PagesSite = resp.json().await.map_err(HostingError::Transport)?;
        tracing::info!(url = %site.html_url, "enabled GitHub Pages");
        Ok(PublicSite {
            public_url: site.html_url,
        })
    }

    async fn delete_repository(
        &self,
        owner: &str,
        repo: &str,
        token: &str,
    ) -> Result<(), HostingError> {
        let path = format!("/repos/{}/{}", owner, repo);
        let resp = self.send(self.request(Method::DELETE, &path, token)).await?;
        if resp.status() != StatusCode::NO_CONTENT {
            let status = resp.status().as_u16();
            return Err(HostingError::UnexpectedStatus {
                expected: 204,
                status,
                message: error_message(resp).await,
            });
        }
        tracing::info!(owner, repo, "deleted repository");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── is_valid_github_token ────────────────────────────────────────

    #[test]
    fn test_valid_personal_access_token_classic() {
        assert!(is_valid_github_token("ghp_abc123def456"));
    }

    #[test]
    fn test_valid_fine_grained_pat() {
        assert!(is_valid_github_token("github_pat_abc123def456"));
    }

    #[test]
    fn test_valid_oauth_token() {
        assert!(is_valid_github_token("gho_abc123"));
    }

    #[test]
    fn test_empty_token_is_invalid() {
        assert!(!is_valid_github_token(""));
    }

    #[test]
    fn test_random_string_is_invalid() {
        assert!(!is_valid_github_token("not-a-token"));
    }

    #[test]
    fn test_uppercase_prefix_is_invalid() {
        assert!(!is_valid_github_token("GHP_abc123"));
    }

    #[test]
    fn test_token_with_leading_space_is_invalid() {
        assert!(!is_valid_github_token(" ghp_abc123"));
    }

    #[test]
    fn test_all_known_prefixes_end_with_underscore() {
        for prefix in GITHUB_TOKEN_PREFIXES {
            assert!(prefix.ends_with('_'), "prefix {prefix} should end with '_'");
        }
        assert_eq!(GITHUB_TOKEN_PREFIXES.len(), 6);
    }

    // ── parse_owner_repo_from_url ────────────────────────────────────

    #[test]
    fn test_parse_simple_https_url() {
        assert_eq!(
            parse_owner_repo_from_url("https://github.com/u/baker-bio-1234"),
            Some(("u".to_string(), "baker-bio-1234".to_string()))
        );
    }

    #[test]
    fn test_parse_url_with_git_suffix_and_slash() {
        assert_eq!(
            parse_owner_repo_from_url("https://github.com/owner/repo.git"),
            Some(("owner".to_string(), "repo".to_string()))
        );
        assert_eq!(
            parse_owner_repo_from_url("https://github.com/owner/repo/"),
            Some(("owner".to_string(), "repo".to_string()))
        );
    }

    #[test]
    fn test_parse_url_rejects_other_shapes() {
        assert_eq!(parse_owner_repo_from_url("https://github.com/owner"), None);
        assert_eq!(
            parse_owner_repo_from_url("https://github.com/owner/repo/extra"),
            None
        );
        assert_eq!(parse_owner_repo_from_url("https://gitlab.com/owner/repo"), None);
        assert_eq!(parse_owner_repo_from_url("git@github.com:owner/repo.git"), None);
        assert_eq!(parse_owner_repo_from_url(""), None);
    }

    // ── response shapes ──────────────────────────────────────────────

    #[test]
    fn test_github_repo_deserialize_ignores_extra_fields() {
        let json = r#"{
            "id": 1,
            "name": "baker-bio-1234",
            "full_name": "u/baker-bio-1234",
            "html_url": "https://github.com/u/baker-bio-1234",
            "owner": {"login": "u", "id": 9}
        }"#;
        let repo: GitHubRepo = serde_json::from_str(json).unwrap();
        assert_eq!(repo.owner.login, "u");
        assert_eq!(repo.name, "baker-bio-1234");
    }

    #[test]
    fn test_raw_root() {
        let client = GitHubClient::new(
            "https://api.github.com/",
            "https://raw.githubusercontent.com/",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            client.raw_root("u", "site"),
            "https://raw.githubusercontent.com/u/site/main/"
        );
        assert_eq!(client.branch(), "main");
    }
}
