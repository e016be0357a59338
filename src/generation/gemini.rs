use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;

use super::prompts::{
    files_prompt, files_schema, plan_prompt, plan_schema, revision_prompt, revision_schema,
};
use super::{Revision, SiteGenerator, parse_files, parse_plan, parse_revision};
use crate::config::SiteConfig;
use crate::errors::GenerationError;
use crate::models::{AppPlan, ChatMessage, NamedFile};

/// Client for the Gemini `generateContent` REST endpoint.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_base: String,
    model: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(default, rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl GeminiClient {
    pub fn new(
        api_base: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(GenerationError::Transport)?;
        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
        })
    }

    /// Build a client from runtime configuration. Fails when no API key is set.
    pub fn from_config(config: &SiteConfig) -> Result<Self, GenerationError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or(GenerationError::MissingApiKey)?;
        Self::new(
            config.toml.generation.api_base.clone(),
            config.toml.generation.model.clone(),
            api_key,
            config.toml.http.timeout(),
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base, self.model
        )
    }

    /// Send one prompt with a JSON response schema and return the reply text.
    async fn generate_json(&self, prompt: &str, schema: Value) -> Result<String, GenerationError> {
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": schema,
            }
        });

        tracing::debug!(model = %self.model, prompt_len = prompt.len(), "sending generation request");
        let resp = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(GenerationError::Transport)?;

        let status = resp.status();
        let raw = resp.text().await.map_err(GenerationError::Transport)?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&raw)
                .map(|b| b.error.message)
                .unwrap_or_else(|_| {
                    status
                        .canonical_reason()
                        .unwrap_or("request failed")
                        .to_string()
                });
            tracing::warn!(status = status.as_u16(), %message, "generation request failed");
            return Err(GenerationError::Api {
                status: status.as_u16(),
                message,
            });
        }

        extract_text(&raw)
    }
}

/// Concatenate the text parts of the first candidate.
fn extract_text(raw: &str) -> Result<String, GenerationError> {
    let parsed: GenerateContentResponse = serde_json::from_str(raw)
        .map_err(|e| GenerationError::MalformedResponse(format!("invalid response body: {e}")))?;

    let candidate = parsed
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| GenerationError::MalformedResponse("no candidates returned".to_string()))?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".to_string());
        return Err(GenerationError::MalformedResponse(format!(
            "empty reply (finish reason: {reason})"
        )));
    }
    Ok(text)
}

#[async_trait]
impl SiteGenerator for GeminiClient {
    async fn generate_plan(&self, prompt: &str) -> Result<AppPlan, GenerationError> {
        let text = self.generate_json(&plan_prompt(prompt), plan_schema()).await?;
        parse_plan(&text)
    }

    async fn generate_files(&self, prompt: &str) -> Result<Vec<NamedFile>, GenerationError> {
        let text = self
            .generate_json(&files_prompt(prompt), files_schema())
            .await?;
        let files = parse_files(&text)?;
        tracing::info!(count = files.len(), "generated site files");
        Ok(files)
    }

    async fn revise_files(
        &self,
        plan: &AppPlan,
        current_content: &str,
        history: &[ChatMessage],
    ) -> Result<Revision, GenerationError> {
        let prompt = revision_prompt(plan, current_content, history);
        let text = self.generate_json(&prompt, revision_schema()).await?;
        parse_revision(&text)
    }
}
