//! Configuration for sitewright.
//!
//! Settings are read from `<data_dir>/sitewright.toml` and layered as
//! file → environment → CLI.
//!
//! # Configuration File Format
//!
//! ```toml
//! [generation]
//! model = "gemini-2.5-flash"
//! api_base = "https://generativelanguage.googleapis.com"
//!
//! [hosting]
//! api_base = "https://api.github.com"
//! raw_base = "https://raw.githubusercontent.com"
//! branch = "main"
//! ready_attempts = 10
//! ready_interval_ms = 1500
//! cleanup_on_failure = false
//! repo_description = "AI-generated website"
//!
//! [http]
//! timeout_secs = 120
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name of the configuration file inside the data directory.
pub const CONFIG_FILE: &str = "sitewright.toml";

/// Generative content service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSection {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_generation_api_base")]
    pub api_base: String,
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_generation_api_base() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

impl Default for GenerationSection {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_base: default_generation_api_base(),
        }
    }
}

/// Source-hosting service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostingSection {
    #[serde(default = "default_hosting_api_base")]
    pub api_base: String,
    /// Where raw repository files are served from, for `sitewright fetch`
    #[serde(default = "default_raw_base")]
    pub raw_base: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    /// How many times to check that the repository is ready before enabling Pages
    #[serde(default = "default_ready_attempts")]
    pub ready_attempts: u32,
    #[serde(default = "default_ready_interval_ms")]
    pub ready_interval_ms: u64,
    /// Delete the created repository when a later deploy step fails
    #[serde(default)]
    pub cleanup_on_failure: bool,
    #[serde(default = "default_repo_description")]
    pub repo_description: String,
}

fn default_hosting_api_base() -> String {
    "https://api.github.com".to_string()
}

fn default_raw_base() -> String {
    "https://raw.githubusercontent.com".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_ready_attempts() -> u32 {
    10
}

fn default_ready_interval_ms() -> u64 {
    1500
}

fn default_repo_description() -> String {
    "AI-generated website".to_string()
}

impl Default for HostingSection {
    fn default() -> Self {
        Self {
            api_base: default_hosting_api_base(),
            raw_base: default_raw_base(),
            branch: default_branch(),
            ready_attempts: default_ready_attempts(),
            ready_interval_ms: default_ready_interval_ms(),
            cleanup_on_failure: false,
            repo_description: default_repo_description(),
        }
    }
}

impl HostingSection {
    pub fn ready_interval(&self) -> Duration {
        Duration::from_millis(self.ready_interval_ms)
    }
}

/// HTTP client settings shared by both services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSection {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl HttpSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// The complete sitewright.toml structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteToml {
    #[serde(default)]
    pub generation: GenerationSection,
    #[serde(default)]
    pub hosting: HostingSection,
    #[serde(default)]
    pub http: HttpSection,
}

impl SiteToml {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse sitewright.toml")
    }

    /// Load from `<data_dir>/sitewright.toml`, or defaults if it doesn't exist.
    pub fn load_or_default(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(CONFIG_FILE);
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize sitewright.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        for (field, value) in [
            ("generation.api_base", &self.generation.api_base),
            ("hosting.api_base", &self.hosting.api_base),
            ("hosting.raw_base", &self.hosting.raw_base),
        ] {
            if url::Url::parse(value).is_err() {
                warnings.push(format!("Invalid URL for {}: '{}'", field, value));
            }
        }
        if self.generation.model.trim().is_empty() {
            warnings.push("generation.model is empty".to_string());
        }
        if self.hosting.branch.trim().is_empty() {
            warnings.push("hosting.branch is empty".to_string());
        }
        if self.hosting.ready_attempts == 0 {
            warnings.push(
                "hosting.ready_attempts is 0: Pages will be enabled without checking the repository"
                    .to_string(),
            );
        }
        if self.http.timeout_secs == 0 {
            warnings.push("http.timeout_secs is 0: requests will time out immediately".to_string());
        }

        warnings
    }
}

/// Default data directory: `<platform data dir>/sitewright`.
pub fn default_data_dir() -> Result<PathBuf> {
    let base = dirs::data_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine a data directory"))?;
    Ok(base.join("sitewright"))
}

/// Runtime configuration: the parsed file merged with environment and CLI.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    pub data_dir: PathBuf,
    pub toml: SiteToml,
    pub verbose: bool,
    /// API key for the generation service, from the environment
    pub api_key: Option<String>,
}

impl SiteConfig {
    /// Build the configuration for `data_dir` (CLI → env → platform default).
    pub fn new(data_dir: Option<PathBuf>, verbose: bool) -> Result<Self> {
        let data_dir = match data_dir {
            Some(dir) => dir,
            None => match std::env::var_os("SITEWRIGHT_DATA_DIR") {
                Some(dir) => PathBuf::from(dir),
                None => default_data_dir()?,
            },
        };
        let mut toml = SiteToml::load_or_default(&data_dir)?;

        if let Ok(model) = std::env::var("SITEWRIGHT_MODEL")
            && !model.trim().is_empty()
        {
            toml.generation.model = model;
        }

        let api_key = ["GEMINI_API_KEY", "API_KEY"]
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .find(|v| !v.trim().is_empty());

        Ok(Self {
            data_dir,
            toml,
            verbose,
            api_key,
        })
    }

    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join(CONFIG_FILE)
    }

    /// Token from the `GITHUB_TOKEN` environment variable, used when no
    /// token has been saved in settings.
    pub fn env_github_token() -> Option<String> {
        std::env::var("GITHUB_TOKEN")
            .ok()
            .filter(|v| !v.trim().is_empty())
    }

    pub fn validate(&self) -> Vec<String> {
        self.toml.validate()
    }
}
