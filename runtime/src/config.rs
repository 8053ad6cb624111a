//! Runtime configuration: model access, browser limits, and data locations.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Default chat model for every prompt.
pub const MODEL_DEFAULT: &str = "gpt-4o";

/// Model used for title embeddings.
pub const EMBEDDING_MODEL: &str = "text-embedding-3-small";

pub const TEMPERATURE_DEFAULT: f32 = 0.1;

pub const MAX_TOKENS_DEFAULT: u32 = 512;

/// Maximum length of one HTML part sent to the model.
pub const HTML_PART_LENGTH: usize = 40_000;

/// Per-operation browser timeout (element lookup, click, fill).
pub const BROWSER_TIMEOUT_MS: u64 = 5_000;

/// Timeout for full page navigations.
pub const NAVIGATION_TIMEOUT_MS: u64 = 30_000;

/// Model round trips allowed while executing one action.
pub const ACTION_MAX_TRIES: usize = 5;

/// Pause between browser operations.
pub const ACTION_SLEEP: Duration = Duration::from_secs(1);

/// Wait between checks while the page is still loading.
pub const ENSURE_LOADED_SLEEP: Duration = Duration::from_secs(2);

/// Loading checks before describing the page anyway.
pub const ENSURE_LOADED_MAX_TRIES: usize = 3;

pub const BROWSER_SIZE: (u32, u32) = (1024, 768);

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Stand-in for the action prompt when no hints are given.
pub const NO_ADDITIONAL_INFO: &str = "----- No additional information was provided -----";

/// Login credentials handed to the model as a hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl FromStr for Credentials {
    type Err = String;

    /// Parse `user:password`. The password may itself contain colons.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((user, pass)) if !user.is_empty() => Ok(Self {
                username: user.to_string(),
                password: pass.to_string(),
            }),
            _ => Err(format!("expected user:password, got '{s}'")),
        }
    }
}

/// Connection settings for the OpenAI-compatible API.
#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub api_base: String,
    pub api_key: String,
    pub embedding_model: String,
    pub request_timeout: Duration,
}

impl ModelSettings {
    /// Read `OPENAI_API_KEY` and optionally `OPENAI_BASE_URL`.
    pub fn from_env() -> anyhow::Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY is not set"))?;
        let api_base =
            std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
        Ok(Self::new(api_base, api_key))
    }

    pub fn new(api_base: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            api_key: api_key.into(),
            embedding_model: EMBEDDING_MODEL.to_string(),
            request_timeout: Duration::from_secs(120),
        }
    }
}

/// Everything the browser-side collaborators need to know.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub data_dir: PathBuf,
    pub html_part_length: usize,
    pub browser_timeout_ms: u64,
    pub navigation_timeout_ms: u64,
    pub window_size: (u32, u32),
    pub chromium_path: Option<PathBuf>,
    pub action_max_tries: usize,
    pub action_sleep: Duration,
    pub ensure_loaded_sleep: Duration,
    pub ensure_loaded_tries: usize,
    /// Look for and accept cookie banners after navigating.
    pub accept_cookies: bool,
    /// Append every generated title to `titles.jsonl`.
    pub store_titles: bool,
    /// Ask on the terminal whether each generated title is right.
    pub confirm_titles: bool,
    /// Free-form hints passed to the action prompt.
    pub additional_info: Option<String>,
    pub credentials: Option<Credentials>,
    /// YAML file overriding built-in prompts by name.
    pub prompts_file: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            data_dir: resolve_data_dir(None),
            html_part_length: HTML_PART_LENGTH,
            browser_timeout_ms: BROWSER_TIMEOUT_MS,
            navigation_timeout_ms: NAVIGATION_TIMEOUT_MS,
            window_size: BROWSER_SIZE,
            chromium_path: None,
            action_max_tries: ACTION_MAX_TRIES,
            action_sleep: ACTION_SLEEP,
            ensure_loaded_sleep: ENSURE_LOADED_SLEEP,
            ensure_loaded_tries: ENSURE_LOADED_MAX_TRIES,
            accept_cookies: false,
            store_titles: false,
            confirm_titles: false,
            additional_info: None,
            credentials: None,
            prompts_file: None,
        }
    }
}

impl RuntimeConfig {
    /// Path of the title dataset log.
    pub fn titles_path(&self) -> PathBuf {
        self.data_dir.join("titles.jsonl")
    }

    /// Additional info for the action prompt, with a login hint when credentials are set.
    pub fn action_hints(&self) -> String {
        let mut hints = self.additional_info.clone().unwrap_or_default();
        if let Some(c) = &self.credentials {
            if !hints.is_empty() {
                hints.push('\n');
            }
            hints.push_str(&format!(
                "If a login is required, use username '{}' and password '{}'.",
                c.username, c.password
            ));
        }
        if hints.is_empty() {
            hints.push_str(NO_ADDITIONAL_INFO);
        }
        hints
    }
}

/// Resolve the data directory: explicit flag, then `EXPLORER_DATA_DIR`, then `~/.web-explorer`.
pub fn resolve_data_dir(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }

    if let Ok(env_path) = std::env::var("EXPLORER_DATA_DIR") {
        if !env_path.is_empty() {
            return PathBuf::from(env_path);
        }
    }

    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".web-explorer")
}
