// src/config.rs

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_MODEL: &str = "gpt-4.1";
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 10;
pub const DEFAULT_TEST_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAI,
    Anthropic,
}

impl Provider {
    fn key_var(self) -> &'static str {
        match self {
            Provider::OpenAI => "OPENAI_API_KEY",
            Provider::Anthropic => "ANTHROPIC_API_KEY",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub provider: Provider,
    pub model: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

/// How the test file under review is executed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Program and leading arguments; the test path and report flag are appended.
    pub pytest_command: Vec<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub llm: ProviderConfig,
    pub runner: RunnerConfig,
    pub python: String,
    pub max_concurrent_requests: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            llm: ProviderConfig {
                provider: Provider::OpenAI,
                model: DEFAULT_MODEL.to_string(),
                api_key: String::new(),
                base_url: None,
                request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
                max_tokens: DEFAULT_MAX_TOKENS,
            },
            runner: RunnerConfig::default(),
            python: "python3".into(),
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
        }
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            pytest_command: vec!["python3".into(), "-m".into(), "pytest".into()],
            timeout_secs: DEFAULT_TEST_TIMEOUT_SECS,
        }
    }
}

impl Settings {
    /// Defaults, then the config file if present, then environment overrides.
    pub fn load() -> Result<Self> {
        let mut settings = match load_file(&config_path())? {
            Some(s) => s,
            None => Settings::default(),
        };
        settings.apply_env(|k| env::var(k).ok());
        Ok(settings)
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        match var("HYPOLLM_PROVIDER").as_deref().map(str::trim) {
            Some("openai") => self.llm.provider = Provider::OpenAI,
            Some("anthropic") => self.llm.provider = Provider::Anthropic,
            _ => {}
        }

        let key = var("HYPOLLM_API_KEY").or_else(|| var(self.llm.provider.key_var()));
        if let Some(key) = key.filter(|k| !k.trim().is_empty()) {
            self.llm.api_key = key;
        }
        if let Some(model) = var("HYPOLLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(url) = var("HYPOLLM_BASE_URL") {
            self.llm.base_url = Some(url);
        }
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hypollm/config.toml")
}

fn load_file(path: &Path) -> Result<Option<Settings>> {
    let raw = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::io(path, e)),
    };

    toml::from_str(&raw)
        .map(Some)
        .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}
