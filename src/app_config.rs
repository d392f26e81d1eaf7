use anyhow::{Context, Result, anyhow};
use log::warn;
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::formats::{ChunkLimits, OutputMode};
use crate::job::JobSettings;
use crate::task::{ProviderKind, TaskConfig};
use crate::translation::orchestrator::{RetryPolicy, clamp_threads};
use crate::translation::progress::ProgressPolicy;

/// Application configuration module
/// This module handles loading, validating and saving the configuration file
/// and turns it into job settings and task records.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Target language as passed to the provider
    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// Translation config
    #[serde(default)]
    pub translation: TranslationConfig,

    /// How translations are written back
    #[serde(default)]
    pub output_mode: OutputMode,

    /// Task database location; defaults under the user's data directory
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Provider configuration wrapper
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    // @field: Provider type identifier
    #[serde(rename = "type")]
    pub provider_type: ProviderKind,

    // @field: Model name
    #[serde(default = "String::new")]
    pub model: String,

    // @field: Model tried after the primary one exhausts its retries
    #[serde(default)]
    pub backup_model: Option<String>,

    // @field: API key
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Service URL
    #[serde(default = "String::new")]
    pub endpoint: String,

    // @field: Machine translation app id
    #[serde(default = "String::new")]
    pub app_id: String,

    // @field: Machine translation app secret
    #[serde(default = "String::new")]
    pub app_key: String,

    // @field: Timeout seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ProviderConfig {
    // @param provider_type: Provider enum
    // @returns: Provider config with defaults
    pub fn new(provider_type: ProviderKind) -> Self {
        match provider_type {
            ProviderKind::OpenAI => Self {
                provider_type,
                model: default_openai_model(),
                backup_model: None,
                api_key: String::new(),
                endpoint: default_openai_endpoint(),
                app_id: String::new(),
                app_key: String::new(),
                timeout_secs: default_timeout_secs(),
            },
            ProviderKind::Baidu => Self {
                provider_type,
                model: String::new(),
                backup_model: None,
                api_key: String::new(),
                endpoint: String::new(),
                app_id: String::new(),
                app_key: String::new(),
                timeout_secs: default_timeout_secs(),
            },
        }
    }
}

/// Translation service configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationConfig {
    /// Translation provider to use
    #[serde(default)]
    pub provider: ProviderKind,

    /// Available translation providers
    #[serde(default)]
    pub available_providers: Vec<ProviderConfig>,

    /// Common translation settings
    #[serde(default)]
    pub common: TranslationCommonConfig,
}

/// Settings shared by every provider
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationCommonConfig {
    /// Base prompt; `{target_lang}` is replaced by the target language
    #[serde(default = "default_prompt")]
    pub prompt: String,

    /// Worker pool size, clamped to 1..=10
    #[serde(default = "default_threads")]
    pub threads: i64,

    /// Attempts per model
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay between attempts in milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Rate-limit backoff is `retry_delay * attempt * multiplier`
    #[serde(default = "default_rate_limit_multiplier")]
    pub rate_limit_multiplier: u32,

    /// Minimum progress increase between two persisted values
    #[serde(default = "default_progress_step")]
    pub progress_step: f64,

    /// Progress above which `progress_tail_step` applies
    #[serde(default = "default_progress_tail_start")]
    pub progress_tail_start: f64,

    #[serde(default = "default_progress_tail_step")]
    pub progress_tail_step: f64,

    /// Largest chunk sent in one request
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,

    /// Largest chunk for a delimited text cell
    #[serde(default = "default_csv_max_chunk_size")]
    pub csv_max_chunk_size: usize,

    /// Temperature parameter for chat models (0.0 to 1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for TranslationCommonConfig {
    fn default() -> Self {
        Self {
            prompt: default_prompt(),
            threads: default_threads(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            rate_limit_multiplier: default_rate_limit_multiplier(),
            progress_step: default_progress_step(),
            progress_tail_start: default_progress_tail_start(),
            progress_tail_step: default_progress_tail_step(),
            max_chunk_size: default_max_chunk_size(),
            csv_max_chunk_size: default_csv_max_chunk_size(),
            temperature: default_temperature(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_target_language() -> String {
    "中文".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_prompt() -> String {
    "请将以下文本翻译成{target_lang}，保持原文的格式和风格：".to_string()
}

fn default_threads() -> i64 {
    5
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    5000
}

fn default_rate_limit_multiplier() -> u32 {
    2
}

fn default_progress_step() -> f64 {
    15.0
}

fn default_progress_tail_start() -> f64 {
    90.0
}

fn default_progress_tail_step() -> f64 {
    10.0
}

fn default_max_chunk_size() -> usize {
    crate::translation::chunker::MAX_CHUNK_SIZE
}

fn default_csv_max_chunk_size() -> usize {
    crate::formats::CSV_MAX_CHUNK_SIZE
}

fn default_temperature() -> f32 {
    0.7
}

fn default_openai_endpoint() -> String {
    crate::providers::openai::DEFAULT_OPENAI_ENDPOINT.to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

impl Config {
    /// Read the configuration at `path`, writing the defaults there first if it does not exist
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to open config file: {:?}", path))?;
            return serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path));
        }

        warn!("Config file not found at {:?}, creating default config.", path);
        let config = Config::default();
        config.save(path)?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)
            .context("Failed to serialize config to JSON")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write config file: {:?}", path))
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        let common = &self.translation.common;
        if common.prompt.trim().is_empty() {
            return Err(anyhow!("Translation prompt must not be empty"));
        }
        if common.max_chunk_size == 0 || common.csv_max_chunk_size == 0 {
            return Err(anyhow!("Chunk sizes must be greater than zero"));
        }

        let provider = self.translation.get_active_provider_config();
        match self.translation.provider {
            ProviderKind::OpenAI => {
                if provider.is_none_or(|p| p.api_key.trim().is_empty()) {
                    return Err(anyhow!("Translation API key is required for OpenAI provider"));
                }
            }
            ProviderKind::Baidu => {
                if provider.is_none_or(|p| p.app_id.trim().is_empty() || p.app_key.trim().is_empty()) {
                    return Err(anyhow!("app_id and app_key are required for Baidu provider"));
                }
            }
        }

        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let common = &self.translation.common;
        RetryPolicy {
            max_retries: common.max_retries.max(1),
            retry_delay: Duration::from_millis(common.retry_delay_ms),
            rate_limit_multiplier: common.rate_limit_multiplier,
        }
    }

    pub fn progress_policy(&self) -> ProgressPolicy {
        let common = &self.translation.common;
        ProgressPolicy {
            step: common.progress_step,
            tail_start: common.progress_tail_start,
            tail_step: common.progress_tail_step,
        }
    }

    pub fn chunk_limits(&self) -> ChunkLimits {
        ChunkLimits {
            max_chunk_size: self.translation.common.max_chunk_size,
            csv_max_chunk_size: self.translation.common.csv_max_chunk_size,
        }
    }

    pub fn job_settings(&self) -> JobSettings {
        JobSettings {
            limits: self.chunk_limits(),
            retry: self.retry_policy(),
            progress: self.progress_policy(),
            timeout_secs: self
                .translation
                .get_active_provider_config()
                .map(|p| p.timeout_secs)
                .unwrap_or_else(default_timeout_secs),
            temperature: self.translation.common.temperature,
        }
    }

    /// Task record translating `origin` into `target` with the active provider
    pub fn task_for(&self, origin: &Path, target: &Path) -> TaskConfig {
        let provider = self.translation.get_active_provider_config();
        let field = |f: fn(&ProviderConfig) -> &String| provider.map(|p| f(p).clone()).unwrap_or_default();

        TaskConfig {
            id: 0,
            origin_filepath: origin.to_path_buf(),
            target_filepath: target.to_path_buf(),
            lang: self.target_language.clone(),
            output_type: self.output_mode.task_type().to_string(),
            server: self.translation.provider,
            model: self.translation.get_model(),
            backup_model: provider.and_then(|p| p.backup_model.clone()),
            api_url: self.translation.get_endpoint(),
            api_key: field(|p| &p.api_key),
            app_id: field(|p| &p.app_id),
            app_key: field(|p| &p.app_key),
            prompt: self.translation.common.prompt.clone(),
            threads: Some(clamp_threads(self.translation.common.threads) as i64),
            glossary: String::new(),
        }
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            target_language: default_target_language(),
            translation: TranslationConfig::default(),
            output_mode: OutputMode::default(),
            database_path: None,
            log_level: LogLevel::default(),
        }
    }
}

impl TranslationConfig {
    /// Get the active provider configuration from the available_providers array
    pub fn get_active_provider_config(&self) -> Option<&ProviderConfig> {
        self.get_provider_config(self.provider)
    }

    pub fn get_provider_config(&self, provider_type: ProviderKind) -> Option<&ProviderConfig> {
        self.available_providers
            .iter()
            .find(|p| p.provider_type == provider_type)
    }

    /// Active provider configuration, created with defaults when missing
    pub fn active_provider_config_mut(&mut self) -> &mut ProviderConfig {
        let provider = self.provider;
        let index = match self
            .available_providers
            .iter()
            .position(|p| p.provider_type == provider)
        {
            Some(index) => index,
            None => {
                self.available_providers.push(ProviderConfig::new(provider));
                self.available_providers.len() - 1
            }
        };
        &mut self.available_providers[index]
    }

    /// Get the model for the active provider
    pub fn get_model(&self) -> String {
        match self.get_active_provider_config() {
            Some(p) if !p.model.is_empty() => p.model.clone(),
            _ => match self.provider {
                ProviderKind::OpenAI => default_openai_model(),
                ProviderKind::Baidu => String::new(),
            },
        }
    }

    /// Get the endpoint for the active provider
    pub fn get_endpoint(&self) -> String {
        match self.get_active_provider_config() {
            Some(p) if !p.endpoint.is_empty() => p.endpoint.clone(),
            _ => match self.provider {
                ProviderKind::OpenAI => default_openai_endpoint(),
                ProviderKind::Baidu => String::new(),
            },
        }
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            available_providers: vec![
                ProviderConfig::new(ProviderKind::OpenAI),
                ProviderConfig::new(ProviderKind::Baidu),
            ],
            common: TranslationCommonConfig::default(),
        }
    }
}
