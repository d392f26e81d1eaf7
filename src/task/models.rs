/*!
 * Task records and their enumerations.
 *
 * These structures map directly onto the `translate` table.
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::formats::OutputMode;
use crate::translation::orchestrator::{DEFAULT_THREADS, clamp_threads};

/// Task status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created, never started
    #[default]
    None,
    /// Job is running
    Process,
    /// Output written
    Done,
    /// Job ended with an error
    Failed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::None => write!(f, "none"),
            TaskStatus::Process => write!(f, "process"),
            TaskStatus::Done => write!(f, "done"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" | "" => Ok(TaskStatus::None),
            "process" => Ok(TaskStatus::Process),
            "done" => Ok(TaskStatus::Done),
            "failed" => Ok(TaskStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid task status: {}", s)),
        }
    }
}

/// Kind of translation backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI-compatible chat completion endpoint
    #[default]
    OpenAI,
    /// Baidu machine translation
    Baidu,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::OpenAI => write!(f, "openai"),
            ProviderKind::Baidu => write!(f, "baidu"),
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAI),
            "baidu" => Ok(ProviderKind::Baidu),
            _ => Err(anyhow::anyhow!("Invalid provider kind: {}", s)),
        }
    }
}

/// Everything a job needs to know about its task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TaskConfig {
    pub id: i64,
    pub origin_filepath: PathBuf,
    pub target_filepath: PathBuf,
    /// Target language
    pub lang: String,
    /// Output type such as `trans_only_inherit` or `trans_all_both_new`
    pub output_type: String,
    pub server: ProviderKind,
    pub model: String,
    pub backup_model: Option<String>,
    pub api_url: String,
    pub api_key: String,
    pub app_id: String,
    pub app_key: String,
    /// Base prompt, may contain `{target_lang}`
    pub prompt: String,
    /// Requested worker count as stored
    pub threads: Option<i64>,
    /// Glossary content (`src,tgt` pairs)
    pub glossary: String,
}

impl TaskConfig {
    /// Worker count clamped into the supported range
    pub fn thread_count(&self) -> usize {
        self.threads.map(clamp_threads).unwrap_or(DEFAULT_THREADS)
    }

    pub fn output_mode(&self) -> OutputMode {
        OutputMode::from_task_type(&self.output_type)
    }

    /// Lower-case source extension without the dot
    pub fn extension(&self) -> String {
        extension_of(&self.origin_filepath)
    }

    /// Fallback model, if one is set and differs from the primary
    pub fn fallback_model(&self) -> Option<String> {
        self.backup_model
            .as_ref()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty() && *m != self.model)
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_lowercase()
}

/// Full task row: configuration plus the fields a job writes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TaskRecord {
    #[serde(flatten)]
    pub config: TaskConfig,
    pub status: TaskStatus,
    /// 0-100
    pub process: f64,
    pub start_at: Option<String>,
    pub end_at: Option<String>,
    pub failed_reason: Option<String>,
    pub failed_count: i64,
    pub word_count: i64,
    pub target_filesize: i64,
    pub created_at: String,
}

impl TaskRecord {
    pub fn new(config: TaskConfig, created_at: impl Into<String>) -> Self {
        Self {
            config,
            created_at: created_at.into(),
            ..Default::default()
        }
    }
}
