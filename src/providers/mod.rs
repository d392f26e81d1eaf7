/*!
 * Provider implementations for different translation services.
 *
 * This module contains client implementations for the supported backends:
 * - OpenAI: any OpenAI-compatible chat completion endpoint
 * - Baidu: the dedicated machine translation API
 * - Mock: scripted provider used by tests
 */

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

use crate::errors::ProviderError;
use crate::task::models::{ProviderKind, TaskConfig};

pub mod baidu;
pub mod mock;
pub mod openai;

/// One translation call
#[derive(Debug, Clone, PartialEq)]
pub struct TranslateRequest {
    /// Text to translate
    pub text: String,
    /// Target language as configured on the task
    pub target_language: String,
    /// Model to use (ignored by machine translation backends)
    pub model: String,
    /// Fully rendered instruction (system prompt)
    pub instruction: String,
    /// Lower-case source extension without the dot
    pub extension: String,
}

/// Common trait for all translation providers
///
/// Credentials are bound when the provider is constructed; every call only
/// carries the text and the per-call parameters.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// Short provider identifier used in logs
    fn name(&self) -> &str;

    /// Translate one piece of text
    ///
    /// # Returns
    /// * `Result<String, ProviderError>` - Raw translated text, or a categorized error
    async fn translate(&self, request: &TranslateRequest) -> Result<String, ProviderError>;

    /// Test the connection to the provider
    async fn test_connection(&self, model: &str) -> Result<(), ProviderError>;

    /// Whether a fallback model may be attempted after the primary one is exhausted
    fn supports_fallback(&self) -> bool {
        true
    }
}

/// Build the provider described by a task record
pub fn from_task(
    task: &TaskConfig,
    timeout_secs: u64,
    temperature: f32,
) -> Result<Arc<dyn Provider>, ProviderError> {
    match task.server {
        ProviderKind::OpenAI => {
            if task.api_key.trim().is_empty() {
                return Err(ProviderError::AuthenticationError(
                    "API key is required for the chat provider".to_string(),
                ));
            }
            Ok(Arc::new(
                openai::OpenAI::new(task.api_key.clone(), &task.api_url, timeout_secs)
                    .with_temperature(temperature),
            ))
        }
        ProviderKind::Baidu => {
            if task.app_id.trim().is_empty() || task.app_key.trim().is_empty() {
                return Err(ProviderError::AuthenticationError(
                    "app_id and app_key are required for the Baidu provider".to_string(),
                ));
            }
            Ok(Arc::new(baidu::Baidu::new(
                task.app_id.clone(),
                task.app_key.clone(),
                !task.glossary.trim().is_empty(),
                timeout_secs,
            )))
        }
    }
}
