/*!
 * Mock provider implementations for testing.
 *
 * Behaviour is scripted per model so retry and fallback paths can be driven
 * deterministically:
 * - `MockProvider::working()` - Always succeeds with a prefixed echo
 * - `MockProvider::identity()` - Returns the input unchanged
 * - `MockProvider::failing(kind)` - Always fails with the given error category
 * - `.with_model(name, behavior)` - Overrides the behaviour for one model
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::errors::ProviderError;

use super::{Provider, TranslateRequest};

/// Prefix added by the working behaviour
pub const MOCK_PREFIX: &str = "[TRANSLATED] ";

/// Error category a scripted failure raises
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    Authentication,
    RateLimit,
    Connection,
    Generic,
}

impl MockFailure {
    fn to_error(self, attempt: usize) -> ProviderError {
        let message = format!("Simulated failure (request #{})", attempt);
        match self {
            MockFailure::Authentication => ProviderError::AuthenticationError(message),
            MockFailure::RateLimit => ProviderError::RateLimitExceeded(message),
            MockFailure::Connection => ProviderError::ConnectionError(message),
            MockFailure::Generic => ProviderError::ApiError {
                status_code: 500,
                message,
            },
        }
    }
}

/// Behavior mode for the mock provider
#[derive(Debug, Clone, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds with `MOCK_PREFIX` + text
    Working,
    /// Returns the text unchanged
    Identity,
    /// Returns a fixed answer
    Fixed(String),
    /// Always fails
    Failing(MockFailure),
    /// Fails the first `times` calls for this model, then echoes like `Working`
    FailThenSucceed { times: usize, failure: MockFailure },
    /// Fails every Nth call
    Intermittent { fail_every: usize },
    /// Answers with a refusal phrase
    Refusing,
    /// Returns an empty answer
    Empty,
    /// Sleeps before echoing like `Working`
    Slow { delay_ms: u64 },
    /// Sleeps a text dependent time so completions arrive out of order
    Jittered { max_delay_ms: u64 },
    /// Panics inside the call
    Panicking,
}

/// Mock provider for testing translation behavior
#[derive(Debug)]
pub struct MockProvider {
    /// Behaviour for models without an override
    default_behavior: MockBehavior,
    /// Per-model overrides
    model_behaviors: HashMap<String, MockBehavior>,
    /// Total request counter
    request_count: Arc<AtomicUsize>,
    /// Per-model request counters
    model_counts: Arc<Mutex<HashMap<String, usize>>>,
    /// Every request received, in arrival order
    calls: Arc<Mutex<Vec<TranslateRequest>>>,
    /// Whether the fallback model may be used
    fallback: bool,
}

impl MockProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            default_behavior: behavior,
            model_behaviors: HashMap::new(),
            request_count: Arc::new(AtomicUsize::new(0)),
            model_counts: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            fallback: true,
        }
    }

    /// Create a working mock provider that always succeeds
    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    /// Create a mock that returns its input
    pub fn identity() -> Self {
        Self::new(MockBehavior::Identity)
    }

    /// Create a failing mock provider that always errors
    pub fn failing(failure: MockFailure) -> Self {
        Self::new(MockBehavior::Failing(failure))
    }

    /// Override the behaviour for one model
    pub fn with_model(mut self, model: impl Into<String>, behavior: MockBehavior) -> Self {
        self.model_behaviors.insert(model.into(), behavior);
        self
    }

    /// Behave like a machine translation backend without model fallback
    pub fn without_fallback(mut self) -> Self {
        self.fallback = false;
        self
    }

    /// Total number of requests received
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Number of requests received for one model
    pub fn model_request_count(&self, model: &str) -> usize {
        self.model_counts.lock().get(model).copied().unwrap_or(0)
    }

    /// Snapshot of every request received
    pub fn calls(&self) -> Vec<TranslateRequest> {
        self.calls.lock().clone()
    }

    fn behavior_for(&self, model: &str) -> &MockBehavior {
        self.model_behaviors
            .get(model)
            .unwrap_or(&self.default_behavior)
    }

    fn echo(request: &TranslateRequest) -> String {
        format!("{}{}", MOCK_PREFIX, request.text)
    }
}

impl Clone for MockProvider {
    fn clone(&self) -> Self {
        Self {
            default_behavior: self.default_behavior.clone(),
            model_behaviors: self.model_behaviors.clone(),
            request_count: Arc::clone(&self.request_count),
            model_counts: Arc::clone(&self.model_counts),
            calls: Arc::clone(&self.calls),
            fallback: self.fallback,
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn translate(&self, request: &TranslateRequest) -> Result<String, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst) + 1;
        let model_count = {
            let mut counts = self.model_counts.lock();
            let entry = counts.entry(request.model.clone()).or_insert(0);
            *entry += 1;
            *entry
        };
        self.calls.lock().push(request.clone());

        match self.behavior_for(&request.model).clone() {
            MockBehavior::Working => Ok(Self::echo(request)),
            MockBehavior::Identity => Ok(request.text.clone()),
            MockBehavior::Fixed(text) => Ok(text),
            MockBehavior::Failing(failure) => Err(failure.to_error(count)),
            MockBehavior::FailThenSucceed { times, failure } => {
                if model_count <= times {
                    Err(failure.to_error(count))
                } else {
                    Ok(Self::echo(request))
                }
            }
            MockBehavior::Intermittent { fail_every } => {
                if fail_every > 0 && count % fail_every == 0 {
                    Err(MockFailure::Generic.to_error(count))
                } else {
                    Ok(Self::echo(request))
                }
            }
            MockBehavior::Refusing => Ok("I'm sorry, I can't translate that.".to_string()),
            MockBehavior::Empty => Ok(String::new()),
            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                Ok(Self::echo(request))
            }
            MockBehavior::Jittered { max_delay_ms } => {
                let seed: u64 = request.text.bytes().map(u64::from).sum();
                let delay = if max_delay_ms == 0 { 0 } else { seed % max_delay_ms };
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Ok(Self::echo(request))
            }
            MockBehavior::Panicking => panic!("mock provider panicked on request #{}", count),
        }
    }

    async fn test_connection(&self, model: &str) -> Result<(), ProviderError> {
        match self.behavior_for(model) {
            MockBehavior::Failing(failure) => Err(failure.to_error(0)),
            _ => Ok(()),
        }
    }

    fn supports_fallback(&self) -> bool {
        self.fallback
    }
}
