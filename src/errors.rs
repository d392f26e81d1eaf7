/*!
 * Error types for the doctrans pipeline.
 *
 * The variants mirror how failures are treated by a translation job:
 * provider errors are classified into retry categories, format errors are
 * structural and never retried, and translation errors are fatal for the job.
 */

use thiserror::Error;

/// Retry category of a provider failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Credentials rejected; fatal for the whole job
    Authentication,
    /// Provider asked us to slow down
    RateLimit,
    /// Network could not reach the provider
    Connection,
    /// Anything else, including malformed or refused answers
    Generic,
}

/// Errors that can occur when working with provider APIs
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// The provider answered, but the answer is empty or a refusal
    #[error("Invalid translation response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Map this error onto the retry policy categories
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::AuthenticationError(_) => ErrorCategory::Authentication,
            Self::RateLimitExceeded(_) => ErrorCategory::RateLimit,
            Self::ConnectionError(_) => ErrorCategory::Connection,
            Self::ApiError { status_code, .. } => match status_code {
                401 | 403 => ErrorCategory::Authentication,
                429 => ErrorCategory::RateLimit,
                _ => ErrorCategory::Generic,
            },
            Self::RequestFailed(_) | Self::ParseError(_) | Self::InvalidResponse(_) => {
                ErrorCategory::Generic
            }
        }
    }

    /// Build an error from a non-success HTTP status
    pub fn from_status(status_code: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status_code {
            401 | 403 => Self::AuthenticationError(message),
            429 => Self::RateLimitExceeded(message),
            _ => Self::ApiError {
                status_code,
                message,
            },
        }
    }

    /// Classify a transport error raised by reqwest
    pub fn from_reqwest(error: &reqwest::Error) -> Self {
        if error.is_connect() || error.is_timeout() {
            Self::ConnectionError(error.to_string())
        } else if let Some(status) = error.status() {
            Self::from_status(status.as_u16(), error.to_string())
        } else if error.is_decode() {
            Self::ParseError(error.to_string())
        } else {
            Self::RequestFailed(error.to_string())
        }
    }
}

/// Structural errors raised while opening, parsing or writing a document
#[derive(Error, Debug)]
pub enum FormatError {
    /// Extension is not handled by any format handler
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// Document could not be read from disk
    #[error("Cannot read document {path}: {message}")]
    Unreadable {
        /// Path of the document
        path: String,
        /// Underlying reason
        message: String,
    },

    /// Document was read but its content is not what the handler expects
    #[error("Malformed document: {0}")]
    Malformed(String),

    /// XML part failed to parse or serialize
    #[error("XML error in {part}: {message}")]
    Xml {
        /// Package part name
        part: String,
        /// Parser message
        message: String,
    },

    /// Zip container error
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// CSV reader or writer error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error while writing the output
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that abort a translation job
#[derive(Error, Debug)]
pub enum TranslationError {
    /// Provider rejected our credentials
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Every configured model ran out of attempts
    #[error("primary and backup models both failed: {0}")]
    ModelsExhausted(String),

    /// Job was cancelled after another unit failed fatally
    #[error("Translation cancelled")]
    Cancelled,

    /// Error from the provider API
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

/// Errors raised by the job runner
#[derive(Error, Debug)]
pub enum JobError {
    /// Document could not be opened, parsed or written
    #[error("{0}")]
    Format(#[from] FormatError),

    /// Translation phase failed fatally
    #[error("{0}")]
    Translation(#[from] TranslationError),

    /// Task record could not be read or updated
    #[error("Task error: {0}")]
    Task(String),

    /// Provider could not be configured from the task
    #[error("Provider configuration error: {0}")]
    ProviderSetup(String),
}

impl JobError {
    /// Whether the job failed before any translation work started
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Format(_) | Self::ProviderSetup(_))
    }
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from a provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from a document handler
    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    /// Error from translation
    #[error("Translation error: {0}")]
    Translation(#[from] TranslationError),

    /// Error from a job run
    #[error("Job error: {0}")]
    Job(#[from] JobError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl AppError {
    /// Process exit status reported by the command line tool
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::File(_) => 2,
            Self::Format(_) => 3,
            Self::Job(e) if e.is_structural() => 3,
            Self::Provider(_) | Self::Translation(_) | Self::Job(_) => 4,
            Self::Unknown(_) => 1,
        }
    }
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        let error = match error.downcast::<JobError>() {
            Ok(e) => return Self::Job(e),
            Err(error) => error,
        };
        let error = match error.downcast::<ProviderError>() {
            Ok(e) => return Self::Provider(e),
            Err(error) => error,
        };
        match error.downcast::<std::io::Error>() {
            Ok(e) => Self::File(e.to_string()),
            Err(error) => Self::Unknown(format!("{:#}", error)),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}

/// Maximum length of a persisted failure reason
pub const MAX_FAILURE_REASON_CHARS: usize = 500;

/// Shorten an error message for the task record, falling back to a generic text
pub fn truncate_reason(reason: &str) -> String {
    let trimmed = reason.trim();
    if trimmed.is_empty() {
        return "unknown error".to_string();
    }
    trimmed.chars().take(MAX_FAILURE_REASON_CHARS).collect()
}
