/*!
 * # doctrans
 *
 * A Rust library for translating office documents with AI chat models and
 * machine translation APIs.
 *
 * ## Features
 *
 * - Word (.docx), Excel (.xlsx), PowerPoint (.pptx), CSV, Markdown and plain
 *   text documents
 * - Translate text using:
 *   - OpenAI-compatible chat completion APIs
 *   - Baidu machine translation
 * - Output with the translation only, or bilingual output keeping the original
 * - Glossary terms injected into the instruction when the text mentions them
 * - Concurrent requests with retry, backoff and a fallback model
 * - Task records with progress kept in SQLite
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `formats`: Document handlers that extract text units and write translations back
 * - `translation`: Units, chunking, the skip gate, glossary terms and the
 *   concurrent orchestrator
 * - `providers`: Client implementations for translation backends:
 *   - `providers::openai`: OpenAI-compatible chat client
 *   - `providers::baidu`: Baidu translation client
 * - `task`: Task records and their SQLite store
 * - `job`: Runs one task from document to output file
 * - `file_utils`: File system operations
 * - `app_controller`: Main application controller
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod errors;
pub mod file_utils;
pub mod formats;
pub mod job;
pub mod providers;
pub mod task;
pub mod translation;

// Re-export main types for easier usage
pub use app_config::Config;
pub use errors::{AppError, FormatError, JobError, ProviderError, TranslationError};
pub use formats::{Document, FormatHandler, FormatKind, OutputMode};
pub use job::{JobRunner, JobSettings, JobSummary};
pub use task::{SqliteTaskStore, TaskConfig, TaskStatus, TaskStore};
