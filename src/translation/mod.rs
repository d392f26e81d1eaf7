/*!
 * Translation pipeline shared by every document format.
 *
 * This module contains everything between a format handler's extracted units
 * and the provider calls. It is split into several submodules:
 *
 * - `unit`: Translation units, fragments, and the job record
 * - `chunker`: Lossless size-bounded splitting of long text
 * - `skip`: Content gate deciding whether text is worth translating
 * - `terms`: Glossary parsing and term-aware instruction building
 * - `response`: Cleanup and validation of provider answers
 * - `progress`: Throttled progress reporting
 * - `orchestrator`: Concurrent retry and fallback driver
 */

// Re-export main types for easier usage
pub use self::orchestrator::{BatchOrchestrator, OrchestratorReport, RetryPolicy, UnitOutcome};
pub use self::progress::{NoopProgress, ProgressPolicy, ProgressSink};
pub use self::terms::GlossaryTerm;
pub use self::unit::{
    BlockResult, JobParams, JobStatus, Location, TranslationJob, TranslationUnit, UnitBuilder,
    UnitStatus,
};

// Submodules
pub mod chunker;
pub mod orchestrator;
pub mod progress;
pub mod response;
pub mod skip;
pub mod terms;
pub mod unit;
