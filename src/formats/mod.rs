/*!
 * Document format handlers.
 *
 * Each handler owns one parsed document. `extract` walks it in document order
 * and produces translation units; `reinject` writes the translated units back
 * into the exact positions they came from. Everything a handler does not
 * translate is written out unchanged.
 *
 * - `docx`, `xlsx`, `pptx`: Office Open XML packages (see `ooxml`)
 * - `csv`: delimited text
 * - `markdown`: Markdown with protected code, math and links
 * - `text`: plain text
 * - `registry`: extension to handler mapping
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::FormatError;
use crate::translation::chunker::MAX_CHUNK_SIZE;
use crate::translation::unit::TranslationUnit;

pub mod csv;
pub mod docx;
pub mod encoding;
pub mod markdown;
pub mod ooxml;
pub mod pptx;
pub mod registry;
pub mod text;
pub mod xlsx;

pub use registry::{Document, FormatKind};

/// Default chunk size for delimited text cells
pub const CSV_MAX_CHUNK_SIZE: usize = 1500;

/// How translated text is written back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputMode {
    /// Replace the original text
    #[default]
    #[serde(rename = "only")]
    Only,
    /// Keep the original and add the translation as a separate block
    #[serde(rename = "both")]
    Bilingual,
    /// Keep the original and append the translation inside the same block,
    /// inheriting its formatting
    #[serde(rename = "inherit")]
    InheritBilingual,
}

impl OutputMode {
    /// Parse a task output type such as `trans_only_inherit` or `both`
    pub fn from_task_type(value: &str) -> Self {
        let value = value.to_lowercase();
        if value.contains("only") {
            OutputMode::Only
        } else if value.contains("both") && value.contains("inherit") {
            OutputMode::InheritBilingual
        } else if value.contains("both") {
            OutputMode::Bilingual
        } else {
            OutputMode::Only
        }
    }

    /// Task output type that maps back onto this mode
    pub fn task_type(&self) -> &'static str {
        match self {
            OutputMode::Only => "trans_only_inherit",
            OutputMode::Bilingual => "trans_all_both_new",
            OutputMode::InheritBilingual => "trans_all_both_inherit",
        }
    }

    pub fn is_bilingual(&self) -> bool {
        !matches!(self, OutputMode::Only)
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputMode::Only => write!(f, "only"),
            OutputMode::Bilingual => write!(f, "both"),
            OutputMode::InheritBilingual => write!(f, "inherit"),
        }
    }
}

impl FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "only" => Ok(OutputMode::Only),
            "both" | "bilingual" => Ok(OutputMode::Bilingual),
            "inherit" | "both_inherit" => Ok(OutputMode::InheritBilingual),
            other => Err(format!("unknown output mode: {}", other)),
        }
    }
}

/// Chunk size limits applied while extracting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLimits {
    pub max_chunk_size: usize,
    pub csv_max_chunk_size: usize,
}

impl Default for ChunkLimits {
    fn default() -> Self {
        Self {
            max_chunk_size: MAX_CHUNK_SIZE,
            csv_max_chunk_size: CSV_MAX_CHUNK_SIZE,
        }
    }
}

/// Extract / reinject contract implemented once per document type
pub trait FormatHandler {
    /// Ordered translation units in document order
    fn extract(&self, limits: &ChunkLimits) -> Result<Vec<TranslationUnit>, FormatError>;

    /// Write translated units back; returns the word count of translated blocks
    fn reinject(&mut self, units: &[TranslationUnit], mode: OutputMode) -> Result<usize, FormatError>;

    /// Serialize the (possibly modified) document
    fn to_bytes(&self) -> Result<Vec<u8>, FormatError>;
}

/// Word count of the translated (non-skipped) units
pub(crate) fn translated_word_count<'a>(units: impl IntoIterator<Item = &'a TranslationUnit>) -> usize {
    units
        .into_iter()
        .filter(|u| u.status != crate::translation::unit::UnitStatus::Skipped)
        .map(|u| u.word_count)
        .sum()
}
