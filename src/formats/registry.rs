/*!
 * Maps a source path onto the handler that understands it.
 */

use std::fmt;
use std::path::Path;

use log::{debug, warn};

use crate::errors::FormatError;
use crate::translation::unit::TranslationUnit;

use super::csv::CsvHandler;
use super::docx::DocxHandler;
use super::markdown::MarkdownHandler;
use super::pptx::PptxHandler;
use super::text::TextHandler;
use super::xlsx::XlsxHandler;
use super::{ChunkLimits, FormatHandler, OutputMode};

/// Local file header magic of a zip container
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Document families recognised by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatKind {
    Docx,
    Xlsx,
    Pptx,
    Csv,
    Markdown,
    Text,
    Pdf,
    LegacyWord,
    LegacyExcel,
    LegacyPowerPoint,
}

impl FormatKind {
    /// Resolve a lower-cased extension without the dot
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.trim_start_matches('.').to_lowercase().as_str() {
            "docx" => Some(Self::Docx),
            "xlsx" => Some(Self::Xlsx),
            "pptx" => Some(Self::Pptx),
            "csv" => Some(Self::Csv),
            "md" | "markdown" => Some(Self::Markdown),
            "txt" => Some(Self::Text),
            "pdf" => Some(Self::Pdf),
            "doc" => Some(Self::LegacyWord),
            "xls" => Some(Self::LegacyExcel),
            "ppt" => Some(Self::LegacyPowerPoint),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, FormatError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        Self::from_extension(extension).ok_or_else(|| {
            FormatError::UnsupportedFormat(format!("'{}' ({})", extension, path.display()))
        })
    }

    /// Canonical extension
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Docx => "docx",
            Self::Xlsx => "xlsx",
            Self::Pptx => "pptx",
            Self::Csv => "csv",
            Self::Markdown => "md",
            Self::Text => "txt",
            Self::Pdf => "pdf",
            Self::LegacyWord => "doc",
            Self::LegacyExcel => "xls",
            Self::LegacyPowerPoint => "ppt",
        }
    }

    /// OOXML counterpart of a legacy binary format
    pub fn modern(&self) -> Self {
        match self {
            Self::LegacyWord => Self::Docx,
            Self::LegacyExcel => Self::Xlsx,
            Self::LegacyPowerPoint => Self::Pptx,
            other => *other,
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, Self::LegacyWord | Self::LegacyExcel | Self::LegacyPowerPoint)
    }

    /// Every extension the registry recognises
    pub fn all() -> [FormatKind; 10] {
        [
            Self::Docx,
            Self::Xlsx,
            Self::Pptx,
            Self::Csv,
            Self::Markdown,
            Self::Text,
            Self::Pdf,
            Self::LegacyWord,
            Self::LegacyExcel,
            Self::LegacyPowerPoint,
        ]
    }
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// An opened document of any supported format
pub enum Document {
    Docx(DocxHandler),
    Xlsx(XlsxHandler),
    Pptx(PptxHandler),
    Csv(CsvHandler),
    Markdown(MarkdownHandler),
    Text(TextHandler),
}

impl Document {
    /// Read and parse a document from disk
    pub fn open(path: &Path) -> Result<Self, FormatError> {
        let kind = FormatKind::from_path(path)?;
        let bytes = std::fs::read(path).map_err(|e| FormatError::Unreadable {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_bytes(kind, bytes)
    }

    /// Parse a document already in memory
    pub fn from_bytes(kind: FormatKind, bytes: Vec<u8>) -> Result<Self, FormatError> {
        let kind = match kind {
            FormatKind::Pdf => {
                return Err(FormatError::UnsupportedFormat(
                    "PDF requires an external layout engine".to_string(),
                ));
            }
            legacy if legacy.is_legacy() => {
                if !bytes.starts_with(ZIP_MAGIC) {
                    warn!("Rejecting legacy binary .{} document", legacy);
                    return Err(FormatError::UnsupportedFormat(format!(
                        ".{}: legacy binary format; convert to OOXML first",
                        legacy
                    )));
                }
                debug!(".{} document is an OOXML package, opening as .{}", legacy, legacy.modern());
                legacy.modern()
            }
            other => other,
        };

        Ok(match kind {
            FormatKind::Docx => Self::Docx(DocxHandler::open(bytes)?),
            FormatKind::Xlsx => Self::Xlsx(XlsxHandler::open(bytes)?),
            FormatKind::Pptx => Self::Pptx(PptxHandler::open(bytes)?),
            FormatKind::Csv => Self::Csv(CsvHandler::open(bytes)?),
            FormatKind::Markdown => Self::Markdown(MarkdownHandler::open(bytes)?),
            FormatKind::Text => Self::Text(TextHandler::open(bytes)?),
            other => return Err(FormatError::UnsupportedFormat(other.to_string())),
        })
    }

    pub fn kind(&self) -> FormatKind {
        match self {
            Self::Docx(_) => FormatKind::Docx,
            Self::Xlsx(_) => FormatKind::Xlsx,
            Self::Pptx(_) => FormatKind::Pptx,
            Self::Csv(_) => FormatKind::Csv,
            Self::Markdown(_) => FormatKind::Markdown,
            Self::Text(_) => FormatKind::Text,
        }
    }

    fn handler(&self) -> &dyn FormatHandler {
        match self {
            Self::Docx(h) => h,
            Self::Xlsx(h) => h,
            Self::Pptx(h) => h,
            Self::Csv(h) => h,
            Self::Markdown(h) => h,
            Self::Text(h) => h,
        }
    }

    fn handler_mut(&mut self) -> &mut dyn FormatHandler {
        match self {
            Self::Docx(h) => h,
            Self::Xlsx(h) => h,
            Self::Pptx(h) => h,
            Self::Csv(h) => h,
            Self::Markdown(h) => h,
            Self::Text(h) => h,
        }
    }
}

impl FormatHandler for Document {
    fn extract(&self, limits: &ChunkLimits) -> Result<Vec<TranslationUnit>, FormatError> {
        self.handler().extract(limits)
    }

    fn reinject(&mut self, units: &[TranslationUnit], mode: OutputMode) -> Result<usize, FormatError> {
        self.handler_mut().reinject(units, mode)
    }

    fn to_bytes(&self) -> Result<Vec<u8>, FormatError> {
        self.handler().to_bytes()
    }
}
