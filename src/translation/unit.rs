/*!
 * Translation units and jobs.
 *
 * A unit is the atomic piece of text sent to a provider. Handlers build units
 * through `UnitBuilder`, which applies the skip gate and splits oversize blocks
 * into contiguous fragments sharing one parent id.
 */

use serde::{Deserialize, Serialize};
use std::fmt;

use super::chunker;
use super::skip;
use super::terms::GlossaryTerm;

/// Lifecycle of a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    /// Waiting for a provider answer
    Pending,
    /// Translated (or degraded to its original text)
    Complete,
    /// Rejected by the skip gate; keeps its original text
    Skipped,
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitStatus::Pending => write!(f, "pending"),
            UnitStatus::Complete => write!(f, "complete"),
            UnitStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Format specific coordinate of a unit, only meaningful to the handler that produced it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Location {
    /// N-th translatable paragraph of an XML part (Word bodies, headers, footers)
    Paragraph { part: String, index: usize },
    /// Spreadsheet cell, zero based row and column
    Cell { sheet: String, row: u32, column: u32 },
    /// Slide paragraph; `paragraph` is the ordinal within the slide
    Slide { slide: usize, shape: usize, paragraph: usize },
    /// Delimited text cell, zero based
    Grid { row: usize, column: usize },
    /// Block of a plain text or Markdown document
    Block { index: usize },
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Paragraph { part, index } => write!(f, "{}#p{}", part, index),
            Location::Cell { sheet, row, column } => write!(f, "{}!r{}c{}", sheet, row, column),
            Location::Slide {
                slide,
                shape,
                paragraph,
            } => write!(f, "slide{}/shape{}/p{}", slide, shape, paragraph),
            Location::Grid { row, column } => write!(f, "r{}c{}", row, column),
            Location::Block { index } => write!(f, "block{}", index),
        }
    }
}

/// Opaque formatting captured at extraction and reapplied at reinjection.
///
/// Office handlers store serialized XML property elements here (`w:rPr`,
/// `a:pPr`, ...); text handlers leave it empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleHint {
    /// Run level properties of the first non-empty run
    pub run: Option<String>,
    /// Block level properties (paragraph alignment, spacing, indentation)
    pub block: Option<String>,
}

impl StyleHint {
    pub fn is_empty(&self) -> bool {
        self.run.is_none() && self.block.is_none()
    }
}

/// Position of a fragment within its logical block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment {
    /// Id of the first fragment of the block
    pub parent_id: usize,
    /// Zero based position inside the block
    pub index: usize,
    /// Number of fragments of the block
    pub count: usize,
}

/// The atomic item of work
#[derive(Debug, Clone)]
pub struct TranslationUnit {
    pub id: usize,
    pub original_text: String,
    pub translated_text: Option<String>,
    pub status: UnitStatus,
    pub word_count: usize,
    pub location: Location,
    pub fragment: Option<Fragment>,
    pub style_hint: Option<StyleHint>,
}

impl TranslationUnit {
    pub fn is_fragment(&self) -> bool {
        self.fragment.is_some()
    }

    /// Id shared by every fragment of the same logical block
    pub fn parent_id(&self) -> usize {
        self.fragment.map(|f| f.parent_id).unwrap_or(self.id)
    }

    pub fn needs_translation(&self) -> bool {
        self.status == UnitStatus::Pending
    }

    /// Text to write back: the translation when present, otherwise the original
    pub fn output_text(&self) -> &str {
        match (&self.status, &self.translated_text) {
            (UnitStatus::Skipped, _) => &self.original_text,
            (_, Some(text)) => text,
            (_, None) => &self.original_text,
        }
    }
}

/// Billing weight: CJK ideographs count 1, any other non-space character 0.5
pub fn word_count(text: &str) -> usize {
    let mut halves = 0usize;
    for ch in text.chars() {
        if ('\u{4e00}'..='\u{9fff}').contains(&ch) {
            halves += 2;
        } else if !ch.is_whitespace() {
            halves += 1;
        }
    }
    halves / 2
}

/// Builds the ordered unit list of one document
pub struct UnitBuilder {
    units: Vec<TranslationUnit>,
    max_chunk_size: usize,
    extra_gate: Option<fn(&str) -> bool>,
}

impl UnitBuilder {
    pub fn new(max_chunk_size: usize) -> Self {
        Self {
            units: Vec::new(),
            max_chunk_size: max_chunk_size.max(1),
            extra_gate: None,
        }
    }

    /// Add a handler specific skip rule on top of `should_translate`
    pub fn with_extra_skip(mut self, gate: fn(&str) -> bool) -> Self {
        self.extra_gate = Some(gate);
        self
    }

    /// Gate, chunk and append one logical block. Empty text produces no unit.
    pub fn push_block(&mut self, text: &str, location: Location, style_hint: Option<StyleHint>) {
        if text.trim().is_empty() {
            return;
        }
        if !self.is_translatable(text) {
            self.push_skipped(text, location, style_hint);
            return;
        }
        if text.chars().count() <= self.max_chunk_size {
            self.push_pending(text.to_string(), location, None, style_hint);
            return;
        }
        let pieces = chunker::split(text, self.max_chunk_size);
        self.push_fragments(pieces, location, style_hint);
    }

    /// Append pre-split pieces of one block. Pieces are not gated individually.
    pub fn push_fragments(
        &mut self,
        pieces: Vec<String>,
        location: Location,
        style_hint: Option<StyleHint>,
    ) {
        match pieces.len() {
            0 => {}
            1 => {
                let text = pieces.into_iter().next().unwrap_or_default();
                self.push_pending(text, location, None, style_hint);
            }
            count => {
                let parent_id = self.units.len();
                for (index, piece) in pieces.into_iter().enumerate() {
                    let fragment = Fragment {
                        parent_id,
                        index,
                        count,
                    };
                    self.push_pending(piece, location.clone(), Some(fragment), style_hint.clone());
                }
            }
        }
    }

    /// Record text that must be carried through untouched
    pub fn push_skipped(&mut self, text: &str, location: Location, style_hint: Option<StyleHint>) {
        let id = self.units.len();
        self.units.push(TranslationUnit {
            id,
            original_text: text.to_string(),
            translated_text: None,
            status: UnitStatus::Skipped,
            word_count: 0,
            location,
            fragment: None,
            style_hint,
        });
    }

    pub fn is_translatable(&self, text: &str) -> bool {
        skip::should_translate(text) && self.extra_gate.map(|gate| !gate(text)).unwrap_or(true)
    }

    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }

    pub fn finish(self) -> Vec<TranslationUnit> {
        self.units
    }

    fn push_pending(
        &mut self,
        text: String,
        location: Location,
        fragment: Option<Fragment>,
        style_hint: Option<StyleHint>,
    ) {
        let id = self.units.len();
        let word_count = word_count(&text);
        self.units.push(TranslationUnit {
            id,
            original_text: text,
            translated_text: None,
            status: UnitStatus::Pending,
            word_count,
            location,
            fragment,
            style_hint,
        });
    }
}

/// One logical block after fragment reassembly
#[derive(Debug, Clone)]
pub struct BlockResult {
    pub location: Location,
    pub original: String,
    pub translated: String,
    pub skipped: bool,
    pub style_hint: Option<StyleHint>,
    /// (original, translated) per fragment, in fragment order
    pub fragments: Vec<(String, String)>,
}

impl BlockResult {
    /// Whether writing this block back would change the document
    pub fn is_changed(&self) -> bool {
        !self.skipped && self.translated != self.original
    }
}

/// Group units by parent id and join fragments in `fragment_index` order.
///
/// Blocks come out in unit list order, which is document order.
pub fn reassemble(units: &[TranslationUnit]) -> Vec<BlockResult> {
    let mut blocks: Vec<BlockResult> = Vec::new();
    let mut i = 0;
    while i < units.len() {
        let parent = units[i].parent_id();
        let mut j = i;
        while j < units.len() && units[j].parent_id() == parent {
            j += 1;
        }
        let mut group: Vec<&TranslationUnit> = units[i..j].iter().collect();
        group.sort_by_key(|u| u.fragment.map(|f| f.index).unwrap_or(0));

        let fragments: Vec<(String, String)> = group
            .iter()
            .map(|u| {
                let translated = preserve_edges(&u.original_text, u.output_text());
                (u.original_text.clone(), translated)
            })
            .collect();
        let first = group[0];
        blocks.push(BlockResult {
            location: first.location.clone(),
            original: fragments.iter().map(|(o, _)| o.as_str()).collect(),
            translated: fragments.iter().map(|(_, t)| t.as_str()).collect(),
            skipped: group.iter().all(|u| u.status == UnitStatus::Skipped),
            style_hint: first.style_hint.clone(),
            fragments,
        });
        i = j;
    }
    blocks
}

/// Re-attach the leading and trailing whitespace of the source to a translation that dropped it
pub fn preserve_edges(original: &str, translated: &str) -> String {
    let core = translated.trim();
    if core.is_empty() {
        return translated.to_string();
    }
    let lead_len = original.len() - original.trim_start().len();
    let trail_len = original.len() - original.trim_end().len();
    let lead = if translated.starts_with(char::is_whitespace) {
        ""
    } else {
        &original[..lead_len]
    };
    let trail = if translated.ends_with(char::is_whitespace) {
        ""
    } else {
        &original[original.len() - trail_len..]
    };
    if lead.is_empty() && trail.is_empty() {
        return translated.to_string();
    }
    format!("{}{}{}", lead, translated, trail)
}

/// Terminal state of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Done,
    Failed,
}

/// Provider parameters of one job
#[derive(Debug, Clone)]
pub struct JobParams {
    pub primary_model: String,
    pub fallback_model: Option<String>,
    pub target_language: String,
    pub glossary: Vec<GlossaryTerm>,
    pub threads: usize,
    /// Base prompt, may contain `{target_lang}`
    pub prompt: String,
    /// Lower-case source extension without the dot
    pub extension: String,
}

/// A full run over one document
#[derive(Debug)]
pub struct TranslationJob {
    pub units: Vec<TranslationUnit>,
    pub params: JobParams,
    pub progress: f64,
    pub status: JobStatus,
    pub failure_reason: Option<String>,
}

impl TranslationJob {
    pub fn new(units: Vec<TranslationUnit>, params: JobParams) -> Self {
        Self {
            units,
            params,
            progress: 0.0,
            status: JobStatus::Running,
            failure_reason: None,
        }
    }

    /// Sum of weights over non-skipped units
    pub fn word_count(&self) -> usize {
        self.units
            .iter()
            .filter(|u| u.status != UnitStatus::Skipped)
            .map(|u| u.word_count)
            .sum()
    }

    pub fn pending_count(&self) -> usize {
        self.units.iter().filter(|u| u.needs_translation()).count()
    }
}
