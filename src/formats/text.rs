/*!
 * Plain text (`.txt`) handler.
 *
 * Paragraphs are separated by blank lines. The separators are kept verbatim so
 * an untranslated document comes back byte for byte.
 */

use log::info;
use once_cell::sync::Lazy;
use regex::Regex;

use encoding_rs::Encoding;

use crate::errors::FormatError;
use crate::translation::unit::{Location, TranslationUnit, UnitBuilder, reassemble};

use super::encoding::decode;
use super::{ChunkLimits, FormatHandler, OutputMode, translated_word_count};

static BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").unwrap());

/// Alternating paragraphs and separators; concatenation restores the text
pub fn split_paragraphs(text: &str) -> Vec<(String, bool)> {
    let mut pieces = Vec::new();
    let mut last = 0;
    for separator in BLANK_LINES.find_iter(text) {
        if separator.start() > last {
            pieces.push((text[last..separator.start()].to_string(), false));
        }
        pieces.push((separator.as_str().to_string(), true));
        last = separator.end();
    }
    if last < text.len() {
        pieces.push((text[last..].to_string(), false));
    }
    pieces
}

/// Parsed plain text document
pub struct TextHandler {
    source: Vec<u8>,
    encoding: &'static Encoding,
    /// (text, is_separator)
    pieces: Vec<(String, bool)>,
    output: Option<String>,
}

impl TextHandler {
    pub fn open(bytes: Vec<u8>) -> Result<Self, FormatError> {
        let decoded = decode(&bytes);
        let pieces = split_paragraphs(&decoded.text);
        Ok(Self {
            source: bytes,
            encoding: decoded.encoding,
            pieces,
            output: None,
        })
    }

    /// Name of the encoding the source was decoded with
    pub fn encoding(&self) -> &'static str {
        self.encoding.name()
    }

    pub fn paragraph_count(&self) -> usize {
        self.pieces.iter().filter(|(_, separator)| !separator).count()
    }
}

impl FormatHandler for TextHandler {
    fn extract(&self, limits: &ChunkLimits) -> Result<Vec<TranslationUnit>, FormatError> {
        let mut builder = UnitBuilder::new(limits.max_chunk_size);
        for (index, (text, separator)) in self.pieces.iter().enumerate() {
            if !separator {
                builder.push_block(text, Location::Block { index }, None);
            }
        }
        let units = builder.finish();
        info!(
            "Extracted {} units from {} paragraphs ({})",
            units.len(),
            self.paragraph_count(),
            self.encoding()
        );
        Ok(units)
    }

    fn reinject(&mut self, units: &[TranslationUnit], mode: OutputMode) -> Result<usize, FormatError> {
        let mut rendered: Vec<String> = self.pieces.iter().map(|(text, _)| text.clone()).collect();
        let mut changed = false;

        for block in reassemble(units).into_iter().filter(|b| b.is_changed()) {
            let Location::Block { index } = block.location else {
                continue;
            };
            let Some(slot) = rendered.get_mut(index) else {
                continue;
            };
            *slot = match mode {
                OutputMode::Only => block.translated,
                _ => format!("{}\n\n{}", block.original, block.translated.trim_start()),
            };
            changed = true;
        }

        self.output = changed.then(|| rendered.concat());
        Ok(translated_word_count(units))
    }

    fn to_bytes(&self) -> Result<Vec<u8>, FormatError> {
        Ok(match &self.output {
            Some(text) => text.clone().into_bytes(),
            None => self.source.clone(),
        })
    }
}
