/*!
 * Delimited text (`.csv`) handler.
 *
 * Every cell is classified on its own, so numeric and identifier columns are
 * never sent for translation. The delimiter is detected from the first line.
 */

use csv::{ReaderBuilder, Terminator, WriterBuilder};
use log::info;

use crate::errors::FormatError;
use crate::translation::unit::{Location, TranslationUnit, UnitBuilder, reassemble};

use super::encoding::decode;
use super::{ChunkLimits, FormatHandler, OutputMode, translated_word_count};

const CANDIDATE_DELIMITERS: [u8; 3] = [b',', b';', b'\t'];

/// Most frequent candidate delimiter on the first line, outside quotes
pub fn detect_delimiter(text: &str) -> u8 {
    let first_line = text.lines().next().unwrap_or_default();
    let mut counts = [0usize; CANDIDATE_DELIMITERS.len()];
    let mut quoted = false;
    for byte in first_line.bytes() {
        if byte == b'"' {
            quoted = !quoted;
            continue;
        }
        if quoted {
            continue;
        }
        if let Some(i) = CANDIDATE_DELIMITERS.iter().position(|d| *d == byte) {
            counts[i] += 1;
        }
    }
    counts
        .iter()
        .enumerate()
        .filter(|(_, count)| **count > 0)
        .max_by_key(|(i, count)| (**count, std::cmp::Reverse(*i)))
        .map(|(i, _)| CANDIDATE_DELIMITERS[i])
        .unwrap_or(b',')
}

/// Parsed delimited text document
pub struct CsvHandler {
    source: Vec<u8>,
    delimiter: u8,
    had_bom: bool,
    rows: Vec<Vec<String>>,
    modified: bool,
}

impl CsvHandler {
    pub fn open(bytes: Vec<u8>) -> Result<Self, FormatError> {
        let decoded = decode(&bytes);
        let delimiter = detect_delimiter(&decoded.text);

        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiter)
            .from_reader(decoded.text.as_bytes());
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self {
            source: bytes,
            delimiter,
            had_bom: decoded.had_bom,
            rows,
            modified: false,
        })
    }

    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }
}

impl FormatHandler for CsvHandler {
    fn extract(&self, limits: &ChunkLimits) -> Result<Vec<TranslationUnit>, FormatError> {
        let mut builder = UnitBuilder::new(limits.csv_max_chunk_size);
        for (row, cells) in self.rows.iter().enumerate() {
            for (column, cell) in cells.iter().enumerate() {
                builder.push_block(cell, Location::Grid { row, column }, None);
            }
        }
        let units = builder.finish();
        info!("Extracted {} units from {} rows", units.len(), self.rows.len());
        Ok(units)
    }

    fn reinject(&mut self, units: &[TranslationUnit], mode: OutputMode) -> Result<usize, FormatError> {
        for block in reassemble(units).into_iter().filter(|b| b.is_changed()) {
            let Location::Grid { row, column } = block.location else {
                continue;
            };
            let Some(cell) = self.rows.get_mut(row).and_then(|r| r.get_mut(column)) else {
                continue;
            };
            *cell = match mode {
                OutputMode::Only => block.translated,
                _ => format!("{}\n{}", block.original, block.translated),
            };
            self.modified = true;
        }
        Ok(translated_word_count(units))
    }

    fn to_bytes(&self) -> Result<Vec<u8>, FormatError> {
        if !self.modified {
            return Ok(self.source.clone());
        }
        let mut out = Vec::new();
        if self.had_bom {
            out.extend_from_slice(b"\xEF\xBB\xBF");
        }
        let mut writer = WriterBuilder::new()
            .delimiter(self.delimiter)
            .terminator(Terminator::Any(b'\n'))
            .flexible(true)
            .from_writer(out);
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer
            .into_inner()
            .map_err(|e| FormatError::Io(e.into_error()))
    }
}
