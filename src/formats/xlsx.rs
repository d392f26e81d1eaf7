/*!
 * Excel (`.xlsx`) handler.
 *
 * Sheets are walked in workbook order, cells row by row. Only string cells
 * (shared or inline) become units; numbers, booleans, errors and formulas are
 * left alone. A merged range is translated once through its anchor cell.
 * Translated cells are written back as inline strings so the shared string
 * table never needs rewriting.
 */

use std::collections::{HashMap, HashSet};

use log::info;

use crate::errors::FormatError;
use crate::translation::unit::{BlockResult, Location, TranslationUnit, UnitBuilder, reassemble};

use super::ooxml::package::{rels_path, resolve_target};
use super::ooxml::{OoxmlPackage, XmlDocument, XmlElement, load_part, relationships};
use super::{ChunkLimits, FormatHandler, OutputMode, translated_word_count};

pub const WORKBOOK_PART: &str = "xl/workbook.xml";
pub const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";

/// Sheet size limits of the file format (`XFD1048576`)
const MAX_ROWS: u32 = 1_048_576;
const MAX_COLUMNS: u32 = 16_384;

/// Parse an A1 style reference into zero based (row, column)
pub fn parse_cell_ref(reference: &str) -> Option<(u32, u32)> {
    let split = reference.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(split);
    if letters.is_empty() {
        return None;
    }
    let mut column: u32 = 0;
    for ch in letters.chars() {
        if !ch.is_ascii_alphabetic() {
            return None;
        }
        column = column
            .checked_mul(26)?
            .checked_add(ch.to_ascii_uppercase() as u32 - 'A' as u32 + 1)?;
    }
    let row: u32 = digits.parse().ok()?;
    if row == 0 || row > MAX_ROWS || column > MAX_COLUMNS {
        return None;
    }
    Some((row - 1, column - 1))
}

/// Cells of a merged range other than its top-left anchor
pub fn merged_followers(sheet: &XmlElement) -> HashSet<(u32, u32)> {
    let mut followers = HashSet::new();
    let Some(merges) = sheet.child("mergeCells") else {
        return followers;
    };
    for merge in merges.children_named("mergeCell") {
        let Some((start, end)) = merge.attr("ref").and_then(|r| r.split_once(':')) else {
            continue;
        };
        let (Some((r1, c1)), Some((r2, c2))) = (parse_cell_ref(start), parse_cell_ref(end)) else {
            continue;
        };
        for row in r1.min(r2)..=r1.max(r2) {
            for column in c1.min(c2)..=c1.max(c2) {
                if (row, column) != (r1.min(r2), c1.min(c2)) {
                    followers.insert((row, column));
                }
            }
        }
    }
    followers
}

/// Tracks the implicit position of rows and cells without an `r` attribute
#[derive(Default)]
struct CellCursor {
    row: u32,
    next_row: u32,
    next_column: u32,
}

impl CellCursor {
    fn enter_row(&mut self, row: &XmlElement) {
        self.row = row
            .attr("r")
            .and_then(|r| r.parse::<u32>().ok())
            .filter(|r| *r > 0)
            .map(|r| r - 1)
            .unwrap_or(self.next_row);
        self.next_row = self.row + 1;
        self.next_column = 0;
    }

    fn cell(&mut self, cell: &XmlElement) -> (u32, u32) {
        let position = cell
            .attr("r")
            .and_then(parse_cell_ref)
            .unwrap_or((self.row, self.next_column));
        self.next_column = position.1 + 1;
        position
    }
}

/// Text of a shared string item or inline string, ignoring phonetic runs
fn rich_text(item: &XmlElement) -> String {
    item.elements()
        .filter_map(|child| match child.name.as_str() {
            "t" => Some(child.text_content()),
            "r" => child.child("t").map(XmlElement::text_content),
            _ => None,
        })
        .collect()
}

struct Sheet {
    name: String,
    part: String,
    document: XmlDocument,
}

/// Parsed Excel workbook
pub struct XlsxHandler {
    source: Vec<u8>,
    package: OoxmlPackage,
    shared_strings: Vec<String>,
    sheets: Vec<Sheet>,
}

impl XlsxHandler {
    pub fn open(bytes: Vec<u8>) -> Result<Self, FormatError> {
        let package = OoxmlPackage::from_bytes(&bytes)?;
        let workbook = load_part(&package, WORKBOOK_PART)
            .map_err(|_| FormatError::Malformed("not an Excel workbook".to_string()))?;

        let rels: HashMap<String, String> = relationships(&package, &rels_path(WORKBOOK_PART))?
            .into_iter()
            .collect();
        let mut sheet_parts: Vec<(String, String)> = workbook
            .require_root(WORKBOOK_PART)?
            .child("sheets")
            .map(|sheets| {
                sheets
                    .children_named("sheet")
                    .filter_map(|sheet| {
                        let target = rels.get(sheet.attr("r:id")?)?;
                        let name = sheet.attr("name").unwrap_or_default().to_string();
                        Some((name, resolve_target("xl", target)))
                    })
                    .collect()
            })
            .unwrap_or_default();

        if sheet_parts.is_empty() {
            let mut fallback: Vec<(u32, String)> = package
                .part_names()
                .filter_map(|name| {
                    let number = name
                        .strip_prefix("xl/worksheets/sheet")?
                        .strip_suffix(".xml")?
                        .parse()
                        .ok()?;
                    Some((number, name.to_string()))
                })
                .collect();
            fallback.sort();
            sheet_parts = fallback
                .into_iter()
                .map(|(n, part)| (format!("Sheet{}", n), part))
                .collect();
        }

        let shared_strings = match package.part(SHARED_STRINGS_PART) {
            Some(bytes) => {
                let document = XmlDocument::parse(SHARED_STRINGS_PART, bytes)?;
                document
                    .require_root(SHARED_STRINGS_PART)?
                    .children_named("si")
                    .map(rich_text)
                    .collect()
            }
            None => Vec::new(),
        };

        let sheets = sheet_parts
            .into_iter()
            .filter(|(_, part)| package.has_part(part))
            .map(|(name, part)| {
                let document = load_part(&package, &part)?;
                Ok(Sheet {
                    name,
                    part,
                    document,
                })
            })
            .collect::<Result<Vec<_>, FormatError>>()?;

        Ok(Self {
            source: bytes,
            package,
            shared_strings,
            sheets,
        })
    }

    /// Sheet names in workbook order
    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    /// Text of a string cell; `None` for numbers, booleans, errors and formulas
    fn cell_text(&self, cell: &XmlElement) -> Option<String> {
        if cell.child("f").is_some() {
            return None;
        }
        match cell.attr("t") {
            Some("s") => {
                let index: usize = cell.child("v")?.text_content().trim().parse().ok()?;
                self.shared_strings.get(index).cloned()
            }
            Some("inlineStr") => cell.child("is").map(rich_text),
            _ => None,
        }
    }

    /// Text of the cell at a position, as currently stored
    pub fn cell_value(&self, sheet: &str, row: u32, column: u32) -> Option<String> {
        let sheet = self.sheets.iter().find(|s| s.name == sheet)?;
        let data = sheet.document.root()?.child("sheetData")?;
        let mut cursor = CellCursor::default();
        for row_element in data.children_named("row") {
            cursor.enter_row(row_element);
            for cell in row_element.children_named("c") {
                if cursor.cell(cell) == (row, column) {
                    return self.cell_text(cell);
                }
            }
        }
        None
    }
}

fn write_inline_string(cell: &mut XmlElement, text: &str) {
    cell.remove_children("v");
    cell.remove_children("is");
    cell.set_attr("t", "inlineStr");
    let mut t = XmlElement::new("t").with_text(text);
    if text.trim() != text || text.contains('\n') {
        t.set_attr("xml:space", "preserve");
    }
    cell.push_element(XmlElement::new("is").with_child(t));
}

impl FormatHandler for XlsxHandler {
    fn extract(&self, limits: &ChunkLimits) -> Result<Vec<TranslationUnit>, FormatError> {
        let mut builder = UnitBuilder::new(limits.max_chunk_size);

        for sheet in &self.sheets {
            let root = sheet.document.require_root(&sheet.part)?;
            let followers = merged_followers(root);
            let Some(data) = root.child("sheetData") else {
                continue;
            };
            let mut cursor = CellCursor::default();
            for row_element in data.children_named("row") {
                cursor.enter_row(row_element);
                for cell in row_element.children_named("c") {
                    let (row, column) = cursor.cell(cell);
                    if followers.contains(&(row, column)) {
                        continue;
                    }
                    let Some(text) = self.cell_text(cell) else {
                        continue;
                    };
                    builder.push_block(
                        &text,
                        Location::Cell {
                            sheet: sheet.part.clone(),
                            row,
                            column,
                        },
                        None,
                    );
                }
            }
        }

        let units = builder.finish();
        info!(
            "Extracted {} units from {} sheets",
            units.len(),
            self.sheets.len()
        );
        Ok(units)
    }

    fn reinject(&mut self, units: &[TranslationUnit], mode: OutputMode) -> Result<usize, FormatError> {
        let blocks = reassemble(units);
        let mut by_sheet: HashMap<&str, HashMap<(u32, u32), &BlockResult>> = HashMap::new();
        for block in blocks.iter().filter(|b| b.is_changed()) {
            if let Location::Cell { sheet, row, column } = &block.location {
                by_sheet
                    .entry(sheet.as_str())
                    .or_default()
                    .insert((*row, *column), block);
            }
        }

        let Self {
            package, sheets, ..
        } = self;
        for sheet in sheets.iter_mut() {
            let Some(edits) = by_sheet.get(sheet.part.as_str()) else {
                continue;
            };
            let root = sheet.document.require_root_mut(&sheet.part)?;
            let Some(data) = root.child_mut("sheetData") else {
                continue;
            };

            let mut changed = 0;
            let mut cursor = CellCursor::default();
            for row_element in data.elements_mut().filter(|e| e.name == "row") {
                cursor.enter_row(row_element);
                for cell in row_element.elements_mut().filter(|e| e.name == "c") {
                    let position = cursor.cell(cell);
                    let Some(block) = edits.get(&position) else {
                        continue;
                    };
                    let text = match mode {
                        OutputMode::Only => block.translated.clone(),
                        _ => format!("{}\n{}", block.original, block.translated),
                    };
                    write_inline_string(cell, &text);
                    changed += 1;
                }
            }

            if changed > 0 {
                package.replace_part(&sheet.part, sheet.document.to_bytes()?)?;
            }
        }

        Ok(translated_word_count(units))
    }

    fn to_bytes(&self) -> Result<Vec<u8>, FormatError> {
        if !self.package.is_modified() {
            return Ok(self.source.clone());
        }
        self.package.to_bytes()
    }
}
