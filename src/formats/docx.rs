/*!
 * Word (`.docx`) handler.
 *
 * Paragraphs are visited in document order: the body first (table cells row
 * by row), then headers, then footers. Drawings, VML pictures and embedded
 * objects are never read or written, and vertically merged continuation
 * cells are skipped so a merged cell is translated once.
 */

use std::collections::HashMap;

use log::info;

use crate::errors::FormatError;
use crate::translation::skip;
use crate::translation::unit::{BlockResult, Location, TranslationUnit, UnitBuilder, reassemble};

use super::ooxml::runs::WORD;
use super::ooxml::{OoxmlPackage, XmlDocument, XmlElement, XmlNode, load_part};
use super::{ChunkLimits, FormatHandler, OutputMode, translated_word_count};

pub const BODY_PART: &str = "word/document.xml";

/// Header and footer parts in display order: headers before footers, by number
fn header_footer_parts(package: &OoxmlPackage) -> Vec<String> {
    let mut parts: Vec<(u8, u32, String)> = package
        .part_names()
        .filter_map(|name| {
            let file = name.strip_prefix("word/")?;
            let (kind, rest) = if let Some(rest) = file.strip_prefix("header") {
                (0, rest)
            } else if let Some(rest) = file.strip_prefix("footer") {
                (1, rest)
            } else {
                return None;
            };
            let number = rest.strip_suffix(".xml")?;
            if number.contains('/') {
                return None;
            }
            Some((kind, number.parse().unwrap_or(0), name.to_string()))
        })
        .collect();
    parts.sort();
    parts.into_iter().map(|(_, _, name)| name).collect()
}

/// Subtrees holding no translatable body text
fn is_opaque(element: &XmlElement) -> bool {
    matches!(
        element.name.as_str(),
        "w:drawing" | "w:pict" | "w:object" | "mc:AlternateContent" | "w:sectPr"
    )
}

/// Table cell continuing a vertical merge started above
fn is_merge_continuation(element: &XmlElement) -> bool {
    if !element.is("w:tc") {
        return false;
    }
    element
        .child("w:tcPr")
        .and_then(|props| props.child("w:vMerge"))
        .map(|merge| merge.attr("w:val").map(|v| v != "restart").unwrap_or(true))
        .unwrap_or(false)
}

fn collect_paragraphs<'a>(element: &'a XmlElement, out: &mut Vec<&'a XmlElement>) {
    for child in element.elements() {
        if child.is("w:p") {
            out.push(child);
        } else if !is_opaque(child) && !is_merge_continuation(child) {
            collect_paragraphs(child, out);
        }
    }
}

/// Apply edits keyed by paragraph ordinal; returns the number of paragraphs changed
fn rewrite_paragraphs(
    element: &mut XmlElement,
    counter: &mut usize,
    edits: &HashMap<usize, &BlockResult>,
    mode: OutputMode,
) -> usize {
    let mut changed = 0;
    let mut i = 0;
    while i < element.children.len() {
        let mut sibling = None;
        if let XmlNode::Element(child) = &mut element.children[i] {
            if child.is("w:p") {
                let index = *counter;
                *counter += 1;
                if let Some(block) = edits.get(&index) {
                    sibling = WORD.apply(child, &block.translated, mode, block.style_hint.as_ref());
                    changed += 1;
                }
            } else if !is_opaque(child) && !is_merge_continuation(child) {
                changed += rewrite_paragraphs(child, counter, edits, mode);
            }
        }
        if let Some(sibling) = sibling {
            element.children.insert(i + 1, XmlNode::Element(sibling));
            i += 1;
        }
        i += 1;
    }
    changed
}

/// Parsed Word document
pub struct DocxHandler {
    source: Vec<u8>,
    package: OoxmlPackage,
    parts: Vec<(String, XmlDocument)>,
}

impl DocxHandler {
    pub fn open(bytes: Vec<u8>) -> Result<Self, FormatError> {
        let package = OoxmlPackage::from_bytes(&bytes)?;
        if !package.has_part(BODY_PART) {
            return Err(FormatError::Malformed(format!(
                "not a Word document: {} is missing",
                BODY_PART
            )));
        }

        let mut names = vec![BODY_PART.to_string()];
        names.extend(header_footer_parts(&package));
        let parts = names
            .into_iter()
            .map(|name| {
                let document = load_part(&package, &name)?;
                Ok((name, document))
            })
            .collect::<Result<Vec<_>, FormatError>>()?;

        Ok(Self {
            source: bytes,
            package,
            parts,
        })
    }

    /// Part names walked by the handler, in traversal order
    pub fn part_names(&self) -> Vec<&str> {
        self.parts.iter().map(|(name, _)| name.as_str()).collect()
    }
}

impl FormatHandler for DocxHandler {
    fn extract(&self, limits: &ChunkLimits) -> Result<Vec<TranslationUnit>, FormatError> {
        let mut builder =
            UnitBuilder::new(limits.max_chunk_size).with_extra_skip(skip::is_page_number);

        for (part, document) in &self.parts {
            let root = document.require_root(part)?;
            let mut paragraphs = Vec::new();
            collect_paragraphs(root, &mut paragraphs);
            for (index, paragraph) in paragraphs.into_iter().enumerate() {
                let text = WORD.paragraph_text(paragraph);
                builder.push_block(
                    &text,
                    Location::Paragraph {
                        part: part.clone(),
                        index,
                    },
                    WORD.style_hint(paragraph),
                );
            }
        }

        let units = builder.finish();
        info!("Extracted {} units from Word document", units.len());
        Ok(units)
    }

    fn reinject(&mut self, units: &[TranslationUnit], mode: OutputMode) -> Result<usize, FormatError> {
        let blocks = reassemble(units);
        let mut by_part: HashMap<&str, HashMap<usize, &BlockResult>> = HashMap::new();
        for block in blocks.iter().filter(|b| b.is_changed()) {
            if let Location::Paragraph { part, index } = &block.location {
                by_part.entry(part.as_str()).or_default().insert(*index, block);
            }
        }

        let Self { package, parts, .. } = self;
        for (name, document) in parts.iter_mut() {
            let Some(edits) = by_part.get(name.as_str()) else {
                continue;
            };
            let root = document.require_root_mut(name)?;
            let mut counter = 0;
            if rewrite_paragraphs(root, &mut counter, edits, mode) > 0 {
                package.replace_part(name, document.to_bytes()?)?;
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
