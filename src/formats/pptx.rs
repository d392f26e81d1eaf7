/*!
 * PowerPoint (`.pptx`) handler.
 *
 * Slides are taken in presentation order. Within a slide the shape tree is
 * walked in z-order: text shapes paragraph by paragraph, group shapes
 * recursively, tables row-major. Pictures, connectors, charts, media and
 * embedded objects are never touched.
 */

use std::collections::HashMap;

use log::{debug, info};

use crate::errors::FormatError;
use crate::translation::unit::{BlockResult, Location, TranslationUnit, UnitBuilder, reassemble};

use super::ooxml::package::{rels_path, resolve_target};
use super::ooxml::runs::DRAWING;
use super::ooxml::{OoxmlPackage, XmlDocument, XmlElement, XmlNode, load_part, relationships};
use super::{ChunkLimits, FormatHandler, OutputMode, translated_word_count};

pub const PRESENTATION_PART: &str = "ppt/presentation.xml";

enum Walk {
    Paragraph,
    Shape,
    Descend,
    Skip,
}

fn is_merged_table_cell(element: &XmlElement) -> bool {
    ["hMerge", "vMerge"]
        .iter()
        .any(|key| matches!(element.attr(key), Some("1") | Some("true")))
}

fn classify(element: &XmlElement) -> Walk {
    match element.name.as_str() {
        "a:p" => Walk::Paragraph,
        "p:sp" => Walk::Shape,
        "p:graphicFrame" => {
            if element.find("a:tbl").is_some() {
                Walk::Shape
            } else {
                Walk::Skip
            }
        }
        "p:pic" | "p:cxnSp" | "p:contentPart" | "mc:AlternateContent" => Walk::Skip,
        "a:tc" if is_merged_table_cell(element) => Walk::Skip,
        _ => Walk::Descend,
    }
}

/// (shape ordinal, paragraph) pairs of one shape tree in traversal order
fn collect_paragraphs<'a>(
    element: &'a XmlElement,
    shape: usize,
    next_shape: &mut usize,
    out: &mut Vec<(usize, &'a XmlElement)>,
) {
    for child in element.elements() {
        match classify(child) {
            Walk::Paragraph => out.push((shape, child)),
            Walk::Shape => {
                let ordinal = *next_shape;
                *next_shape += 1;
                collect_paragraphs(child, ordinal, next_shape, out);
            }
            Walk::Descend => collect_paragraphs(child, shape, next_shape, out),
            Walk::Skip => {}
        }
    }
}

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
            match classify(child) {
                Walk::Paragraph => {
                    let index = *counter;
                    *counter += 1;
                    if let Some(block) = edits.get(&index) {
                        sibling = DRAWING.apply(child, &block.translated, mode, block.style_hint.as_ref());
                        changed += 1;
                    }
                }
                Walk::Shape | Walk::Descend => {
                    changed += rewrite_paragraphs(child, counter, edits, mode);
                }
                Walk::Skip => {}
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

fn shape_tree(slide: &XmlElement) -> Option<&XmlElement> {
    slide.child("p:cSld")?.child("p:spTree")
}

fn shape_tree_mut(slide: &mut XmlElement) -> Option<&mut XmlElement> {
    slide.child_mut("p:cSld")?.child_mut("p:spTree")
}

/// Slide parts in presentation order, falling back to slide number order
fn slide_parts(package: &OoxmlPackage) -> Result<Vec<String>, FormatError> {
    let mut parts = Vec::new();
    if let Some(bytes) = package.part(PRESENTATION_PART) {
        let presentation = XmlDocument::parse(PRESENTATION_PART, bytes)?;
        let rels: HashMap<String, String> =
            relationships(package, &rels_path(PRESENTATION_PART))?
                .into_iter()
                .collect();
        if let Some(list) = presentation
            .require_root(PRESENTATION_PART)?
            .child("p:sldIdLst")
        {
            for slide in list.children_named("p:sldId") {
                if let Some(target) = slide.attr("r:id").and_then(|id| rels.get(id)) {
                    parts.push(resolve_target("ppt", target));
                }
            }
        }
    }

    if parts.is_empty() {
        let mut numbered: Vec<(u32, String)> = package
            .part_names()
            .filter_map(|name| {
                let number = name
                    .strip_prefix("ppt/slides/slide")?
                    .strip_suffix(".xml")?
                    .parse()
                    .ok()?;
                Some((number, name.to_string()))
            })
            .collect();
        numbered.sort();
        parts = numbered.into_iter().map(|(_, name)| name).collect();
    }

    Ok(parts
        .into_iter()
        .filter(|part| package.has_part(part))
        .collect())
}

/// Parsed PowerPoint presentation
pub struct PptxHandler {
    source: Vec<u8>,
    package: OoxmlPackage,
    slides: Vec<(String, XmlDocument)>,
}

impl PptxHandler {
    pub fn open(bytes: Vec<u8>) -> Result<Self, FormatError> {
        let package = OoxmlPackage::from_bytes(&bytes)?;
        if !package.has_part(PRESENTATION_PART) {
            return Err(FormatError::Malformed(format!(
                "not a PowerPoint presentation: {} is missing",
                PRESENTATION_PART
            )));
        }
        let slides = slide_parts(&package)?
            .into_iter()
            .map(|part| {
                let document = load_part(&package, &part)?;
                Ok((part, document))
            })
            .collect::<Result<Vec<_>, FormatError>>()?;
        debug!("Presentation has {} slides", slides.len());

        Ok(Self {
            source: bytes,
            package,
            slides,
        })
    }

    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }
}

impl FormatHandler for PptxHandler {
    fn extract(&self, limits: &ChunkLimits) -> Result<Vec<TranslationUnit>, FormatError> {
        let mut builder = UnitBuilder::new(limits.max_chunk_size);

        for (slide_index, (part, document)) in self.slides.iter().enumerate() {
            let Some(tree) = shape_tree(document.require_root(part)?) else {
                continue;
            };
            let mut paragraphs = Vec::new();
            let mut next_shape = 0;
            collect_paragraphs(tree, 0, &mut next_shape, &mut paragraphs);
            for (paragraph_index, (shape, paragraph)) in paragraphs.into_iter().enumerate() {
                let text = DRAWING.paragraph_text(paragraph);
                builder.push_block(
                    &text,
                    Location::Slide {
                        slide: slide_index,
                        shape,
                        paragraph: paragraph_index,
                    },
                    DRAWING.style_hint(paragraph),
                );
            }
        }

        let units = builder.finish();
        info!(
            "Extracted {} units from {} slides",
            units.len(),
            self.slides.len()
        );
        Ok(units)
    }

    fn reinject(&mut self, units: &[TranslationUnit], mode: OutputMode) -> Result<usize, FormatError> {
        let blocks = reassemble(units);
        let mut by_slide: HashMap<usize, HashMap<usize, &BlockResult>> = HashMap::new();
        for block in blocks.iter().filter(|b| b.is_changed()) {
            if let Location::Slide {
                slide, paragraph, ..
            } = &block.location
            {
                by_slide.entry(*slide).or_default().insert(*paragraph, block);
            }
        }

        let Self {
            package, slides, ..
        } = self;
        for (slide_index, (part, document)) in slides.iter_mut().enumerate() {
            let Some(edits) = by_slide.get(&slide_index) else {
                continue;
            };
            let Some(tree) = shape_tree_mut(document.require_root_mut(part)?) else {
                continue;
            };
            let mut counter = 0;
            if rewrite_paragraphs(tree, &mut counter, edits, mode) > 0 {
                package.replace_part(part, document.to_bytes()?)?;
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
