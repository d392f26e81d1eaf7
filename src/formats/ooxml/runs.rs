//! Paragraph and run handling shared by WordprocessingML and DrawingML.

use crate::formats::OutputMode;
use crate::translation::unit::StyleHint;

use super::xml::{XmlElement, XmlNode, parse_fragment};

/// Element names of one markup dialect
#[derive(Debug, Clone, Copy)]
pub struct RunSchema {
    pub paragraph: &'static str,
    pub run: &'static str,
    pub text: &'static str,
    pub run_props: &'static str,
    pub paragraph_props: &'static str,
    pub line_break: &'static str,
    /// Element that must stay last in a paragraph, if the dialect has one
    pub paragraph_end: Option<&'static str>,
    /// Whether text elements need `xml:space="preserve"` for edge whitespace
    pub preserve_space: bool,
    /// Subtrees never read or written (drawings, embedded objects, fields)
    pub opaque: &'static [&'static str],
    /// Paragraph properties that belong to one paragraph only and are not
    /// copied onto a bilingual sibling (numbering, mark formatting, revisions)
    pub unique_props: &'static [&'static str],
    /// Section break stored in paragraph properties; it moves to the
    /// bilingual sibling so the section still ends after the translation
    pub section_props: Option<&'static str>,
}

pub const WORD: RunSchema = RunSchema {
    paragraph: "w:p",
    run: "w:r",
    text: "w:t",
    run_props: "w:rPr",
    paragraph_props: "w:pPr",
    line_break: "w:br",
    paragraph_end: None,
    preserve_space: true,
    opaque: &["w:drawing", "w:pict", "w:object", "mc:AlternateContent", "w:del"],
    unique_props: &["w:numPr", "w:rPr", "w:pPrChange"],
    section_props: Some("w:sectPr"),
};

pub const DRAWING: RunSchema = RunSchema {
    paragraph: "a:p",
    run: "a:r",
    text: "a:t",
    run_props: "a:rPr",
    paragraph_props: "a:pPr",
    line_break: "a:br",
    paragraph_end: Some("a:endParaRPr"),
    preserve_space: false,
    opaque: &["a:fld", "mc:AlternateContent"],
    unique_props: &[],
    section_props: None,
};

impl RunSchema {
    fn is_opaque(&self, element: &XmlElement) -> bool {
        self.opaque.contains(&element.name.as_str())
    }

    /// Runs of a paragraph in document order, looking through hyperlinks and
    /// other wrappers but not into nested paragraphs or opaque subtrees
    pub fn runs<'a>(&self, paragraph: &'a XmlElement) -> Vec<&'a XmlElement> {
        let mut out = Vec::new();
        self.collect_runs(paragraph, &mut out);
        out
    }

    fn collect_runs<'a>(&self, element: &'a XmlElement, out: &mut Vec<&'a XmlElement>) {
        for child in element.elements() {
            if child.is(self.run) {
                out.push(child);
            } else if !child.is(self.paragraph) && !self.is_opaque(child) {
                self.collect_runs(child, out);
            }
        }
    }

    pub fn run_text(&self, run: &XmlElement) -> String {
        run.children_named(self.text)
            .map(|t| t.text_content())
            .collect()
    }

    pub fn paragraph_text(&self, paragraph: &XmlElement) -> String {
        self.runs(paragraph)
            .into_iter()
            .map(|r| self.run_text(r))
            .collect()
    }

    /// Run properties of the first run carrying text, and the paragraph properties
    pub fn style_hint(&self, paragraph: &XmlElement) -> Option<StyleHint> {
        let run = self
            .runs(paragraph)
            .into_iter()
            .find(|r| !self.run_text(r).is_empty())
            .and_then(|r| r.child(self.run_props))
            .map(XmlElement::to_xml);
        let block = paragraph.child(self.paragraph_props).map(XmlElement::to_xml);
        let hint = StyleHint { run, block };
        (!hint.is_empty()).then_some(hint)
    }

    fn text_element(&self, text: &str) -> XmlElement {
        let mut element = XmlElement::new(self.text).with_text(text);
        if self.preserve_space && text.trim() != text {
            element.set_attr("xml:space", "preserve");
        }
        element
    }

    fn new_run(&self, style: Option<&StyleHint>, content: Vec<XmlElement>) -> XmlElement {
        let mut run = XmlElement::new(self.run);
        if let Some(props) = style
            .and_then(|s| s.run.as_deref())
            .and_then(parse_fragment)
        {
            run.push_element(props);
        }
        for element in content {
            run.push_element(element);
        }
        run
    }

    /// Put `text` into the first text-bearing run and empty every other run
    fn rewrite_runs(&self, element: &mut XmlElement, replacement: &mut Option<String>) {
        for child in element.elements_mut() {
            if child.is(self.run) {
                if child.child(self.text).is_none() {
                    continue;
                }
                match replacement.take() {
                    Some(text) => {
                        let mut first = true;
                        let text_name = self.text;
                        child.children.retain(|n| match n {
                            XmlNode::Element(e) if e.is(text_name) => std::mem::replace(&mut first, false),
                            _ => true,
                        });
                        if let Some(t) = child.child_mut(self.text) {
                            *t = self.text_element(&text);
                        }
                    }
                    None => {
                        for t in child.elements_mut().filter(|e| e.name == self.text) {
                            t.set_text("");
                            t.self_closing = false;
                        }
                    }
                }
            } else if !child.is(self.paragraph) && !self.is_opaque(child) {
                self.rewrite_runs(child, replacement);
            }
        }
    }

    /// Write `translated` into `paragraph` according to `mode`.
    ///
    /// Returns a new paragraph to insert right after this one when the mode
    /// asks for a separate bilingual paragraph.
    pub fn apply(
        &self,
        paragraph: &mut XmlElement,
        translated: &str,
        mode: OutputMode,
        style: Option<&StyleHint>,
    ) -> Option<XmlElement> {
        match mode {
            OutputMode::Only => {
                let mut replacement = Some(translated.to_string());
                self.rewrite_runs(paragraph, &mut replacement);
                None
            }
            OutputMode::Bilingual => {
                let mut sibling = XmlElement::new(self.paragraph);
                if let Some(props) = paragraph.child_mut(self.paragraph_props) {
                    let section = self.section_props.and_then(|name| props.take_child(name));
                    let mut copied = props.clone();
                    for name in self.unique_props {
                        copied.remove_children(name);
                    }
                    if let Some(section) = section {
                        copied.push_element(section);
                    }
                    sibling.push_element(copied);
                }
                sibling.push_element(self.new_run(style, vec![self.text_element(translated)]));
                Some(sibling)
            }
            OutputMode::InheritBilingual => {
                let additions = if self.paragraph_end.is_some() {
                    // DrawingML breaks live at paragraph level
                    vec![
                        XmlElement::new(self.line_break).with_child(XmlElement::new(self.run_props)),
                        self.new_run(style, vec![self.text_element(translated)]),
                    ]
                } else {
                    vec![self.new_run(
                        style,
                        vec![XmlElement::new(self.line_break), self.text_element(translated)],
                    )]
                };
                let position = self
                    .paragraph_end
                    .and_then(|end| {
                        paragraph
                            .children
                            .iter()
                            .position(|n| matches!(n, XmlNode::Element(e) if e.name == end))
                    })
                    .unwrap_or(paragraph.children.len());
                for (offset, element) in additions.into_iter().enumerate() {
                    paragraph
                        .children
                        .insert(position + offset, XmlNode::Element(element));
                }
                paragraph.self_closing = false;
                None
            }
        }
    }
}
