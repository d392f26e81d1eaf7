/*!
 * Markdown (`.md`) handler.
 *
 * Code, math, images, link targets and HTML tags are swapped for placeholders
 * (`⟦TYPE_N⟧`) before anything is chunked, and restored verbatim on output.
 * The remaining text is cut along semantic blocks: headings, tables, quotes,
 * lists and paragraphs. Oversize tables repeat their header in every
 * fragment; oversize quotes and lists split between items.
 */

use log::info;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::errors::FormatError;
use crate::translation::skip;
use crate::translation::unit::{BlockResult, Location, TranslationUnit, UnitBuilder, reassemble};

use super::encoding::decode;
use super::{ChunkLimits, FormatHandler, OutputMode, translated_word_count};

static CODE_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"```[\s\S]*?```|~~~[\s\S]*?~~~").unwrap());
static INLINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`[^`\n]+`").unwrap());
static MATH_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\$[\s\S]*?\$\$").unwrap());
static MATH_INLINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$[^$\n]+\$").unwrap());
static IMAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[[^\]]*\]\([^)]+\)").unwrap());
static LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]+)\](\([^)]+\))").unwrap());
static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+/>").unwrap());
static HTML_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"<!--[\s\S]*?-->").unwrap());

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"⟦[A-Z_]+_\d+⟧").unwrap());

static HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(#{1,6}\s+)(.*)$").unwrap());
static RULE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-*_]{3,}\s*$").unwrap());
static TABLE_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*[|\-:\s]+$").unwrap());
static UNORDERED_ITEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*[-*+]\s+").unwrap());
static ORDERED_ITEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\d+\.\s+").unwrap());

/// Protected syntax and the placeholders standing in for it
#[derive(Debug, Default, Clone)]
pub struct Protected {
    pub content: String,
    /// (placeholder, original) in creation order
    pub spans: Vec<(String, String)>,
}

impl Protected {
    fn placeholder(&mut self, kind: &str, original: String) -> String {
        let placeholder = format!("⟦{}_{}⟧", kind, self.spans.len() + 1);
        self.spans.push((placeholder.clone(), original));
        placeholder
    }

    /// Put the protected spans back, latest first so nested placeholders resolve
    pub fn restore(&self, text: &str) -> String {
        let mut out = text.to_string();
        for (placeholder, original) in self.spans.iter().rev() {
            out = out.replace(placeholder, original);
        }
        out
    }
}

/// Replace everything that must not be translated with placeholders
pub fn protect(text: &str) -> Protected {
    let mut protected = Protected::default();
    let mut content = text.to_string();

    let steps: [(&str, &Lazy<Regex>); 5] = [
        ("CODE_BLOCK", &CODE_BLOCK),
        ("INLINE_CODE", &INLINE_CODE),
        ("MATH_BLOCK", &MATH_BLOCK),
        ("MATH_INLINE", &MATH_INLINE),
        ("IMAGE", &IMAGE),
    ];
    for (kind, re) in steps {
        content = re
            .replace_all(&content, |caps: &Captures| {
                protected.placeholder(kind, caps[0].to_string())
            })
            .into_owned();
    }

    // Link text stays translatable, only the target is protected
    content = LINK
        .replace_all(&content, |caps: &Captures| {
            let target = format!("]{}", &caps[2]);
            let placeholder = protected.placeholder("LINK_URL", target);
            format!("[{}{}", &caps[1], placeholder)
        })
        .into_owned();

    for (kind, re) in [("HTML_TAG", &HTML_TAG), ("HTML_COMMENT", &HTML_COMMENT)] {
        content = re
            .replace_all(&content, |caps: &Captures| {
                protected.placeholder(kind, caps[0].to_string())
            })
            .into_owned();
    }

    protected.content = content;
    protected
}

/// Skip rule for text that is nothing but placeholders and punctuation
fn placeholder_only(text: &str) -> bool {
    !skip::should_translate(&PLACEHOLDER.replace_all(text, ""))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Separator,
    Rule,
    Header,
    Table,
    Quote,
    List,
    Paragraph,
}

/// One semantic block: a run of whole lines
#[derive(Debug, Clone)]
pub struct MdBlock {
    pub kind: BlockKind,
    pub text: String,
    /// `#` marker of a header, including its trailing whitespace
    pub prefix: String,
}

impl MdBlock {
    fn new(kind: BlockKind, lines: &[&str]) -> Self {
        Self {
            kind,
            text: lines.join("\n"),
            prefix: String::new(),
        }
    }

    /// Text sent for translation
    fn body(&self) -> &str {
        &self.text[self.prefix.len()..]
    }
}

fn is_block_starter(line: &str) -> bool {
    let trimmed = line.trim();
    HEADER.is_match(trimmed)
        || UNORDERED_ITEM.is_match(trimmed)
        || ORDERED_ITEM.is_match(trimmed)
        || trimmed.starts_with('>')
        || trimmed.starts_with('|')
        || RULE.is_match(trimmed)
}

/// A table continues with `|` rows; a separator without a leading pipe
/// (`---|---`) only counts right under the header
fn is_table_row(line: &str, second_line: bool) -> bool {
    let trimmed = line.trim();
    if trimmed.starts_with('|') {
        return true;
    }
    second_line && trimmed.contains('|') && TABLE_SEPARATOR.is_match(trimmed)
}

fn is_list_item(line: &str) -> bool {
    UNORDERED_ITEM.is_match(line) || ORDERED_ITEM.is_match(line)
}

/// Cut text into semantic blocks; joining block texts with `\n` restores it exactly
pub fn split_blocks(text: &str) -> Vec<MdBlock> {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut blocks = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        let trimmed = line.trim();
        let start = i;

        if trimmed.is_empty() {
            blocks.push(MdBlock::new(BlockKind::Separator, &lines[i..=i]));
            i += 1;
            continue;
        }
        if RULE.is_match(trimmed) {
            blocks.push(MdBlock::new(BlockKind::Rule, &lines[i..=i]));
            i += 1;
            continue;
        }
        if let Some(caps) = HEADER.captures(line) {
            let mut block = MdBlock::new(BlockKind::Header, &lines[i..=i]);
            block.prefix = caps[1].to_string();
            blocks.push(block);
            i += 1;
            continue;
        }

        let kind = if trimmed.starts_with('|') {
            i += 1;
            while i < lines.len() && is_table_row(lines[i], i == start + 1) {
                i += 1;
            }
            BlockKind::Table
        } else if trimmed.starts_with('>') {
            i += 1;
            while i < lines.len() {
                let next = lines[i].trim();
                if next.starts_with('>') || (!next.is_empty() && !is_block_starter(next)) {
                    i += 1;
                } else if next.is_empty()
                    && lines.get(i + 1).is_some_and(|l| l.trim().starts_with('>'))
                {
                    i += 1;
                } else {
                    break;
                }
            }
            BlockKind::Quote
        } else if is_list_item(line) {
            let ordered = ORDERED_ITEM.is_match(line);
            let same_kind = |l: &str| {
                if ordered {
                    ORDERED_ITEM.is_match(l)
                } else {
                    UNORDERED_ITEM.is_match(l)
                }
            };
            i += 1;
            while i < lines.len() {
                let next = lines[i];
                if same_kind(next) || next.starts_with("  ") || next.starts_with('\t') {
                    i += 1;
                } else if next.trim().is_empty()
                    && lines
                        .get(i + 1)
                        .is_some_and(|l| same_kind(l) || l.starts_with("  "))
                {
                    i += 1;
                } else {
                    break;
                }
            }
            BlockKind::List
        } else {
            i += 1;
            while i < lines.len() && !lines[i].trim().is_empty() && !is_block_starter(lines[i]) {
                i += 1;
            }
            BlockKind::Paragraph
        };

        blocks.push(MdBlock::new(kind, &lines[start..i]));
    }
    blocks
}

/// Greedily pack groups of lines into pieces of at most `max` characters.
///
/// Every piece but the last keeps the newline that separated it from the next.
fn pack_groups(groups: Vec<String>, max: usize) -> Vec<String> {
    let mut pieces: Vec<String> = Vec::new();
    let mut current = String::new();
    for group in groups {
        let size = current.chars().count() + group.chars().count() + 1;
        if !current.is_empty() && size > max {
            pieces.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(&group);
    }
    if !current.is_empty() || pieces.is_empty() {
        pieces.push(current);
    }
    let count = pieces.len();
    for piece in pieces.iter_mut().take(count - 1) {
        piece.push('\n');
    }
    pieces
}

/// Number of header lines repeated at the top of every table fragment
fn table_header_len(lines: &[&str]) -> usize {
    if lines.len() > 1 && TABLE_SEPARATOR.is_match(lines[1]) {
        2
    } else {
        1
    }
}

/// Split a table by rows, repeating the header (and separator) in each piece
pub fn split_table(text: &str, max: usize) -> Vec<String> {
    let lines: Vec<&str> = text.split('\n').collect();
    let header_len = table_header_len(&lines);
    if lines.len() <= header_len {
        return vec![text.to_string()];
    }
    let header = lines[..header_len].join("\n");
    let rows: Vec<String> = lines[header_len..].iter().map(|l| l.to_string()).collect();
    let budget = max.saturating_sub(header.chars().count() + 1).max(1);

    let mut pieces = pack_groups(rows, budget);
    for piece in pieces.iter_mut() {
        *piece = format!("{}\n{}", header, piece);
    }
    pieces
}

/// Undo `split_table` on translated pieces by dropping the repeated headers
pub fn join_table_fragments(fragments: &[String], header_len: usize) -> String {
    let mut out = String::new();
    for (index, fragment) in fragments.iter().enumerate() {
        if index == 0 {
            out.push_str(fragment);
            continue;
        }
        let mut rest = fragment.as_str();
        for _ in 0..header_len {
            rest = rest.split_once('\n').map(|(_, tail)| tail).unwrap_or("");
        }
        out.push_str(rest);
    }
    out
}

/// Split a quote by line or a list by item
fn split_items(block: &MdBlock, max: usize) -> Vec<String> {
    let lines: Vec<&str> = block.text.split('\n').collect();
    let groups: Vec<String> = match block.kind {
        BlockKind::List => {
            let mut groups: Vec<Vec<&str>> = Vec::new();
            for line in lines {
                if is_list_item(line) || groups.is_empty() {
                    groups.push(vec![line]);
                } else if let Some(last) = groups.last_mut() {
                    last.push(line);
                }
            }
            groups.into_iter().map(|g| g.join("\n")).collect()
        }
        _ => lines.into_iter().map(str::to_string).collect(),
    };
    pack_groups(groups, max)
}

/// Parsed Markdown document
pub struct MarkdownHandler {
    source: Vec<u8>,
    protected: Protected,
    blocks: Vec<MdBlock>,
    output: Option<String>,
}

impl MarkdownHandler {
    pub fn open(bytes: Vec<u8>) -> Result<Self, FormatError> {
        let decoded = decode(&bytes);
        let protected = protect(&decoded.text);
        let blocks = split_blocks(&protected.content);
        Ok(Self {
            source: bytes,
            protected,
            blocks,
            output: None,
        })
    }

    pub fn blocks(&self) -> &[MdBlock] {
        &self.blocks
    }

    pub fn protected(&self) -> &Protected {
        &self.protected
    }

    fn translated_body(&self, block: &MdBlock, result: &BlockResult) -> String {
        if block.kind == BlockKind::Table && result.fragments.len() > 1 {
            let lines: Vec<&str> = block.text.split('\n').collect();
            let translated: Vec<String> = result.fragments.iter().map(|(_, t)| t.clone()).collect();
            return join_table_fragments(&translated, table_header_len(&lines));
        }
        result.translated.clone()
    }
}

impl FormatHandler for MarkdownHandler {
    fn extract(&self, limits: &ChunkLimits) -> Result<Vec<TranslationUnit>, FormatError> {
        let max = limits.max_chunk_size;
        let mut builder = UnitBuilder::new(max).with_extra_skip(placeholder_only);

        for (index, block) in self.blocks.iter().enumerate() {
            let location = Location::Block { index };
            let body = block.body();
            match block.kind {
                BlockKind::Separator | BlockKind::Rule => {}
                BlockKind::Header | BlockKind::Paragraph => builder.push_block(body, location, None),
                BlockKind::Table | BlockKind::Quote | BlockKind::List => {
                    if body.chars().count() <= max {
                        builder.push_block(body, location, None);
                    } else if !builder.is_translatable(body) {
                        builder.push_skipped(body, location, None);
                    } else if block.kind == BlockKind::Table {
                        builder.push_fragments(split_table(body, max), location, None);
                    } else {
                        builder.push_fragments(split_items(block, max), location, None);
                    }
                }
            }
        }

        let units = builder.finish();
        info!(
            "Extracted {} units from {} Markdown blocks ({} protected spans)",
            units.len(),
            self.blocks.len(),
            self.protected.spans.len()
        );
        Ok(units)
    }

    fn reinject(&mut self, units: &[TranslationUnit], mode: OutputMode) -> Result<usize, FormatError> {
        let results = reassemble(units);
        let mut rendered: Vec<String> = self.blocks.iter().map(|b| b.text.clone()).collect();
        let mut changed = false;

        for result in results.iter().filter(|r| !r.skipped) {
            let Location::Block { index } = result.location else {
                continue;
            };
            let Some(block) = self.blocks.get(index) else {
                continue;
            };
            let body = self.translated_body(block, result);
            if body == block.body() {
                continue;
            }
            let translated = format!("{}{}", block.prefix, body);
            rendered[index] = match mode {
                OutputMode::Only => translated,
                _ => format!("{}\n\n{}", block.text, translated),
            };
            changed = true;
        }

        self.output = changed.then(|| self.protected.restore(&rendered.join("\n")));
        Ok(translated_word_count(units))
    }

    fn to_bytes(&self) -> Result<Vec<u8>, FormatError> {
        Ok(match &self.output {
            Some(text) => text.clone().into_bytes(),
            None => self.source.clone(),
        })
    }
}
