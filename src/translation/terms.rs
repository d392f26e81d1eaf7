/*!
 * Glossary handling: parsing glossary content and injecting matched terms
 * into the provider instruction.
 */

use log::debug;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// Header placed above the matched term lines
pub const TERMS_HEADER: &str = "【术语翻译对照表如下】";

static MIXED_PARTS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-zA-Z]+|[\x{4e00}-\x{9fff}]+|[0-9]+").unwrap());

/// One glossary entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlossaryTerm {
    pub source: String,
    pub target: String,
}

impl GlossaryTerm {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// Parse stored glossary content.
///
/// Pairs are separated by `;`, else by newlines, else by `|`. Inside a pair the
/// first `,`, tab or `:` separates source from target.
pub fn parse_glossary(content: &str) -> Vec<GlossaryTerm> {
    let content = content.trim();
    if content.is_empty() {
        return Vec::new();
    }

    let pairs: Vec<&str> = if content.contains(';') {
        content.split(';').collect()
    } else if content.contains('\n') {
        content.lines().collect()
    } else {
        content.split('|').collect()
    };

    pairs
        .into_iter()
        .filter_map(|pair| {
            let pair = pair.trim();
            let split_at = pair.find([',', '\t', ':'])?;
            let separator_len = pair[split_at..].chars().next()?.len_utf8();
            let source = pair[..split_at].trim();
            let target = pair[split_at + separator_len..].trim();
            if source.is_empty() || target.is_empty() {
                return None;
            }
            Some(GlossaryTerm::new(source, target))
        })
        .collect()
}

/// Prefix `base_prompt` with the glossary pairs whose source term occurs in `source_text`.
///
/// Returns the base prompt unchanged when nothing matches.
pub fn build_instruction(base_prompt: &str, source_text: &str, glossary: &[GlossaryTerm]) -> String {
    let mut lines: Vec<String> = Vec::new();
    for term in glossary {
        if !is_term_matched(&term.source, source_text) {
            continue;
        }
        let line = format!("{} → {}", term.source.trim(), term.target.trim());
        if !lines.contains(&line) {
            debug!("Matched glossary term: {}", line);
            lines.push(line);
        }
    }

    if lines.is_empty() {
        return base_prompt.to_string();
    }
    format!("{}\n{}\n\n{}", TERMS_HEADER, lines.join("\n"), base_prompt)
}

/// Substitute `{target_lang}` in a prompt template
pub fn render_prompt(template: &str, target_language: &str) -> String {
    template.replace("{target_lang}", target_language)
}

/// Whether a glossary source term occurs in the text under any matching strategy
pub fn is_term_matched(term: &str, text: &str) -> bool {
    let term = term.trim();
    if term.is_empty() || text.is_empty() {
        return false;
    }
    word_boundary_match(term, text) || phrase_match(term, text) || mixed_script_match(term, text)
}

fn word_boundary_match(term: &str, text: &str) -> bool {
    let pattern = format!(r"\b{}\b", regex::escape(term));
    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .map(|re| re.is_match(text))
        .unwrap_or(false)
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || is_punctuation(c)
}

fn is_punctuation(c: char) -> bool {
    static PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\p{P}$").unwrap());
    let mut buf = [0u8; 4];
    PUNCT.is_match(c.encode_utf8(&mut buf))
}

fn phrase_match(term: &str, text: &str) -> bool {
    let Ok(re) = RegexBuilder::new(&regex::escape(term))
        .case_insensitive(true)
        .build()
    else {
        return false;
    };

    let mut pos = 0;
    while pos <= text.len() {
        let Some(found) = re.find_at(text, pos) else {
            return false;
        };
        let before_ok = text[..found.start()]
            .chars()
            .next_back()
            .map(is_delimiter)
            .unwrap_or(true);
        let after_ok = text[found.end()..]
            .chars()
            .next()
            .map(is_delimiter)
            .unwrap_or(true);
        if before_ok && after_ok {
            return true;
        }
        let step = text[found.start()..]
            .chars()
            .next()
            .map(char::len_utf8)
            .unwrap_or(1);
        pos = found.start() + step;
    }
    false
}

fn mixed_script_match(term: &str, text: &str) -> bool {
    let parts: Vec<String> = MIXED_PARTS
        .find_iter(term)
        .map(|m| m.as_str().to_lowercase())
        .collect();
    if parts.len() <= 1 {
        return false;
    }

    let haystack = text.to_lowercase();
    let mut cursor = 0usize;
    for part in &parts {
        match haystack[cursor..].find(part.as_str()) {
            Some(offset) => cursor += offset + part.len(),
            None => return false,
        }
    }
    true
}
