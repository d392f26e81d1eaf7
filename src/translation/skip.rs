/*!
 * Skip gate: decides whether an extracted fragment needs translation.
 *
 * The gate leans toward translating. Only strings that are clearly not
 * language (numbers, dates, codes, addresses, punctuation) are rejected.
 */

use once_cell::sync::Lazy;
use regex::Regex;

/// Full-width and CJK punctuation treated like ASCII punctuation
const CJK_PUNCTUATION: &str = "：【】，。、？」「；！@￥（）“”‘’《》—…·";

static NUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?%?$").unwrap());

static CURRENCY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[$￥€£¥]\s*[+-]?(\d{1,3}(,\d{3})*(\.\d+)?|\d+(\.\d+)?|\.\d+)$").unwrap()
});

static GROUPED_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?\d{1,3}(,\d{3})+(\.\d+)?%?$").unwrap());

static DATES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"^\d{4}[-/]\d{1,2}[-/]\d{1,2}$",
        r"^\d{1,2}[-/]\d{1,2}[-/]\d{4}$",
        r"^\d{1,2}\.\d{1,2}\.\d{4}$",
        r"^[A-Za-z]{3,9}\.?\s+\d{1,2},?\s+\d{4}$",
        r"^\d{1,2}\s+[A-Za-z]{3,9}\.?,?\s+\d{4}$",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,2}:\d{2}(:\d{2})?(\s*[AaPp][Mm])?$").unwrap());

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{2,4}\d{1,6}$").unwrap());

static EMAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\w.+-]+@[\w.-]+\.\w+$").unwrap());

static URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?i)(https?|ftp)://\S+$").unwrap());

static WINDOWS_PATH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z]:\\").unwrap());

static UNIX_PATH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^/[^\s/]+(/[^\s/]*)+$").unwrap());

static PHONE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+?[1-9][\d\-\s()]{7,15}$").unwrap());

static PAGE_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(第?\s*\d+\s*页?|page\s*\d+(\s*of\s*\d+)?|\d+\s*/\s*\d+)$").unwrap()
});

const BOOLEANS: [&str; 6] = ["true", "false", "yes", "no", "y", "n"];

/// Whether `text` contains language that a provider should translate
pub fn should_translate(text: &str) -> bool {
    let text = text.trim();
    if text.is_empty() {
        return false;
    }
    if is_punctuation_or_digits(text) {
        return false;
    }
    if NUMERIC.is_match(text) || GROUPED_NUMBER.is_match(text) || CURRENCY.is_match(text) {
        return false;
    }
    if DATES.iter().any(|re| re.is_match(text)) || TIME.is_match(text) {
        return false;
    }
    if BOOLEANS.contains(&text.to_lowercase().as_str()) {
        return false;
    }
    if IDENTIFIER.is_match(text) || EMAIL.is_match(text) || URL.is_match(text) {
        return false;
    }
    if WINDOWS_PATH.is_match(text) || UNIX_PATH.is_match(text) {
        return false;
    }
    if PHONE.is_match(text) {
        return false;
    }
    true
}

/// Page-number lines of paged documents ("第 3 页", "Page 2", "3 / 10")
pub fn is_page_number(text: &str) -> bool {
    PAGE_NUMBER.is_match(text.trim())
}

fn is_punctuation_or_digits(text: &str) -> bool {
    text.chars().all(|c| {
        c.is_ascii_punctuation()
            || c.is_ascii_digit()
            || c.is_whitespace()
            || CJK_PUNCTUATION.contains(c)
    })
}
