/*!
 * Post-processing and validation of provider answers.
 */

use once_cell::sync::Lazy;
use regex::Regex;

static THINK_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<think>.*?</think>").unwrap());

/// Answers that start with one of these are refusals, not translations
pub const REFUSAL_PREFIXES: [&str; 15] = [
    "Sorry, I cannot",
    "I am sorry,",
    "I'm sorry,",
    "Sorry, I can't",
    "Sorry, I need more",
    "抱歉，无法",
    "错误：提供的文本",
    "无法翻译",
    "抱歉，我无法",
    "对不起，我无法",
    "ご指示の内容は",
    "申し訳ございません",
    "Простите，",
    "Извините,",
    "Lo siento,",
];

/// Remove reasoning blocks some chat models emit before the answer
pub fn strip_think_tags(text: &str) -> String {
    THINK_TAGS.replace_all(text, "").trim().to_string()
}

/// Whether an answer can be used as a translation
pub fn is_valid_translation(text: &str) -> bool {
    let text = text.trim();
    if text.is_empty() {
        return false;
    }
    !REFUSAL_PREFIXES.iter().any(|prefix| text.starts_with(prefix))
}
