/*!
 * Tests for glossary parsing and term injection
 */

use doctrans::translation::GlossaryTerm;
use doctrans::translation::terms::{
    TERMS_HEADER, build_instruction, is_term_matched, parse_glossary, render_prompt,
};

#[test]
fn test_buildInstruction_withMatchingTerm_shouldListPair() {
    let glossary = vec![GlossaryTerm::new("API", "接口")];
    let instruction = build_instruction("Translate into {target_lang}:", "Call the API now", &glossary);
    assert!(instruction.starts_with(TERMS_HEADER));
    assert!(instruction.lines().any(|line| line == "API → 接口"));
    assert!(instruction.ends_with("Translate into {target_lang}:"));
}

#[test]
fn test_buildInstruction_withWordInsideLongerWord_shouldNotMatch() {
    let glossary = vec![GlossaryTerm::new("API", "接口")];
    let instruction = build_instruction("Translate:", "apiary", &glossary);
    assert_eq!(instruction, "Translate:");
    assert!(!is_term_matched("API", "apiary"));
}

#[test]
fn test_buildInstruction_withDuplicateTerms_shouldListOnce() {
    let glossary = vec![
        GlossaryTerm::new("cloud", "云"),
        GlossaryTerm::new("cloud", "云"),
        GlossaryTerm::new("edge", "边缘"),
    ];
    let instruction = build_instruction("P", "Cloud storage", &glossary);
    assert_eq!(instruction.matches("cloud → 云").count(), 1);
    assert!(!instruction.contains("edge"));
}

#[test]
fn test_parseGlossary_withEachSeparator_shouldReadPairs() {
    let expected = vec![GlossaryTerm::new("API", "接口"), GlossaryTerm::new("server", "服务器")];
    assert_eq!(parse_glossary("API,接口;server,服务器"), expected);
    assert_eq!(parse_glossary("API\t接口\nserver\t服务器\n"), expected);
    assert_eq!(parse_glossary("API:接口|server:服务器"), expected);
    assert!(parse_glossary("   ").is_empty());
    assert!(parse_glossary("no separator here").is_empty());
}

#[test]
fn test_renderPrompt_shouldSubstituteTargetLanguage() {
    assert_eq!(render_prompt("翻译成{target_lang}：", "English"), "翻译成English：");
}
