/*!
 * Tests for sentence aware chunking
 */

use doctrans::translation::chunker::{sentences, split};

const SAMPLES: [&str; 6] = [
    "",
    "Short.",
    "First sentence. Second sentence! Third one? Fourth; and the rest",
    "没有空格的中文句子。第二句话！第三句？最后一句",
    "   leading and trailing whitespace survives.   \n\n",
    "averyveryverylongwordwithoutanybreaksatallthatmustbecutsomewhere",
];

#[test]
fn test_split_withAnySizeAndSample_shouldJoinBackToInput() {
    for text in SAMPLES {
        for max_size in [1, 2, 3, 5, 8, 13, 21, 1000] {
            let chunks = split(text, max_size);
            assert_eq!(chunks.concat(), text, "max_size={} text={:?}", max_size, text);
        }
    }
}

#[test]
fn test_split_withSizeLimit_shouldKeepEveryChunkWithinLimit() {
    for text in SAMPLES {
        for max_size in [1, 4, 10, 25] {
            for chunk in split(text, max_size) {
                assert!(
                    chunk.chars().count() <= max_size,
                    "chunk {:?} exceeds {}",
                    chunk,
                    max_size
                );
            }
        }
    }
}

#[test]
fn test_split_withSentences_shouldCutAtSentenceEnds() {
    let chunks = split("One two. Three four. Five six.", 12);
    assert_eq!(chunks, vec!["One two. ", "Three four. ", "Five six."]);
}

#[test]
fn test_split_withFittingText_shouldReturnSingleChunk() {
    assert_eq!(split("fits", 10), vec!["fits"]);
    assert_eq!(split("", 10), vec![""]);
}

#[test]
fn test_sentences_withCjkTerminators_shouldKeepTerminatorAttached() {
    let parts = sentences("第一句。 第二句！");
    assert_eq!(parts, vec!["第一句。 ", "第二句！"]);

    assert_eq!(sentences("第一句。第二句"), vec!["第一句。", "第二句"]);
    assert_eq!(sentences("版本1.2发布了；好"), vec!["版本1.2发布了；", "好"]);
}

#[test]
fn test_split_withUnspacedChinese_shouldCutAtEachFullStop() {
    let chunks = split("第一句话在这里。第二句话也在这里。第三句话结束了。", 10);
    assert_eq!(chunks, vec!["第一句话在这里。", "第二句话也在这里。", "第三句话结束了。"]);
}
