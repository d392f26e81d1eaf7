/*!
 * Sentence aware text chunking.
 *
 * Sizes are counted in characters. The output always concatenates back to the
 * exact input.
 */

/// Default chunk size for prose
pub const MAX_CHUNK_SIZE: usize = 2000;

/// ASCII terminators, which only close a sentence when followed by whitespace
const ASCII_TERMINATORS: [char; 4] = ['.', '!', '?', ';'];

/// Full-width terminators, which always close a sentence
const FULL_WIDTH_TERMINATORS: [char; 4] = ['。', '！', '？', '；'];

/// Split `text` into ordered chunks of at most `max_size` characters.
///
/// Sentences are packed greedily; a sentence longer than `max_size` is cut on
/// character boundaries. Empty input comes back as a single empty chunk.
pub fn split(text: &str, max_size: usize) -> Vec<String> {
    let max_size = max_size.max(1);
    if text.is_empty() {
        return vec![text.to_string()];
    }
    if text.chars().count() <= max_size {
        return vec![text.to_string()];
    }

    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for sentence in sentences(text) {
        let sentence_len = sentence.chars().count();

        if current_len + sentence_len <= max_size {
            current.push_str(sentence);
            current_len += sentence_len;
            continue;
        }

        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if sentence_len <= max_size {
            current.push_str(sentence);
            current_len = sentence_len;
        } else {
            let mut pieces = hard_split(sentence, max_size);
            // keep the tail open so following sentences can join it
            if let Some(last) = pieces.pop() {
                chunks.extend(pieces);
                current_len = last.chars().count();
                current = last;
            }
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Sentences with their terminator and trailing whitespace attached
pub fn sentences(text: &str) -> Vec<&str> {
    let mut result = Vec::new();
    let mut start = 0usize;
    let mut iter = text.char_indices().peekable();

    while let Some((idx, ch)) = iter.next() {
        let Some(&(_, next)) = iter.peek() else {
            continue;
        };
        let closes = FULL_WIDTH_TERMINATORS.contains(&ch)
            || (ASCII_TERMINATORS.contains(&ch) && next.is_whitespace());
        if !closes {
            continue;
        }
        let mut end = idx + ch.len_utf8();
        while let Some(&(ws_idx, ws)) = iter.peek() {
            if !ws.is_whitespace() {
                break;
            }
            end = ws_idx + ws.len_utf8();
            iter.next();
        }
        result.push(&text[start..end]);
        start = end;
    }

    if start < text.len() {
        result.push(&text[start..]);
    }
    result
}

fn hard_split(text: &str, max_size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_size)
        .map(|piece| piece.iter().collect())
        .collect()
}
