/// Sentence-terminal punctuation recognized by the segmenter (full-width and
/// half-width).
const SENTENCE_ENDERS: [char; 6] = ['。', '！', '？', '.', '!', '?'];

/// Normalized terminator re-appended to each accumulated sentence.
const TERMINATOR: char = '。';

/// Split a paragraph into caption-sized chunks on sentence boundaries.
///
/// Sentences are packed into the current segment while the accumulated
/// length stays within `max_chars` (counted in `char`s, not bytes). An
/// overflowing sentence starts the next segment. A single sentence longer
/// than `max_chars` is kept whole; sentences are never split internally.
pub fn segment_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for sentence in text.split(SENTENCE_ENDERS) {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }

        let sentence_len = sentence.chars().count();
        if current_len + sentence_len > max_chars && !current.is_empty() {
            segments.push(std::mem::take(&mut current));
            current_len = 0;
        }

        current.push_str(sentence);
        current.push(TERMINATOR);
        current_len += sentence_len + 1;
    }

    if !current.is_empty() {
        segments.push(current);
    }

    segments
}
