//! Small text helpers shared by the chunker and the offline providers.

/// Lowercased alphanumeric tokens, in order.
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Split text into sentences on `.`, `!`, `?` followed by whitespace or the
/// end of input. The terminator stays with its sentence. Whitespace-only
/// fragments are dropped.
pub(crate) fn split_sentences(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut sentences = Vec::new();
    let mut start = 0;

    let mut i = 0;
    while i < bytes.len() {
        if matches!(bytes[i], b'.' | b'!' | b'?') {
            let at_end = i + 1 >= bytes.len();
            if at_end || bytes[i + 1].is_ascii_whitespace() {
                let sentence = text[start..=i].trim();
                if !sentence.is_empty() {
                    sentences.push(sentence);
                }
                start = i + 1;
            }
        }
        i += 1;
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

/// Whether a token ends a sentence: its last alphanumeric-stripped suffix is a
/// terminator, optionally followed by closing quotes or brackets.
pub(crate) fn ends_sentence(token: &str) -> bool {
    let trimmed = token.trim_end_matches(['"', '\'', ')', ']']);
    trimmed.ends_with(['.', '!', '?'])
}
