use super::clean::clean_text;

const SENTENCE_END: &[char] = &['.', '!', '?', '؟', '…', '。'];

/// A packable piece of a paragraph and the separator placed before it.
struct Unit<'a> {
    text: &'a str,
    starts_line: bool,
}

/// Split `text` into translation requests of at most `max_chars` characters.
///
/// Text is cleaned first. Lines are kept whole when they fit, otherwise split
/// at sentence ends, then at spaces. Words are never cut, so a single word
/// longer than `max_chars` becomes its own oversized chunk. Blank lines always
/// end a chunk.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let cleaned = clean_text(text);
    if cleaned.is_empty() {
        return Vec::new();
    }
    if char_len(&cleaned) <= max_chars {
        return vec![cleaned];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();

    for line in cleaned.split('\n') {
        if line.is_empty() {
            flush(&mut chunks, &mut current);
            continue;
        }

        for unit in line_units(line, max_chars) {
            let sep = if unit.starts_line { "\n" } else { " " };
            if current.is_empty() {
                current.push_str(unit.text);
            } else if char_len(&current) + 1 + char_len(unit.text) <= max_chars {
                current.push_str(sep);
                current.push_str(unit.text);
            } else {
                flush(&mut chunks, &mut current);
                current.push_str(unit.text);
            }
        }
    }
    flush(&mut chunks, &mut current);

    chunks
}

/// Reassemble translated chunks in order.
pub fn join_chunks<S: AsRef<str>>(chunks: &[S]) -> String {
    chunks
        .iter()
        .map(AsRef::as_ref)
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn line_units(line: &str, max_chars: usize) -> Vec<Unit<'_>> {
    if char_len(line) <= max_chars {
        return vec![Unit {
            text: line,
            starts_line: true,
        }];
    }

    let mut units = Vec::new();
    for sentence in split_sentences(line) {
        if char_len(sentence) <= max_chars {
            units.push(Unit {
                text: sentence,
                starts_line: units.is_empty(),
            });
        } else {
            for word in sentence.split_whitespace() {
                units.push(Unit {
                    text: word,
                    starts_line: units.is_empty(),
                });
            }
        }
    }
    units
}

/// Sentence pieces of a single line, trimmed, terminators kept.
fn split_sentences(line: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut chars = line.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        let at_break = SENTENCE_END.contains(&c)
            && chars.peek().is_some_and(|&(_, next)| next.is_whitespace());
        if at_break {
            let end = i + c.len_utf8();
            let piece = line[start..end].trim();
            if !piece.is_empty() {
                out.push(piece);
            }
            start = end;
        }
    }

    let tail = line[start..].trim();
    if !tail.is_empty() {
        out.push(tail);
    }
    out
}

fn flush(chunks: &mut Vec<String>, current: &mut String) {
    if !current.is_empty() {
        chunks.push(std::mem::take(current));
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_one_chunk() {
        assert_eq!(chunk_text("Hello world.", 450), vec!["Hello world."]);
        assert!(chunk_text("   ", 450).is_empty());
    }

    #[test]
    fn test_chunks_respect_limit() {
        let text = "First sentence here. Second sentence follows. Third one ends it.";
        let chunks = chunk_text(text, 25);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 25, "{chunk:?}");
        }
        assert_eq!(chunks[0], "First sentence here.");
    }

    #[test]
    fn test_words_are_never_split() {
        let text = "alpha beta gamma delta epsilon";
        let chunks = chunk_text(text, 11);
        let rejoined: Vec<&str> = chunks.iter().flat_map(|c| c.split_whitespace()).collect();
        assert_eq!(rejoined, text.split_whitespace().collect::<Vec<_>>());
    }

    #[test]
    fn test_oversized_word_is_own_chunk() {
        let chunks = chunk_text("a supercalifragilistic b", 6);
        assert!(chunks.contains(&"supercalifragilistic".to_string()));
    }

    #[test]
    fn test_lines_pack_with_newline_and_blank_lines_split() {
        let text = "one two\nthree\n\nfour five six seven eight nine ten";
        let chunks = chunk_text(text, 20);
        assert_eq!(chunks[0], "one two\nthree");
        assert!(chunks[1].starts_with("four"));
    }

    #[test]
    fn test_join_chunks() {
        assert_eq!(join_chunks(&["a", "", "b"]), "a\nb");
        assert_eq!(join_chunks::<&str>(&[]), "");
    }

    #[test]
    fn test_split_sentences_keeps_terminators() {
        assert_eq!(
            split_sentences("Is it? Yes. 3.14 stays"),
            vec!["Is it?", "Yes.", "3.14 stays"]
        );
        assert_eq!(split_sentences("چطوری؟ خوبم"), vec!["چطوری؟", "خوبم"]);
    }
}
