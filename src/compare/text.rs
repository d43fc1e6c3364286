//! Token normalization, word splitting and word joining

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// A word found inside a text run.
///
/// `start..end` are char offsets into the run string, so the caller can map
/// the token back onto per-glyph geometry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunToken {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// Soft hyphen, zero-width and bidi format controls
#[must_use]
pub fn is_stripped(ch: char) -> bool {
    matches!(
        ch,
        '\u{00AD}' | '\u{200B}'..='\u{200F}' | '\u{202A}'..='\u{202E}' | '\u{2060}'..='\u{2064}' | '\u{FEFF}'
    )
}

/// Fold typographic variants onto their ASCII counterparts
#[must_use]
pub fn fold_char(ch: char) -> char {
    match ch {
        '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' => '"',
        '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' => '\'',
        '\u{2013}' | '\u{2014}' => '-',
        '\u{00A0}' => ' ',
        other => other,
    }
}

/// Normalize a free-form string: NFKC, strip invisible controls, fold
/// quotes and dashes, collapse whitespace.
#[must_use]
pub fn normalize_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_space = false;
    for ch in input.nfkc() {
        if is_stripped(ch) {
            continue;
        }
        let ch = fold_char(ch);
        if ch.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.push(ch);
    }
    out
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric()
}

/// Split a raw run into tokens.
///
/// A token is a maximal alphanumeric run or a single other visible
/// character. Stripped characters are skipped without ending a word and
/// combining marks extend the current word.
#[must_use]
pub fn tokenize_run(run: &str) -> Vec<RunToken> {
    let mut tokens = Vec::new();
    let mut word = String::new();
    let mut word_start = 0usize;
    let mut word_end = 0usize;

    let flush = |word: &mut String, start: usize, end: usize, tokens: &mut Vec<RunToken>| {
        if word.is_empty() {
            return;
        }
        let text: String = word.nfkc().collect();
        word.clear();
        if !text.trim().is_empty() {
            tokens.push(RunToken { text, start, end });
        }
    };

    for (idx, raw) in run.chars().enumerate() {
        if is_stripped(raw) {
            continue;
        }
        let ch = fold_char(raw);
        if ch.is_whitespace() {
            flush(&mut word, word_start, word_end, &mut tokens);
            continue;
        }
        if is_word_char(ch) || (is_combining_mark(ch) && !word.is_empty()) {
            if word.is_empty() {
                word_start = idx;
            }
            word.push(ch);
            word_end = idx + 1;
            continue;
        }
        flush(&mut word, word_start, word_end, &mut tokens);
        let single: String = std::iter::once(ch).nfkc().collect();
        if !single.trim().is_empty() {
            tokens.push(RunToken {
                text: single,
                start: idx,
                end: idx + 1,
            });
        }
    }
    flush(&mut word, word_start, word_end, &mut tokens);
    tokens
}

fn is_apostrophe(ch: char) -> bool {
    matches!(ch, '\'' | '\u{2019}')
}

fn no_space_before(word: &str) -> bool {
    word.chars().next().is_some_and(|c| {
        matches!(
            c,
            '.' | ',' | ';' | ':' | '!' | '?' | '%' | ')' | ']' | '}' | '\u{00BB}'
        ) || is_apostrophe(c)
    })
}

fn no_space_after(existing: &str) -> bool {
    existing
        .chars()
        .last()
        .is_some_and(|c| matches!(c, '(' | '[' | '{' | '\u{00AB}'))
}

fn is_possessive(existing: &str, word: &str) -> bool {
    existing.chars().last().is_some_and(is_apostrophe) && (word == "s" || word == "S")
}

/// Append `word` to `existing` using reading-order join rules
pub fn append_word(existing: &mut String, word: &str) {
    if word.is_empty() {
        return;
    }
    if existing.is_empty()
        || no_space_before(word)
        || no_space_after(existing)
        || is_possessive(existing, word)
    {
        existing.push_str(word);
    } else {
        existing.push(' ');
        existing.push_str(word);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(run: &str) -> Vec<String> {
        tokenize_run(run).into_iter().map(|t| t.text).collect()
    }

    #[test]
    fn splits_words_and_punctuation() {
        assert_eq!(texts("Hello, world!"), vec!["Hello", ",", "world", "!"]);
    }

    #[test]
    fn stripped_chars_do_not_break_words() {
        assert_eq!(texts("hy\u{00AD}phen zero\u{200B}width"), vec!["hyphen", "zerowidth"]);
    }

    #[test]
    fn folds_quotes_dashes_and_nbsp() {
        assert_eq!(
            texts("\u{201C}a\u{201D}\u{00A0}b\u{2014}c"),
            vec!["\"", "a", "\"", "b", "-", "c"]
        );
    }

    #[test]
    fn combining_marks_continue_word() {
        // e + combining acute composes under NFKC
        assert_eq!(texts("cafe\u{0301} ok"), vec!["caf\u{00E9}", "ok"]);
    }

    #[test]
    fn token_offsets_are_char_indices() {
        let tokens = tokenize_run("ab  cd");
        assert_eq!((tokens[0].start, tokens[0].end), (0, 2));
        assert_eq!((tokens[1].start, tokens[1].end), (4, 6));
    }

    #[test]
    fn ligatures_expand_under_nfkc() {
        assert_eq!(texts("\u{FB01}ne"), vec!["fine"]);
    }

    #[test]
    fn normalize_collapses_whitespace() {
        assert_eq!(normalize_text("  a \t\u{00A0} b\n"), "a b");
    }

    #[test]
    fn append_word_join_rules() {
        let mut s = String::new();
        for w in ["The", "dog", "'", "s", "bowl", ",", "(", "empty", ")", "."] {
            append_word(&mut s, w);
        }
        assert_eq!(s, "The dog's bowl, (empty).");
    }
}
