//! Short message previews for log lines

use std::collections::VecDeque;

/// Marker appended to a cut preview
pub const PLACEHOLDER: &str = " [...]";

/// Characters kept when the text is one token too long to cut at a word
const FALLBACK_CHARS: usize = 20;

/// Collapse whitespace and cut to fit `width` characters
///
/// Lines break at spaces and after hyphens inside words ("well-known"
/// may end a line as "well-"). When the collapsed text does not fit, the
/// longest run of leading chunks that still leaves room for `placeholder`
/// is kept. If not even the first chunk fits, only the placeholder
/// (without leading whitespace) is returned.
pub fn shorten(text: &str, width: usize, placeholder: &str) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    let collapsed = words.join(" ");
    if collapsed.chars().count() <= width {
        return collapsed;
    }

    let mut chunks: VecDeque<String> = VecDeque::new();
    for (i, word) in words.iter().enumerate() {
        if i > 0 {
            chunks.push_back(" ".to_string());
        }
        chunks.extend(split_hyphenated(word));
    }

    let mut line: Vec<String> = Vec::new();
    let mut line_len = 0;

    while let Some(chunk) = chunks.front() {
        let len = chunk.chars().count();
        if line_len + len > width {
            break;
        }
        line_len += len;
        line.extend(chunks.pop_front());
    }

    // A chunk wider than the whole line is split to fill what is left
    if let Some(chunk) = chunks.front() {
        if chunk.chars().count() > width {
            let piece = long_word_head(chunk, width - line_len);
            if !piece.is_empty() {
                line_len += piece.chars().count();
                line.push(piece);
            }
        }
    }

    if line.last().is_some_and(|c| c.trim().is_empty()) {
        line.pop();
        line_len -= 1;
    }

    let placeholder_len = placeholder.chars().count();
    while let Some(last) = line.last() {
        let last_len = last.chars().count();
        if !last.trim().is_empty() && line_len + placeholder_len <= width {
            return line.concat() + placeholder;
        }
        line_len -= last_len;
        line.pop();
    }

    placeholder.trim_start().to_string()
}

/// Split a word after hyphens that sit between letters
///
/// A hyphen is a break point when preceded by two letters (or a
/// letter-hyphen-letter run) and followed by a letter and then another
/// letter or a hyphenated letter, so "well-known" breaks but "x-1" and
/// "-v" do not.
fn split_hyphenated(word: &str) -> Vec<String> {
    let chars: Vec<char> = word.chars().collect();
    let letter = |i: usize| chars.get(i).is_some_and(|c| is_letter(*c));
    let hyphen = |i: usize| chars.get(i) == Some(&'-');

    let mut chunks = Vec::new();
    let mut start = 0;

    for i in 2..chars.len() {
        if chars[i] != '-' {
            continue;
        }
        let before = letter(i - 1) && (letter(i - 2) || (hyphen(i - 2) && i >= 3 && letter(i - 3)));
        let after = letter(i + 1) && (letter(i + 2) || (hyphen(i + 2) && letter(i + 3)));
        if before && after {
            chunks.push(chars[start..=i].iter().collect());
            start = i + 1;
        }
    }

    chunks.push(chars[start..].iter().collect());
    chunks
}

/// Word characters that are not digits
fn is_letter(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

/// Leading part of an overlong chunk, preferably ending on a hyphen
fn long_word_head(chunk: &str, space_left: usize) -> String {
    let chars: Vec<char> = chunk.chars().collect();
    let mut end = space_left.min(chars.len());

    if let Some(hyphen) = chars[..end].iter().rposition(|&c| c == '-') {
        if hyphen > 0 && chars[..hyphen].iter().any(|&c| c != '-') {
            end = hyphen + 1;
        }
    }

    chars[..end].iter().collect()
}

/// Preview of a message text at most about `width` characters long
///
/// Texts that are a single very long token would shorten to the bare
/// marker; those keep their first characters instead.
pub fn preview(text: &str, width: usize) -> String {
    let marker = PLACEHOLDER.trim_start();
    let short = shorten(text, width, PLACEHOLDER);

    if short == marker {
        let head: String = text.chars().take(FALLBACK_CHARS).collect();
        format!("{}{}", head, marker)
    } else {
        short
    }
}
