//! Text normalization and sentence splitting shared by the text strategies.

use std::ops::Range;

/// Normalize extracted text before segmentation: CRLF/CR become LF, runs of
/// horizontal whitespace become one space, spaces around line breaks are
/// dropped, three or more line breaks collapse to a blank line, and the
/// result is trimmed. All text positions refer to the normalized text.
pub fn normalize(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut out = String::with_capacity(unified.len());
    let mut pending_space = false;
    let mut newlines = 0usize;

    for ch in unified.chars() {
        if ch == '\n' {
            pending_space = false;
            newlines += 1;
            continue;
        }
        if ch.is_whitespace() {
            pending_space = true;
            continue;
        }
        if newlines > 0 {
            if !out.is_empty() {
                out.push_str(if newlines >= 2 { "\n\n" } else { "\n" });
            }
            newlines = 0;
        } else if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        out.push(ch);
    }
    out
}

/// Byte ranges of the sentences in `text`, trimmed and non-empty. A sentence
/// ends at a run of `.`, `!` or `?` followed by whitespace, or at a blank
/// line.
pub fn sentence_spans(text: &str) -> Vec<Range<usize>> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let boundary = match bytes[i] {
            b'.' | b'!' | b'?' => {
                let mut j = i + 1;
                while j < bytes.len() && matches!(bytes[j], b'.' | b'!' | b'?') {
                    j += 1;
                }
                if j < bytes.len() && !bytes[j].is_ascii_whitespace() {
                    // "3.14", "e.g.x": not a boundary
                    i = j;
                    continue;
                }
                Some(j)
            }
            b'\n' if bytes.get(i + 1) == Some(&b'\n') => Some(i),
            _ => None,
        };

        match boundary {
            Some(end) => {
                push_trimmed(text, start..end, &mut spans);
                let mut j = end;
                while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                    j += 1;
                }
                start = j;
                i = j;
            }
            None => i += 1,
        }
    }
    push_trimmed(text, start..bytes.len(), &mut spans);
    spans
}

fn push_trimmed(text: &str, range: Range<usize>, spans: &mut Vec<Range<usize>>) {
    if range.start >= range.end {
        return;
    }
    let slice = &text[range.clone()];
    let trimmed = slice.trim();
    if trimmed.is_empty() {
        return;
    }
    let lead = slice.len() - slice.trim_start().len();
    let begin = range.start + lead;
    spans.push(begin..begin + trimmed.len());
}

/// Converts byte offsets into char offsets, cheaply when queried in
/// ascending order.
pub struct CharOffsets<'a> {
    text: &'a str,
    byte: usize,
    chars: usize,
}

impl<'a> CharOffsets<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            byte: 0,
            chars: 0,
        }
    }

    pub fn char_offset(&mut self, byte: usize) -> usize {
        if byte < self.byte {
            self.byte = 0;
            self.chars = 0;
        }
        self.chars += self.text[self.byte..byte].chars().count();
        self.byte = byte;
        self.chars
    }
}

/// Byte offset of the char at `char_idx` (or `text.len()` past the end).
pub fn byte_offset(text: &str, char_idx: usize) -> usize {
    text.char_indices()
        .nth(char_idx)
        .map(|(b, _)| b)
        .unwrap_or(text.len())
}
