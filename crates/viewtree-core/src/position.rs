//! Conversions between LSP positions, byte offsets and ranges.
//!
//! Lines are separated by `\n`. Columns are UTF-16 code units, offsets are
//! byte offsets into the UTF-8 text. Out-of-range columns clamp to the end of
//! their line; out-of-range lines yield `None`.

use lsp_types::{Position, Range};

/// Prefix marking a component name
pub const SIGIL: char = '$';

/// Characters that make up a word under the cursor
pub fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | SIGIL | '?' | '*')
}

/// Number of UTF-16 code units in `s`
pub fn utf16_len(s: &str) -> u32 {
    s.chars().map(|c| c.len_utf16() as u32).sum()
}

/// Byte offset within `line` of UTF-16 column `column`, clamped to the line end.
pub fn utf16_to_byte(line: &str, column: u32) -> usize {
    let mut units = 0u32;
    for (byte, c) in line.char_indices() {
        if units >= column {
            return byte;
        }
        units += c.len_utf16() as u32;
    }
    line.len()
}

/// UTF-16 column of byte offset `byte` within `line`.
pub fn byte_to_utf16(line: &str, byte: usize) -> u32 {
    let end = byte.min(line.len());
    line.char_indices()
        .take_while(|(i, _)| *i < end)
        .map(|(_, c)| c.len_utf16() as u32)
        .sum()
}

/// Line start offsets of a text snapshot
#[derive(Debug, Clone)]
pub struct LineIndex {
    starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        Self {
            starts,
            len: text.len(),
        }
    }

    pub fn line_count(&self) -> usize {
        self.starts.len()
    }

    /// Content of `line` without its newline.
    pub fn line<'a>(&self, text: &'a str, line: usize) -> Option<&'a str> {
        let start = *self.starts.get(line)?;
        let end = match self.starts.get(line + 1) {
            Some(next) => next - 1,
            None => self.len,
        };
        text.get(start..end)
    }

    /// Byte offset of `position`, or `None` when the line does not exist.
    pub fn offset(&self, text: &str, position: Position) -> Option<usize> {
        let line = position.line as usize;
        let start = *self.starts.get(line)?;
        let content = self.line(text, line)?;
        Some(start + utf16_to_byte(content, position.character))
    }

    /// Position of byte offset `offset` (clamped to the text length).
    pub fn position(&self, text: &str, offset: usize) -> Position {
        let offset = offset.min(self.len);
        let line = match self.starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        let start = self.starts[line];
        let column = text
            .get(start..offset)
            .map(utf16_len)
            .unwrap_or_default();
        Position::new(line as u32, column)
    }
}

/// Byte offset of `position` in `text`.
pub fn position_to_offset(text: &str, position: Position) -> Option<usize> {
    LineIndex::new(text).offset(text, position)
}

/// Replace `range` with `new_text` and return the resulting text.
///
/// Positions past the last line resolve to the end of the text, so an
/// out-of-range edit degrades to an append.
pub fn apply_edit(text: &str, range: Range, new_text: &str) -> String {
    let index = LineIndex::new(text);
    let start = index.offset(text, range.start).unwrap_or(text.len());
    let end = index.offset(text, range.end).unwrap_or(text.len());
    let (start, end) = if start <= end { (start, end) } else { (end, start) };

    let mut result = String::with_capacity(text.len() - (end - start) + new_text.len());
    result.push_str(&text[..start]);
    result.push_str(new_text);
    result.push_str(&text[end..]);
    result
}

/// Range of the word touching `position`, if any.
///
/// The cursor may sit anywhere inside the word or directly after its last
/// character.
pub fn word_range_at(text: &str, position: Position) -> Option<Range> {
    let line = text.split('\n').nth(position.line as usize)?;
    let chars: Vec<char> = line.chars().collect();

    let mut cursor = 0usize;
    let mut units = 0u32;
    while cursor < chars.len() && units < position.character {
        units += chars[cursor].len_utf16() as u32;
        cursor += 1;
    }
    if units < position.character {
        return None;
    }

    let mut start = cursor;
    while start > 0 && is_word_char(chars[start - 1]) {
        start -= 1;
    }
    let mut end = cursor;
    while end < chars.len() && is_word_char(chars[end]) {
        end += 1;
    }
    if start == end {
        return None;
    }

    let column = |index: usize| -> u32 { chars[..index].iter().map(|c| c.len_utf16() as u32).sum() };
    Some(Range::new(
        Position::new(position.line, column(start)),
        Position::new(position.line, column(end)),
    ))
}

/// Text covered by a single-line `range`.
pub fn text_in_range(text: &str, range: Range) -> Option<&str> {
    if range.start.line != range.end.line {
        return None;
    }
    let line = text.split('\n').nth(range.start.line as usize)?;
    let start = utf16_to_byte(line, range.start.character);
    let end = utf16_to_byte(line, range.end.character);
    if start >= end {
        return None;
    }
    line.get(start..end)
}

/// Whether `position` lies within `range`, both ends inclusive.
pub fn position_in_range(position: Position, range: Range) -> bool {
    if position.line < range.start.line || position.line > range.end.line {
        return false;
    }
    if position.line == range.start.line && position.character < range.start.character {
        return false;
    }
    if position.line == range.end.line && position.character > range.end.character {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(sl: u32, sc: u32, el: u32, ec: u32) -> Range {
        Range::new(Position::new(sl, sc), Position::new(el, ec))
    }

    #[test]
    fn test_position_to_offset() {
        let text = "$component\n\tproperty value\n\tsub /";
        assert_eq!(position_to_offset(text, Position::new(0, 0)), Some(0));
        assert_eq!(position_to_offset(text, Position::new(0, 5)), Some(5));
        assert_eq!(position_to_offset(text, Position::new(1, 0)), Some(11));
        assert_eq!(position_to_offset(text, Position::new(1, 1)), Some(12));
        assert_eq!(position_to_offset(text, Position::new(2, 0)), Some(27));
        assert_eq!(position_to_offset(text, Position::new(5, 0)), None);
    }

    #[test]
    fn test_offset_clamps_to_line_end() {
        let text = "ab\ncd";
        assert_eq!(position_to_offset(text, Position::new(0, 40)), Some(2));
    }

    #[test]
    fn test_utf16_columns() {
        // "é" is one UTF-16 unit but two bytes, "😀" is two units and four bytes
        let line = "é😀x";
        assert_eq!(utf16_to_byte(line, 1), 2);
        assert_eq!(utf16_to_byte(line, 3), 6);
        assert_eq!(byte_to_utf16(line, 6), 3);
        assert_eq!(utf16_len(line), 4);
    }

    #[test]
    fn test_line_index_position() {
        let text = "$a\n\tb c\n";
        let index = LineIndex::new(text);
        assert_eq!(index.line_count(), 3);
        assert_eq!(index.line(text, 1), Some("\tb c"));
        assert_eq!(index.line(text, 2), Some(""));
        assert_eq!(index.position(text, 5), Position::new(1, 2));
        assert_eq!(index.position(text, 0), Position::new(0, 0));
    }

    #[test]
    fn test_apply_edit() {
        let text = "$component\n\tproperty value\n\tsub /";
        let result = apply_edit(text, range(1, 1, 1, 9), "new_prop");
        assert_eq!(result, "$component\n\tnew_prop value\n\tsub /");
    }

    #[test]
    fn test_apply_edit_insert_and_delete() {
        assert_eq!(apply_edit("ab", range(0, 1, 0, 1), "X"), "aXb");
        assert_eq!(apply_edit("a\nb\nc", range(0, 1, 2, 0), ""), "ac");
        assert_eq!(apply_edit("ab", range(4, 0, 4, 0), "!"), "ab!");
    }

    #[test]
    fn test_word_range() {
        let text = "$component_name";
        assert_eq!(word_range_at(text, Position::new(0, 5)), Some(range(0, 0, 0, 15)));
    }

    #[test]
    fn test_word_range_edges() {
        let text = "\tclick? <=> submit? null";
        assert_eq!(word_range_at(text, Position::new(0, 7)), Some(range(0, 1, 0, 7)));
        assert_eq!(word_range_at(text, Position::new(0, 9)), None);
        assert_eq!(word_range_at(text, Position::new(0, 100)), None);
        assert_eq!(word_range_at(text, Position::new(3, 0)), None);
    }

    #[test]
    fn test_text_in_range() {
        let text = "$my_app $mol_view\n\ttitle @ \\Hi";
        assert_eq!(text_in_range(text, range(0, 8, 0, 17)), Some("$mol_view"));
        assert_eq!(text_in_range(text, range(1, 1, 1, 6)), Some("title"));
        assert_eq!(text_in_range(text, range(0, 0, 1, 2)), None);
        assert_eq!(text_in_range(text, range(0, 30, 0, 40)), None);
    }

    #[test]
    fn test_position_in_range() {
        let r = range(1, 2, 3, 4);
        assert!(position_in_range(Position::new(1, 2), r));
        assert!(position_in_range(Position::new(2, 0), r));
        assert!(position_in_range(Position::new(3, 4), r));
        assert!(!position_in_range(Position::new(1, 1), r));
        assert!(!position_in_range(Position::new(3, 5), r));
        assert!(!position_in_range(Position::new(0, 9), r));
    }
}
