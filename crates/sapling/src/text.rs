//! A rope-backed document that describes its own edits.
//!
//! Editors hold a [`TextBuffer`], apply replacements to it and hand the
//! resulting [`InputEdit`]s to [`Tree::edit`] or [`Parser::reparse`].

use crate::edit::InputEdit;
use crate::point::Point;
use crate::{Parser, Tree};
use ropey::Rope;
use std::fmt;
use std::ops::Range;

/// A replacement the buffer cannot apply.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TextError {
    /// The range runs backwards or past the end of the text.
    #[error("byte range {start}..{end} is invalid for a text of {len} bytes")]
    OutOfBounds {
        /// Range start.
        start: usize,
        /// Range end.
        end: usize,
        /// Text length in bytes.
        len: usize,
    },
    /// A range boundary splits a UTF-8 character.
    #[error("byte {0} is not on a character boundary")]
    NotCharBoundary(usize),
}

/// Editable UTF-8 text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextBuffer {
    rope: Rope,
}

impl TextBuffer {
    /// An empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Length in bytes.
    #[must_use]
    pub fn len_bytes(&self) -> usize {
        self.rope.len_bytes()
    }

    /// Whether the buffer holds no text.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rope.len_bytes() == 0
    }

    /// Number of lines; a trailing newline starts an empty last line.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.rope.len_lines()
    }

    /// Row/column of a byte offset, or `None` past the end.
    #[must_use]
    pub fn point_for_byte(&self, byte: usize) -> Option<Point> {
        if byte > self.rope.len_bytes() {
            return None;
        }
        let row = self.rope.byte_to_line(byte);
        Some(Point::new(row, byte - self.rope.line_to_byte(row)))
    }

    /// Text of one line, including its line break.
    #[must_use]
    pub fn line(&self, row: usize) -> Option<String> {
        (row < self.rope.len_lines()).then(|| self.rope.line(row).to_string())
    }

    /// Replaces the bytes in `range` with `text` and describes the change.
    ///
    /// # Errors
    ///
    /// Returns [`TextError`] if the range is out of bounds or splits a
    /// character. The buffer is unchanged in that case.
    pub fn replace(&mut self, range: Range<usize>, text: &str) -> Result<InputEdit, TextError> {
        let len = self.rope.len_bytes();
        if range.start > range.end || range.end > len {
            return Err(TextError::OutOfBounds {
                start: range.start,
                end: range.end,
                len,
            });
        }
        let start_char = self.char_index(range.start)?;
        let end_char = self.char_index(range.end)?;
        let start_position = self.point_for_byte(range.start).unwrap_or_default();
        let old_end_position = self.point_for_byte(range.end).unwrap_or_default();

        self.rope.remove(start_char..end_char);
        self.rope.insert(start_char, text);

        Ok(InputEdit {
            start_byte: range.start,
            old_end_byte: range.end,
            new_end_byte: range.start + text.len(),
            start_position,
            old_end_position,
            new_end_position: start_position.advance(text.as_bytes()),
        })
    }

    /// Inserts `text` at `byte`.
    ///
    /// # Errors
    ///
    /// See [`TextBuffer::replace`].
    pub fn insert(&mut self, byte: usize, text: &str) -> Result<InputEdit, TextError> {
        self.replace(byte..byte, text)
    }

    /// Deletes the bytes in `range`.
    ///
    /// # Errors
    ///
    /// See [`TextBuffer::replace`].
    pub fn delete(&mut self, range: Range<usize>) -> Result<InputEdit, TextError> {
        self.replace(range, "")
    }

    /// The text from `byte` to the end of its rope chunk; empty at the end.
    #[must_use]
    pub fn chunk_at(&self, byte: usize) -> &str {
        if byte >= self.rope.len_bytes() {
            return "";
        }
        let (chunk, chunk_start, _, _) = self.rope.chunk_at_byte(byte);
        chunk.get(byte - chunk_start..).unwrap_or_default()
    }

    /// Parses the buffer chunk by chunk.
    pub fn parse(&self, parser: &mut Parser, old_tree: Option<&Tree>) -> Option<Tree> {
        parser.parse_with(|byte, _| self.chunk_at(byte), old_tree)
    }

    fn char_index(&self, byte: usize) -> Result<usize, TextError> {
        let index = self.rope.byte_to_char(byte);
        if self.rope.char_to_byte(index) == byte {
            Ok(index)
        } else {
            Err(TextError::NotCharBoundary(byte))
        }
    }
}

impl From<&str> for TextBuffer {
    fn from(text: &str) -> Self {
        Self {
            rope: Rope::from_str(text),
        }
    }
}

impl fmt::Display for TextBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for chunk in self.rope.chunks() {
            f.write_str(chunk)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::dsl::{pattern, repeat, sym};
    use crate::grammar::Grammar;
    use crate::Language;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_replace_describes_the_edit() {
        let mut buffer = TextBuffer::from("ab\ncd\nef");
        let edit = buffer.replace(4..7, "X\nYZ").unwrap();
        assert_eq!(buffer.to_string(), "ab\ncX\nYZf");
        assert_eq!(
            edit,
            InputEdit {
                start_byte: 4,
                old_end_byte: 7,
                new_end_byte: 8,
                start_position: Point::new(1, 1),
                old_end_position: Point::new(2, 1),
                new_end_position: Point::new(2, 2),
            }
        );
    }

    #[test]
    fn test_edit_matches_the_slice_based_description() {
        let old = "one\ntwo\nthree";
        let mut buffer = TextBuffer::from(old);
        let edit = buffer.replace(5..9, "wi\nn").unwrap();
        assert_eq!(edit, InputEdit::replace(old.as_bytes(), 5..9, b"wi\nn"));
    }

    #[test]
    fn test_rejects_bad_ranges() {
        let mut buffer = TextBuffer::from("héllo");
        assert_eq!(
            buffer.replace(3..1, ""),
            Err(TextError::OutOfBounds { start: 3, end: 1, len: 6 })
        );
        assert_eq!(buffer.delete(2..3), Err(TextError::NotCharBoundary(2)));
        assert_eq!(buffer.to_string(), "héllo");
    }

    #[test]
    fn test_points() {
        let buffer = TextBuffer::from("a\nbc\n");
        assert_eq!(buffer.point_for_byte(0), Some(Point::new(0, 0)));
        assert_eq!(buffer.point_for_byte(4), Some(Point::new(1, 2)));
        assert_eq!(buffer.point_for_byte(5), Some(Point::new(2, 0)));
        assert_eq!(buffer.point_for_byte(6), None);
        assert_eq!(buffer.line_count(), 3);
        assert_eq!(buffer.line(1).as_deref(), Some("bc\n"));
    }

    #[test]
    fn test_edit_and_reparse_through_the_buffer() {
        let grammar = Grammar::new("words")
            .rule("document", repeat(sym("word")))
            .rule("word", pattern("[a-z]+"));
        let mut parser = Parser::new();
        parser.set_language(&Language::generate(&grammar).unwrap());

        let mut buffer = TextBuffer::from("alpha beta\ngamma");
        let tree = buffer.parse(&mut parser, None).unwrap();
        assert_eq!(tree.root_node().named_child_count(), 3);

        let edit = buffer.insert(6, "delta ").unwrap();
        let edited = tree.edit(&edit).unwrap();
        let reparsed = buffer.parse(&mut parser, Some(&edited)).unwrap();
        let fresh = parser.parse(buffer.to_string(), None).unwrap();
        assert_eq!(reparsed, fresh);
        assert_eq!(reparsed.root_node().named_child_count(), 4);
    }
}
