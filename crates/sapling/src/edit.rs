//! Applying text edits to trees.
//!
//! [`Tree::edit`] path-copies the nodes an edit can influence: every node
//! whose span, extended by the bytes its construction looked at, touches the
//! edited range is copied with new sizes and marked as changed. Everything
//! else is shared with the old tree. The parser then reuses the unmarked
//! subtrees when handed the edited tree.

use crate::point::{Length, Point, Range};
use crate::tree::subtree::{Child, Subtree};
use crate::tree::Tree;
use serde::{Deserialize, Serialize};

/// One contiguous replacement of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InputEdit {
    /// Where the replaced text starts.
    pub start_byte: usize,
    /// Where the replaced text ended before the edit.
    pub old_end_byte: usize,
    /// Where the replacement ends after the edit.
    pub new_end_byte: usize,
    /// Row/column of `start_byte`.
    pub start_position: Point,
    /// Row/column of `old_end_byte` before the edit.
    pub old_end_position: Point,
    /// Row/column of `new_end_byte` after the edit.
    pub new_end_position: Point,
}

impl InputEdit {
    /// Describes replacing `old_text[range]` with `replacement`.
    #[must_use]
    pub fn replace(old_text: &[u8], range: std::ops::Range<usize>, replacement: &[u8]) -> Self {
        let start_byte = range.start.min(old_text.len());
        let old_end_byte = range.end.clamp(start_byte, old_text.len());
        let start_position = crate::point::extent_of(&old_text[..start_byte]);
        Self {
            start_byte,
            old_end_byte,
            new_end_byte: start_byte + replacement.len(),
            start_position,
            old_end_position: start_position.advance(&old_text[start_byte..old_end_byte]),
            new_end_position: start_position.advance(replacement),
        }
    }

    fn start(&self) -> Length {
        Length {
            bytes: self.start_byte,
            extent: self.start_position,
        }
    }

    fn old_end(&self) -> Length {
        Length {
            bytes: self.old_end_byte,
            extent: self.old_end_position,
        }
    }

    fn new_end(&self) -> Length {
        Length {
            bytes: self.new_end_byte,
            extent: self.new_end_position,
        }
    }

    /// Checks the edit against a document of `len` bytes.
    ///
    /// # Errors
    ///
    /// Rejects ranges that run backwards, start or end past the document, or
    /// whose points disagree with their byte order.
    pub fn validate(&self, len: usize) -> Result<(), EditError> {
        if self.start_byte > len || self.old_end_byte > len {
            return Err(EditError::OutOfBounds {
                edit: *self,
                len,
            });
        }
        if self.old_end_byte < self.start_byte || self.new_end_byte < self.start_byte {
            return Err(EditError::Reversed { edit: *self });
        }
        if self.old_end_position < self.start_position || self.new_end_position < self.start_position {
            return Err(EditError::InconsistentPoints { edit: *self });
        }
        Ok(())
    }
}

/// A rejected edit. The tree it was applied to is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditError {
    /// The edit starts or ends beyond the document.
    #[error("edit {}..{} exceeds document length {len}", edit.start_byte, edit.old_end_byte)]
    OutOfBounds {
        /// The offending edit.
        edit: InputEdit,
        /// Length of the document it was applied to.
        len: usize,
    },

    /// An end offset precedes the start offset.
    #[error("edit ends before it starts (start {}, old end {}, new end {})", edit.start_byte, edit.old_end_byte, edit.new_end_byte)]
    Reversed {
        /// The offending edit.
        edit: InputEdit,
    },

    /// Row/column positions are ordered differently from the byte offsets.
    #[error("edit positions {} / {} / {} are inconsistent", edit.start_position, edit.old_end_position, edit.new_end_position)]
    InconsistentPoints {
        /// The offending edit.
        edit: InputEdit,
    },
}

impl Tree {
    /// Returns a tree reflecting `edit`, sharing every subtree it cannot
    /// affect with `self`.
    ///
    /// # Errors
    ///
    /// Returns [`EditError`] for a malformed edit; `self` is untouched.
    pub fn edit(&self, edit: &InputEdit) -> Result<Self, EditError> {
        edit.validate(self.len_bytes())?;
        let root = edit_subtree(&self.root, edit.start(), edit.old_end(), edit.new_end());
        tracing::trace!(
            start = edit.start_byte,
            old_end = edit.old_end_byte,
            new_end = edit.new_end_byte,
            "edited tree"
        );
        Ok(self.from_root(root))
    }

    /// Applies edits in order.
    ///
    /// # Errors
    ///
    /// Fails on the first malformed edit; earlier edits are discarded with
    /// the intermediate trees.
    pub fn edit_all(&self, edits: &[InputEdit]) -> Result<Self, EditError> {
        let mut tree = self.clone();
        for edit in edits {
            tree = tree.edit(edit)?;
        }
        Ok(tree)
    }

    /// Ranges where the structure of `new` differs from `self`.
    ///
    /// `self` should be the edited old tree and `new` the tree reparsed from
    /// it, so that both share coordinates. Adjacent ranges are merged.
    #[must_use]
    pub fn changed_ranges(&self, new: &Self) -> Vec<Range> {
        let mut ranges: Vec<Range> = Vec::new();
        let mut stack = vec![(&self.root, Length::ZERO, &new.root, Length::ZERO)];
        while let Some((old, old_start, new, new_start)) = stack.pop() {
            if old_start.bytes == new_start.bytes && old.structurally_equal(new) {
                continue;
            }
            let same_shape = old.symbol == new.symbol
                && old_start.bytes == new_start.bytes
                && old.children.len() == new.children.len()
                && !old.is_leaf();
            if !same_shape {
                let end = new_start + new.size;
                let old_end = old_start + old.size;
                let (start, end) = if old_end.bytes > end.bytes {
                    (new_start, old_end)
                } else {
                    (new_start, end)
                };
                push_merged(
                    &mut ranges,
                    Range {
                        start_byte: start.bytes,
                        end_byte: end.bytes,
                        start_point: start.extent,
                        end_point: end.extent,
                    },
                );
                continue;
            }
            for (a, b) in old.children.iter().zip(&new.children).rev() {
                stack.push((&a.subtree, old_start + a.offset, &b.subtree, new_start + b.offset));
            }
        }
        ranges
    }
}

fn push_merged(ranges: &mut Vec<Range>, range: Range) {
    if let Some(last) = ranges.last_mut() {
        if range.start_byte <= last.end_byte {
            if range.end_byte > last.end_byte {
                last.end_byte = range.end_byte;
                last.end_point = range.end_point;
            }
            return;
        }
    }
    ranges.push(range);
}

/// Edits a subtree. Offsets are relative to the subtree's start; the text
/// in `start..old_end` becomes `start..new_end`.
fn edit_subtree(subtree: &Subtree, start: Length, old_end: Length, new_end: Length) -> Subtree {
    let size = subtree.size;
    let new_size = if old_end.bytes < size.bytes {
        new_end + (size - old_end)
    } else {
        new_end
    };
    if subtree.children.is_empty() {
        return subtree.with_size(new_size);
    }

    let mut inserted = Some(new_end - start);
    let mut children = Vec::with_capacity(subtree.children.len());
    let mut offset = Length::ZERO;
    for child in &subtree.children {
        let child_start = child.offset;
        let child_end = child.offset + child.subtree.size;
        let affected = child_start.bytes <= old_end.bytes
            && child_end.bytes + child.subtree.lookahead_bytes > start.bytes;

        let edited = if affected {
            let local_start = clamp(start, child_start, child_end) - child_start;
            let local_old_end = clamp(old_end, child_start, child_end) - child_start;
            // Inserted text belongs to the first child that reaches into the
            // edit, or that ends where a pure insertion happens.
            let takes_insertion = child_end.bytes > start.bytes
                || (child_end.bytes == start.bytes && start.bytes == old_end.bytes);
            let insertion = if takes_insertion {
                inserted.take().unwrap_or(Length::ZERO)
            } else {
                Length::ZERO
            };
            edit_subtree(&child.subtree, local_start, local_old_end, local_start + insertion)
        } else {
            child.subtree.clone()
        };

        children.push(Child {
            offset,
            field: child.field,
            subtree: edited.clone(),
        });
        offset = offset + edited.size;
    }
    subtree.with_children(children, new_size)
}

fn clamp(value: Length, low: Length, high: Length) -> Length {
    if value.bytes <= low.bytes {
        low
    } else if value.bytes >= high.bytes {
        high
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::dsl::{choice, pattern, prec_left, seq, string, sym};
    use crate::grammar::Grammar;
    use crate::{Language, Parser};

    fn arithmetic() -> Language {
        let grammar = Grammar::new("arith")
            .rule(
                "expr",
                choice(vec![
                    prec_left(1, seq(vec![sym("expr"), string("+"), sym("expr")])),
                    sym("number"),
                ]),
            )
            .rule("number", pattern(r"\d+"));
        Language::generate(&grammar).unwrap()
    }

    fn parse(text: &str) -> Tree {
        let mut parser = Parser::new();
        parser.set_language(&arithmetic());
        parser.parse(text, None).unwrap()
    }

    #[test]
    fn test_edit_past_end_is_rejected() {
        let tree = parse("1+2+3");
        let edit = InputEdit {
            start_byte: 10,
            old_end_byte: 10,
            new_end_byte: 11,
            start_position: Point::new(0, 10),
            old_end_position: Point::new(0, 10),
            new_end_position: Point::new(0, 11),
        };
        assert!(matches!(tree.edit(&edit), Err(EditError::OutOfBounds { len: 5, .. })));
        assert_eq!(tree.len_bytes(), 5);
        assert!(!tree.root_node().has_changes());
        assert_eq!(tree, parse("1+2+3"));
    }

    #[test]
    fn test_reversed_edit_is_rejected() {
        let tree = parse("1+2");
        let mut edit = InputEdit::replace(b"1+2", 1..2, b"");
        edit.old_end_byte = 0;
        assert!(matches!(tree.edit(&edit), Err(EditError::Reversed { .. })));
    }

    #[test]
    fn test_edit_shifts_and_marks() {
        let tree = parse("1+2+3");
        let edit = InputEdit::replace(b"1+2+3", 4..5, b"345");
        let edited = tree.edit(&edit).unwrap();
        assert_eq!(edited.len_bytes(), 7);
        let root = edited.root_node();
        assert!(root.has_changes());
        let left = root.child(0).unwrap();
        assert_eq!(left.range().bytes(), 0..3);
        let right = root.child(2).unwrap();
        assert_eq!(right.range().bytes(), 4..7);
        assert!(right.has_changes());
    }

    #[test]
    fn test_replace_computes_points() {
        let edit = InputEdit::replace(b"ab\ncd", 3..4, b"x\ny");
        assert_eq!(edit.start_position, Point::new(1, 0));
        assert_eq!(edit.old_end_position, Point::new(1, 1));
        assert_eq!(edit.new_end_position, Point::new(2, 1));
        assert_eq!(edit.new_end_byte, 6);
    }

    #[test]
    fn test_changed_ranges_after_reparse() {
        let old = parse("1+2");
        let edit = InputEdit::replace(b"1+2", 2..3, b"2+3");
        let edited = old.edit(&edit).unwrap();
        let mut parser = Parser::new();
        parser.set_language(&arithmetic());
        let new = parser.parse("1+2+3", Some(&edited)).unwrap();
        let ranges = edited.changed_ranges(&new);
        assert!(!ranges.is_empty());
        assert!(ranges.iter().all(|range| range.end_byte <= 5));
        assert!(old.changed_ranges(&old).is_empty());
    }
}
