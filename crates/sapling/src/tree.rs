//! Persistent concrete syntax trees.
//!
//! A [`Tree`] is an immutable value. Editing produces a new tree that shares
//! every untouched subtree with the old one, so keeping old versions around
//! is cheap. [`Node`] is a lightweight handle (a reference into the tree plus
//! an absolute position) and [`TreeCursor`] walks a tree while remembering
//! its ancestors.

mod cursor;
pub(crate) mod subtree;

pub use cursor::TreeCursor;

use crate::language::{FieldId, Language, Symbol};
use crate::point::{Length, Point, Range};
use std::fmt;
use subtree::{Child, Subtree};

/// A parsed document.
#[derive(Clone)]
pub struct Tree {
    pub(crate) root: Subtree,
    pub(crate) language: Language,
    pub(crate) complete: bool,
}

/// A syntax error recorded in a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    /// `ERROR` for skipped or unparseable text; otherwise the kind of the
    /// token recovery had to insert.
    pub kind: String,
    /// Whether this is a zero-width inserted token.
    pub missing: bool,
    /// Where the error is.
    pub range: Range,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.missing {
            write!(f, "missing {} at {}", self.kind, self.range.start_point)
        } else {
            write!(f, "syntax error at {}", self.range)
        }
    }
}

/// One token of the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaf {
    /// Token symbol.
    pub symbol: Symbol,
    /// Span of the token.
    pub range: Range,
    /// Inserted by error recovery.
    pub missing: bool,
}

impl Tree {
    pub(crate) fn new(root: Subtree, language: Language, complete: bool) -> Self {
        Self {
            root,
            language,
            complete,
        }
    }

    /// The root node.
    #[must_use]
    pub fn root_node(&self) -> Node<'_> {
        Node::new(self, &self.root, Length::ZERO)
    }

    /// A cursor positioned at the root node.
    #[must_use]
    pub fn walk(&self) -> TreeCursor<'_> {
        TreeCursor::new(self.root_node())
    }

    /// The language the tree was parsed with.
    #[must_use]
    pub fn language(&self) -> &Language {
        &self.language
    }

    /// Length of the parsed text.
    #[must_use]
    pub fn len_bytes(&self) -> usize {
        self.root.size.bytes
    }

    /// False when the parse was cancelled before reaching the end of input.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Whether any ERROR or MISSING node exists.
    #[must_use]
    pub fn has_error(&self) -> bool {
        self.root.has_error()
    }

    /// Every ERROR and MISSING node, in document order.
    #[must_use]
    pub fn errors(&self) -> Vec<SyntaxError> {
        let mut errors = Vec::new();
        let mut stack = vec![(&self.root, Length::ZERO)];
        while let Some((subtree, start)) = stack.pop() {
            if !subtree.has_error() {
                continue;
            }
            let range = range_of(start, subtree.size);
            if subtree.is_error() {
                errors.push(SyntaxError {
                    kind: "ERROR".into(),
                    missing: false,
                    range,
                });
                continue;
            }
            if subtree.missing {
                errors.push(SyntaxError {
                    kind: self.language.symbol_name(subtree.symbol).unwrap_or("?").into(),
                    missing: true,
                    range,
                });
                continue;
            }
            for child in subtree.children.iter().rev() {
                stack.push((&child.subtree, start + child.offset));
            }
        }
        errors
    }

    /// Every token in document order, including hidden ones and extras.
    #[must_use]
    pub fn leaves(&self) -> Vec<Leaf> {
        let mut leaves = Vec::new();
        let mut stack = vec![(&self.root, Length::ZERO)];
        while let Some((subtree, start)) = stack.pop() {
            if subtree.is_leaf() {
                leaves.push(Leaf {
                    symbol: subtree.symbol,
                    range: range_of(start, subtree.size),
                    missing: subtree.missing,
                });
                continue;
            }
            for child in subtree.children.iter().rev() {
                stack.push((&child.subtree, start + child.offset));
            }
        }
        leaves
    }

    /// Concatenates the text of every token. For a tree parsed from
    /// `source` this reproduces `source`.
    #[must_use]
    pub fn unparse(&self, source: &[u8]) -> Vec<u8> {
        let mut text = Vec::with_capacity(self.len_bytes());
        for leaf in self.leaves() {
            if let Some(bytes) = source.get(leaf.range.bytes()) {
                text.extend_from_slice(bytes);
            }
        }
        text
    }

    pub(crate) fn from_root(&self, root: Subtree) -> Self {
        Self::new(root, self.language.clone(), self.complete)
    }
}

/// Structural equality: same kinds, extents and descendants.
impl PartialEq for Tree {
    fn eq(&self, other: &Self) -> bool {
        self.root.structurally_equal(&other.root)
    }
}

impl Eq for Tree {}

impl fmt::Debug for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{Tree {:?}}}", self.root_node())
    }
}

/// Positioned S-expression, one named node per line.
impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut cursor = self.walk();
        let mut depth = 0;
        let mut first = true;
        let mut visited_children = false;
        loop {
            let node = cursor.node();
            if visited_children {
                if node.is_named() {
                    f.write_str(")")?;
                }
                if cursor.goto_next_sibling() {
                    visited_children = false;
                } else if cursor.goto_parent() {
                    if cursor.node().is_named() {
                        depth -= 1;
                    }
                } else {
                    break;
                }
                continue;
            }
            if node.is_named() {
                if !first {
                    writeln!(f)?;
                }
                first = false;
                write!(f, "{}", "  ".repeat(depth))?;
                if let Some(field) = cursor.field_name() {
                    write!(f, "{field}: ")?;
                }
                if node.is_missing() {
                    write!(f, "(MISSING {} ", node.kind())?;
                } else {
                    write!(f, "({} ", node.kind())?;
                }
                write!(f, "{} - {}", node.start_position(), node.end_position())?;
            }
            if cursor.goto_first_child() {
                if node.is_named() {
                    depth += 1;
                }
                visited_children = false;
            } else {
                visited_children = true;
            }
        }
        Ok(())
    }
}

fn range_of(start: Length, size: Length) -> Range {
    let end = start + size;
    Range {
        start_byte: start.bytes,
        end_byte: end.bytes,
        start_point: start.extent,
        end_point: end.extent,
    }
}

/// A handle to one node of a [`Tree`].
#[derive(Clone, Copy)]
pub struct Node<'tree> {
    tree: &'tree Tree,
    subtree: &'tree Subtree,
    start: Length,
}

impl<'tree> Node<'tree> {
    pub(crate) fn new(tree: &'tree Tree, subtree: &'tree Subtree, start: Length) -> Self {
        Self {
            tree,
            subtree,
            start,
        }
    }

    pub(crate) fn subtree(&self) -> &'tree Subtree {
        self.subtree
    }

    /// Identifier shared by every tree that reuses this node.
    #[must_use]
    pub fn id(&self) -> usize {
        self.subtree.id()
    }

    /// Node kind.
    #[must_use]
    pub fn kind(&self) -> &'tree str {
        self.tree
            .language
            .symbol_name(self.subtree.symbol)
            .unwrap_or("?")
    }

    /// Symbol of the node kind.
    #[must_use]
    pub fn kind_id(&self) -> Symbol {
        self.subtree.symbol
    }

    /// The tree this node belongs to.
    #[must_use]
    pub fn tree(&self) -> &'tree Tree {
        self.tree
    }

    /// Named nodes come from named rules; anonymous ones from literals.
    #[must_use]
    pub fn is_named(&self) -> bool {
        self.subtree.named
    }

    /// Whether this is an ERROR node.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.subtree.is_error()
    }

    /// Whether this is a zero-width token inserted by recovery.
    #[must_use]
    pub fn is_missing(&self) -> bool {
        self.subtree.missing
    }

    /// Whether this node is an extra such as a comment.
    #[must_use]
    pub fn is_extra(&self) -> bool {
        self.subtree.extra
    }

    /// Whether this node is or contains an error.
    #[must_use]
    pub fn has_error(&self) -> bool {
        self.subtree.has_error()
    }

    /// Whether an edit touched this node since it was parsed.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.subtree.has_changes
    }

    /// First byte.
    #[must_use]
    pub fn start_byte(&self) -> usize {
        self.start.bytes
    }

    /// One past the last byte.
    #[must_use]
    pub fn end_byte(&self) -> usize {
        self.start.bytes + self.subtree.size.bytes
    }

    /// Row/column of the first byte.
    #[must_use]
    pub fn start_position(&self) -> Point {
        self.start.extent
    }

    /// Row/column one past the last byte.
    #[must_use]
    pub fn end_position(&self) -> Point {
        (self.start + self.subtree.size).extent
    }

    /// Byte and row/column span.
    #[must_use]
    pub fn range(&self) -> Range {
        range_of(self.start, self.subtree.size)
    }

    /// Source text of the node, given the text the tree was parsed from.
    ///
    /// # Errors
    ///
    /// Fails if the span is not valid UTF-8 or lies outside `source`.
    pub fn utf8_text<'s>(&self, source: &'s [u8]) -> Result<&'s str, std::str::Utf8Error> {
        let bytes = source.get(self.start_byte()..self.end_byte()).unwrap_or_default();
        std::str::from_utf8(bytes)
    }

    /// Visible children with their stored index and field.
    pub(crate) fn visible_children(&self) -> impl DoubleEndedIterator<Item = (usize, Option<FieldId>, Node<'tree>)> + 'tree {
        let tree = self.tree;
        let start = self.start;
        self.subtree
            .children
            .iter()
            .enumerate()
            .filter(|(_, child)| child.subtree.visible)
            .map(move |(index, child)| (index, child.field, Node::new(tree, &child.subtree, start + child.offset)))
    }

    pub(crate) fn stored_child(&self, index: usize) -> Option<(&'tree Child, Node<'tree>)> {
        let child = self.subtree.children.get(index)?;
        Some((child, Node::new(self.tree, &child.subtree, self.start + child.offset)))
    }

    /// Number of visible children.
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.subtree.visible_child_count
    }

    /// Number of named children.
    #[must_use]
    pub fn named_child_count(&self) -> usize {
        self.subtree.named_child_count
    }

    /// The `index`th visible child.
    #[must_use]
    pub fn child(&self, index: usize) -> Option<Self> {
        self.visible_children().nth(index).map(|(_, _, node)| node)
    }

    /// The `index`th named child.
    #[must_use]
    pub fn named_child(&self, index: usize) -> Option<Self> {
        self.named_children().nth(index)
    }

    /// Visible children in order.
    pub fn children(&self) -> impl DoubleEndedIterator<Item = Node<'tree>> + 'tree {
        self.visible_children().map(|(_, _, node)| node)
    }

    /// Named children in order.
    pub fn named_children(&self) -> impl DoubleEndedIterator<Item = Node<'tree>> + 'tree {
        self.children().filter(Node::is_named)
    }

    /// First child carrying the field.
    #[must_use]
    pub fn child_by_field_name(&self, name: &str) -> Option<Self> {
        let id = self.tree.language.field_id_for_name(name)?;
        self.child_by_field_id(id)
    }

    /// First child carrying the field id.
    #[must_use]
    pub fn child_by_field_id(&self, id: FieldId) -> Option<Self> {
        self.visible_children()
            .find(|(_, field, _)| *field == Some(id))
            .map(|(_, _, node)| node)
    }

    /// Every child carrying the field.
    pub fn children_by_field_name(&self, name: &str) -> impl Iterator<Item = Node<'tree>> + 'tree {
        let id = self.tree.language.field_id_for_name(name);
        self.visible_children()
            .filter(move |(_, field, _)| id.is_some() && *field == id)
            .map(|(_, _, node)| node)
    }

    /// Field name this node has in its parent.
    #[must_use]
    pub fn field_name(&self) -> Option<&'tree str> {
        let (parent, index) = self.parent_and_index()?;
        let field = parent.subtree.children.get(index)?.field?;
        self.tree.language.field_name_for_id(field)
    }

    /// Finds the parent and the stored index of this node in it, by walking
    /// down from the root. Siblings never overlap, so their starts and ends
    /// are both sorted and each level is a binary search.
    fn parent_and_index(&self) -> Option<(Self, usize)> {
        let start = self.start_byte();
        let end = self.end_byte();
        let mut candidates = vec![self.tree.root_node()];
        while let Some(node) = candidates.pop() {
            let children = &node.subtree.children;
            let base = node.start.bytes;
            let after = children.partition_point(|child| base + child.offset.bytes <= start);
            for index in (0..after).rev() {
                let child = &children[index];
                let child_start = base + child.offset.bytes;
                if child_start + child.subtree.size.bytes < end {
                    break;
                }
                if child_start == start && child.subtree.ptr_eq(self.subtree) {
                    return Some((node, index));
                }
                if !child.subtree.is_leaf() {
                    candidates.push(Node::new(self.tree, &child.subtree, node.start + child.offset));
                }
            }
        }
        None
    }

    /// The visible node containing this one.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        self.parent_and_index().map(|(parent, _)| parent)
    }

    fn sibling(&self, forward: bool, named: bool) -> Option<Self> {
        let (parent, index) = self.parent_and_index()?;
        let accept = |child: &Child| child.subtree.visible && (!named || child.subtree.named);
        let children = &parent.subtree.children;
        let found = if forward {
            children
                .iter()
                .enumerate()
                .skip(index + 1)
                .find(|(_, child)| accept(child))
        } else {
            children
                .iter()
                .enumerate()
                .take(index)
                .rev()
                .find(|(_, child)| accept(child))
        };
        found.map(|(_, child)| Node::new(self.tree, &child.subtree, parent.start + child.offset))
    }

    /// Next visible sibling.
    #[must_use]
    pub fn next_sibling(&self) -> Option<Self> {
        self.sibling(true, false)
    }

    /// Previous visible sibling.
    #[must_use]
    pub fn prev_sibling(&self) -> Option<Self> {
        self.sibling(false, false)
    }

    /// Next named sibling.
    #[must_use]
    pub fn next_named_sibling(&self) -> Option<Self> {
        self.sibling(true, true)
    }

    /// Previous named sibling.
    #[must_use]
    pub fn prev_named_sibling(&self) -> Option<Self> {
        self.sibling(false, true)
    }

    fn descendant(&self, start: usize, end: usize, named: bool) -> Option<Self> {
        if start > end || start < self.start_byte() || end > self.end_byte() {
            return None;
        }
        let mut node = *self;
        let mut best = (!named || node.is_named()).then_some(node);
        'descend: loop {
            for child in node.children() {
                if child.start_byte() <= start && end <= child.end_byte() {
                    // Prefer the node the range starts in over one that only touches it.
                    if child.end_byte() == start && child.start_byte() < start {
                        continue;
                    }
                    node = child;
                    if !named || node.is_named() {
                        best = Some(node);
                    }
                    continue 'descend;
                }
            }
            return best;
        }
    }

    /// Smallest visible node spanning the byte range.
    #[must_use]
    pub fn descendant_for_byte_range(&self, start: usize, end: usize) -> Option<Self> {
        self.descendant(start, end, false)
    }

    /// Smallest named node spanning the byte range.
    #[must_use]
    pub fn named_descendant_for_byte_range(&self, start: usize, end: usize) -> Option<Self> {
        self.descendant(start, end, true)
    }

    /// A cursor starting at this node.
    #[must_use]
    pub fn walk(&self) -> TreeCursor<'tree> {
        TreeCursor::new(*self)
    }

    /// Compact S-expression of the named structure, tree-sitter style.
    #[must_use]
    pub fn to_sexp(&self) -> String {
        let mut out = String::new();
        self.write_sexp(&mut out, None);
        out
    }

    fn write_sexp(&self, out: &mut String, field: Option<&str>) {
        if !self.is_named() && !self.is_missing() {
            return;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        if let Some(field) = field {
            out.push_str(field);
            out.push_str(": ");
        }
        out.push('(');
        if self.is_missing() {
            out.push_str("MISSING ");
            if !self.is_named() {
                out.push('"');
                out.push_str(&self.kind().replace('"', "\\\""));
                out.push_str("\")");
                return;
            }
        }
        out.push_str(self.kind());
        for (_, field, child) in self.visible_children() {
            let name = field.and_then(|id| self.tree.language.field_name_for_id(id));
            child.write_sexp(out, name);
        }
        out.push(')');
    }
}

/// Structural equality: same kind, byte range and descendants.
impl PartialEq for Node<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.start.bytes == other.start.bytes && self.subtree.structurally_equal(other.subtree)
    }
}

impl Eq for Node<'_> {}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{Node {} {}}}", self.kind(), self.range())
    }
}
