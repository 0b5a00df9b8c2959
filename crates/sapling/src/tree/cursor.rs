use super::Node;
use crate::language::FieldId;

#[derive(Clone, Copy)]
struct Frame<'tree> {
    node: Node<'tree>,
    /// Index among the parent's stored children.
    index: usize,
    field: Option<FieldId>,
}

/// A stateful walker over visible nodes.
///
/// The cursor keeps the path from its starting node, so moving to a parent
/// or sibling is constant time and seeking by byte offset only climbs as far
/// as the target requires. It never leaves the subtree it was created on.
#[derive(Clone)]
pub struct TreeCursor<'tree> {
    stack: Vec<Frame<'tree>>,
}

impl<'tree> TreeCursor<'tree> {
    pub(crate) fn new(node: Node<'tree>) -> Self {
        Self {
            stack: vec![Frame {
                node,
                index: 0,
                field: None,
            }],
        }
    }

    fn top(&self) -> &Frame<'tree> {
        // The starting frame is never popped.
        &self.stack[self.stack.len() - 1]
    }

    /// The current node.
    #[must_use]
    pub fn node(&self) -> Node<'tree> {
        self.top().node
    }

    /// Field of the current node within its parent.
    #[must_use]
    pub fn field_id(&self) -> Option<FieldId> {
        self.top().field
    }

    /// Field name of the current node within its parent.
    #[must_use]
    pub fn field_name(&self) -> Option<&'tree str> {
        let node = self.node();
        self.field_id()
            .and_then(|id| node.tree().language().field_name_for_id(id))
    }

    /// Distance from the starting node.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len() - 1
    }

    /// Restarts at `node`.
    pub fn reset(&mut self, node: Node<'tree>) {
        *self = Self::new(node);
    }

    fn enter(&mut self, from_end: bool) -> bool {
        let node = self.node();
        let mut children = node.visible_children();
        let next = if from_end {
            children.next_back()
        } else {
            children.next()
        };
        match next {
            Some((index, field, child)) => {
                self.stack.push(Frame {
                    node: child,
                    index,
                    field,
                });
                true
            }
            None => false,
        }
    }

    /// Moves to the first visible child.
    pub fn goto_first_child(&mut self) -> bool {
        self.enter(false)
    }

    /// Moves to the last visible child.
    pub fn goto_last_child(&mut self) -> bool {
        self.enter(true)
    }

    /// Moves to the parent, unless at the starting node.
    pub fn goto_parent(&mut self) -> bool {
        if self.stack.len() > 1 {
            self.stack.pop();
            true
        } else {
            false
        }
    }

    fn step(&mut self, forward: bool) -> bool {
        if self.stack.len() < 2 {
            return false;
        }
        let current = *self.top();
        let parent = self.stack[self.stack.len() - 2].node;
        let count = parent.subtree().children.len();
        let mut index = current.index;
        loop {
            index = if forward {
                index + 1
            } else if let Some(previous) = index.checked_sub(1) {
                previous
            } else {
                return false;
            };
            if index >= count {
                return false;
            }
            if let Some((child, node)) = parent.stored_child(index) {
                if child.subtree.visible {
                    let last = self.stack.len() - 1;
                    self.stack[last] = Frame {
                        node,
                        index,
                        field: child.field,
                    };
                    return true;
                }
            }
        }
    }

    /// Moves to the next visible sibling.
    pub fn goto_next_sibling(&mut self) -> bool {
        self.step(true)
    }

    /// Moves to the previous visible sibling.
    pub fn goto_previous_sibling(&mut self) -> bool {
        self.step(false)
    }

    /// Moves to the first child that extends past `byte`, returning its
    /// visible index.
    pub fn goto_first_child_for_byte(&mut self, byte: usize) -> Option<usize> {
        let node = self.node();
        let (position, (index, field, child)) = node
            .visible_children()
            .enumerate()
            .find(|(_, (_, _, child))| child.end_byte() > byte)?;
        self.stack.push(Frame {
            node: child,
            index,
            field,
        });
        Some(position)
    }

    /// Moves to the deepest visible node containing `byte`.
    ///
    /// Climbs only until an ancestor contains the offset, then descends.
    /// Returns false if the starting node does not contain it.
    pub fn goto_byte(&mut self, byte: usize) -> bool {
        let contains = |node: Node<'_>| node.start_byte() <= byte && byte < node.end_byte();
        while !contains(self.node()) {
            if !self.goto_parent() {
                return false;
            }
        }
        loop {
            let node = self.node();
            let next = node
                .visible_children()
                .find(|(_, _, child)| contains(*child));
            match next {
                Some((index, field, child)) => self.stack.push(Frame {
                    node: child,
                    index,
                    field,
                }),
                None => return true,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::grammar::dsl::{pattern, repeat, seq, string, sym};
    use crate::grammar::Grammar;
    use crate::{Language, Parser};

    fn parse(text: &str) -> crate::Tree {
        let grammar = Grammar::new("list")
            .rule("list", repeat(sym("item")))
            .rule("item", seq(vec![sym("word"), string(";")]))
            .rule("word", pattern("[a-z]+"));
        let mut parser = Parser::new();
        parser.set_language(&Language::generate(&grammar).unwrap());
        parser.parse(text, None).unwrap()
    }

    #[test]
    fn test_cursor_walks_siblings_and_parents() {
        let tree = parse("ab; cd; ef;");
        let mut cursor = tree.walk();
        assert_eq!(cursor.node().kind(), "list");
        assert!(cursor.goto_first_child());
        assert_eq!(cursor.depth(), 1);
        let mut kinds = vec![cursor.node().kind()];
        while cursor.goto_next_sibling() {
            kinds.push(cursor.node().kind());
        }
        assert_eq!(kinds, ["item", "item", "item"]);
        assert!(cursor.goto_previous_sibling());
        assert_eq!(cursor.node().start_byte(), 4);
        assert!(cursor.goto_last_child());
        assert_eq!(cursor.node().kind(), ";");
        assert!(cursor.goto_parent());
        assert!(cursor.goto_parent());
        assert!(!cursor.goto_parent());
    }

    #[test]
    fn test_goto_byte_climbs_only_as_needed() {
        let tree = parse("ab; cd; ef;");
        let mut cursor = tree.walk();
        assert!(cursor.goto_byte(5));
        assert_eq!(cursor.node().kind(), "word");
        assert_eq!(cursor.depth(), 2);
        assert!(cursor.goto_byte(9));
        assert_eq!(cursor.node().kind(), "word");
        assert_eq!(cursor.node().start_byte(), 8);
        assert!(!cursor.goto_byte(100));
    }

    #[test]
    fn test_first_child_for_byte() {
        let tree = parse("ab; cd;");
        let mut cursor = tree.walk();
        assert_eq!(cursor.goto_first_child_for_byte(3), Some(1));
        assert_eq!(cursor.node().start_byte(), 4);
    }
}
