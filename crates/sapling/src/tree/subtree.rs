//! Reference-counted immutable tree storage.
//!
//! Sizes are relative: a subtree knows its byte length and row/column extent
//! but not where it starts, and each child records its offset within the
//! parent. Shifting text after an edit therefore never touches the subtrees
//! that moved, only the ancestors on the edited path.

use crate::language::{FieldId, Language, StateId, Symbol, ERROR_SYMBOL};
use crate::point::Length;
use crate::scanner::ScannerState;
use std::sync::Arc;

/// Lex state recorded on tokens that were lexed with every rule enabled.
pub(crate) const ERROR_LEX_STATE: u16 = u16::MAX;

#[derive(Clone)]
pub(crate) struct Subtree(Arc<SubtreeData>);

#[derive(Clone)]
pub(crate) struct Child {
    pub offset: Length,
    pub field: Option<FieldId>,
    pub subtree: Subtree,
}

#[derive(Clone)]
#[allow(clippy::struct_excessive_bools)]
pub(crate) struct SubtreeData {
    pub symbol: Symbol,
    pub size: Length,
    /// Bytes past the end that influenced how this subtree was built.
    pub lookahead_bytes: usize,
    pub parse_state: StateId,
    pub lex_state: u16,
    pub visible: bool,
    pub named: bool,
    pub extra: bool,
    pub missing: bool,
    pub has_changes: bool,
    /// Built while several stack versions were alive or inside recovery.
    pub fragile: bool,
    /// Lexed directly after an extra.
    pub after_extra: bool,
    pub error_cost: u32,
    pub dynamic_precedence: i32,
    pub children: Vec<Child>,
    pub visible_child_count: usize,
    pub named_child_count: usize,
    /// Scanner state after the last external token inside this subtree.
    pub last_external: Option<ScannerState>,
}

impl Drop for SubtreeData {
    // Repetitions build long chains; release them without recursion.
    fn drop(&mut self) {
        let mut stack: Vec<Subtree> = std::mem::take(&mut self.children)
            .into_iter()
            .map(|child| child.subtree)
            .collect();
        while let Some(subtree) = stack.pop() {
            if let Some(mut data) = Arc::into_inner(subtree.0) {
                stack.extend(
                    std::mem::take(&mut data.children)
                        .into_iter()
                        .map(|child| child.subtree),
                );
            }
        }
    }
}

impl SubtreeData {
    pub(crate) fn leaf(language: &Language, symbol: Symbol, size: Length) -> Self {
        Self {
            symbol,
            size,
            lookahead_bytes: 1,
            parse_state: 0,
            lex_state: 0,
            visible: language.symbol_is_visible(symbol),
            named: language.symbol_is_named(symbol),
            extra: false,
            missing: false,
            has_changes: false,
            fragile: false,
            after_extra: false,
            error_cost: 0,
            dynamic_precedence: 0,
            children: Vec::new(),
            visible_child_count: 0,
            named_child_count: 0,
            last_external: None,
        }
    }
}

impl From<SubtreeData> for Subtree {
    fn from(data: SubtreeData) -> Self {
        Self(Arc::new(data))
    }
}

impl std::ops::Deref for Subtree {
    type Target = SubtreeData;

    fn deref(&self) -> &SubtreeData {
        &self.0
    }
}

/// Parameters of an interior node.
pub(crate) struct NodeSpec {
    pub symbol: Symbol,
    pub parse_state: StateId,
    pub dynamic_precedence: i32,
    pub error_cost: u32,
    pub fragile: bool,
    /// Bytes past the node's end the reduction looked at.
    pub trailing_lookahead: usize,
}

impl Subtree {
    /// A zero-width token inserted by error recovery.
    pub(crate) fn missing(language: &Language, symbol: Symbol, parse_state: StateId, cost: u32) -> Self {
        let mut data = SubtreeData::leaf(language, symbol, Length::ZERO);
        data.missing = true;
        data.parse_state = parse_state;
        data.error_cost = cost;
        data.fragile = true;
        data.into()
    }

    /// Builds an interior node, splicing in the children of hidden nodes
    /// when the new node is visible.
    pub(crate) fn node(language: &Language, spec: &NodeSpec, children: Vec<(Option<FieldId>, Self)>) -> Self {
        let visible = spec.symbol == ERROR_SYMBOL || language.symbol_is_visible(spec.symbol);
        let children = if visible {
            flatten(language, children)
        } else {
            children
        };

        let mut size = Length::ZERO;
        let mut lookahead_end = 0;
        let mut error_cost = spec.error_cost;
        let mut dynamic_precedence = spec.dynamic_precedence;
        let mut fragile = spec.fragile;
        let mut visible_child_count = 0;
        let mut named_child_count = 0;
        let mut last_external = None;
        let mut stored = Vec::with_capacity(children.len());

        for (field, subtree) in children {
            let offset = size;
            size = size + subtree.size;
            lookahead_end = lookahead_end.max(size.bytes + subtree.lookahead_bytes);
            error_cost = error_cost.saturating_add(subtree.error_cost);
            dynamic_precedence += subtree.dynamic_precedence;
            fragile |= subtree.fragile;
            if subtree.visible {
                visible_child_count += 1;
                if subtree.named {
                    named_child_count += 1;
                }
            }
            if subtree.last_external.is_some() {
                last_external.clone_from(&subtree.last_external);
            }
            stored.push(Child {
                offset,
                field,
                subtree,
            });
        }

        let lookahead_bytes = lookahead_end
            .saturating_sub(size.bytes)
            .max(spec.trailing_lookahead);

        SubtreeData {
            symbol: spec.symbol,
            size,
            lookahead_bytes,
            parse_state: spec.parse_state,
            lex_state: 0,
            visible,
            named: spec.symbol == ERROR_SYMBOL || language.symbol_is_named(spec.symbol),
            extra: false,
            missing: false,
            has_changes: false,
            fragile,
            after_extra: false,
            error_cost,
            dynamic_precedence,
            children: stored,
            visible_child_count,
            named_child_count,
            last_external,
        }
        .into()
    }

    /// Wraps skipped or popped material in an ERROR node.
    pub(crate) fn error(language: &Language, parse_state: StateId, cost: u32, children: Vec<Self>) -> Self {
        let spec = NodeSpec {
            symbol: ERROR_SYMBOL,
            parse_state,
            dynamic_precedence: 0,
            error_cost: cost,
            fragile: true,
            trailing_lookahead: 0,
        };
        Self::node(language, &spec, children.into_iter().map(|child| (None, child)).collect())
    }

    fn modified(&self, update: impl FnOnce(&mut SubtreeData)) -> Self {
        let mut data = (*self.0).clone();
        update(&mut data);
        data.into()
    }

    pub(crate) fn with_extra(&self, extra: bool) -> Self {
        if self.extra == extra {
            return self.clone();
        }
        self.modified(|data| data.extra = extra)
    }

    pub(crate) fn with_parse_state(&self, state: StateId) -> Self {
        if self.parse_state == state {
            return self.clone();
        }
        self.modified(|data| data.parse_state = state)
    }

    /// Renames the subtree, taking the alias's visibility and namedness.
    pub(crate) fn with_alias(&self, language: &Language, alias: Symbol) -> Self {
        if self.symbol == alias {
            return self.clone();
        }
        self.modified(|data| {
            data.symbol = alias;
            data.visible = language.symbol_is_visible(alias);
            data.named = language.symbol_is_named(alias);
        })
    }

    /// Replaces the children, keeping everything else.
    pub(crate) fn with_children(&self, children: Vec<Child>, size: Length) -> Self {
        self.modified(|data| {
            data.children = children;
            data.size = size;
            data.has_changes = true;
        })
    }

    pub(crate) fn with_size(&self, size: Length) -> Self {
        self.modified(|data| {
            data.size = size;
            data.has_changes = true;
        })
    }

    pub(crate) fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub(crate) fn is_error(&self) -> bool {
        self.symbol == ERROR_SYMBOL
    }

    pub(crate) fn has_error(&self) -> bool {
        self.error_cost > 0 || self.is_error() || self.missing
    }

    /// Stable identity of the shared allocation.
    pub(crate) fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    pub(crate) fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Compares kind, extent and every descendant, ignoring identity.
    pub(crate) fn structurally_equal(&self, other: &Self) -> bool {
        let mut stack = vec![(self, other)];
        while let Some((left, right)) = stack.pop() {
            if left.ptr_eq(right) {
                continue;
            }
            if left.symbol != right.symbol
                || left.size.bytes != right.size.bytes
                || left.missing != right.missing
                || left.extra != right.extra
                || left.children.len() != right.children.len()
            {
                return false;
            }
            for (a, b) in left.children.iter().zip(&right.children) {
                if a.field != b.field {
                    return false;
                }
                stack.push((&a.subtree, &b.subtree));
            }
        }
        true
    }
}

/// Replaces hidden interior children by their own children.
fn flatten(language: &Language, children: Vec<(Option<FieldId>, Subtree)>) -> Vec<(Option<FieldId>, Subtree)> {
    let hidden = |child: &Subtree| !child.visible && language.is_nonterminal(child.symbol);
    if !children.iter().any(|(_, child)| hidden(child)) {
        return children;
    }
    let mut flattened = Vec::with_capacity(children.len());
    let mut stack: Vec<(Option<FieldId>, Subtree)> = children.into_iter().rev().collect();
    while let Some((field, child)) = stack.pop() {
        if !hidden(&child) {
            flattened.push((field, child));
            continue;
        }
        for grandchild in child.children.iter().rev() {
            stack.push((grandchild.field.or(field), grandchild.subtree.clone()));
        }
    }
    flattened
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::generate;
    use crate::grammar::dsl::{pattern, seq, string, sym};
    use crate::grammar::Grammar;

    fn language() -> Language {
        let grammar = Grammar::new("pair")
            .rule("pair", seq(vec![sym("_inner"), string(";")]))
            .rule("_inner", seq(vec![sym("word"), sym("word")]))
            .rule("word", pattern("[a-z]+"));
        Language::from_table(generate(&grammar).unwrap(), None).unwrap()
    }

    fn leaf(language: &Language, kind: &str, named: bool, bytes: &[u8]) -> Subtree {
        let symbol = language.id_for_node_kind(kind, named).unwrap();
        SubtreeData::leaf(language, symbol, Length::of(bytes)).into()
    }

    fn spec(symbol: Symbol) -> NodeSpec {
        NodeSpec {
            symbol,
            parse_state: 0,
            dynamic_precedence: 0,
            error_cost: 0,
            fragile: false,
            trailing_lookahead: 0,
        }
    }

    #[test]
    fn test_visible_nodes_splice_hidden_children() {
        let language = language();
        let inner_symbol = (0..u16::try_from(language.symbol_count()).unwrap())
            .find(|&symbol| language.symbol_name(symbol) == Some("_inner"))
            .unwrap();
        let inner = Subtree::node(
            &language,
            &spec(inner_symbol),
            vec![
                (None, leaf(&language, "word", true, b"ab")),
                (None, leaf(&language, "word", true, b"cd")),
            ],
        );
        assert!(!inner.visible);
        assert_eq!(inner.children.len(), 2);

        let pair = Subtree::node(
            &language,
            &spec(language.start_symbol()),
            vec![(None, inner), (None, leaf(&language, ";", false, b";"))],
        );
        assert_eq!(pair.children.len(), 3);
        assert_eq!(pair.named_child_count, 2);
        assert_eq!(pair.visible_child_count, 3);
        assert_eq!(pair.size.bytes, 5);
        assert_eq!(pair.children[2].offset.bytes, 4);
    }

    #[test]
    fn test_structural_equality_ignores_identity() {
        let language = language();
        let a = leaf(&language, "word", true, b"ab");
        let b = leaf(&language, "word", true, b"xy");
        let c = leaf(&language, "word", true, b"abc");
        assert!(!a.ptr_eq(&b));
        assert!(a.structurally_equal(&b));
        assert!(!a.structurally_equal(&c));
    }

    #[test]
    fn test_long_chains_drop_without_overflow() {
        let language = language();
        let symbol = language.start_symbol();
        let mut chain = leaf(&language, "word", true, b"a");
        for _ in 0..200_000 {
            chain = Subtree::node(&language, &spec(symbol), vec![(None, chain)]);
        }
        drop(chain);
    }
}
